//! API request, response and error types

pub mod error;
pub mod image;
pub mod json;

pub use error::{ApiError, ApiErrorResponse};
pub use image::{CacheStatsResponse, GenerateImageRequest, GenerateImageResponse, IMAGES_ROUTE};
pub use json::Json;
