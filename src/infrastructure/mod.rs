//! Infrastructure layer - External service implementations

pub mod artifact;
pub mod embedding;
pub mod generator;
pub mod http;
pub mod logging;
pub mod observability;
pub mod semantic_cache;
pub mod services;
