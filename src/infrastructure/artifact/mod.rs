//! Artifact store implementations

mod filesystem;

pub use filesystem::FilesystemArtifactStore;
