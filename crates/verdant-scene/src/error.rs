//! Viewer error types

use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    /// The host could not provide a rendering context. Fatal for this mount;
    /// hosts show a fallback instead of the 3D view.
    #[error("failed to acquire rendering context: {0}")]
    ContextAcquisition(String),
    #[error("viewer is already mounted")]
    AlreadyMounted,
    #[error("scene build failed: {0}")]
    Registry(#[from] RegistryError),
}
