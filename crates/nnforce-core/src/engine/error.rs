use thiserror::Error;

use super::accelerator::DeviceError;
use super::config::ConfigError;
use super::execution::EvaluationError;
use crate::core::graph::LoadError;
use crate::core::pbc::BoxError;
use crate::core::tensor::ShapeMismatchError;

#[derive(Debug, Error)]
pub enum ForceError {
    #[error("Graph load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(#[from] ShapeMismatchError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Invalid periodic box: {0}")]
    InvalidBox(#[from] BoxError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Accelerator for platform '{platform}' is unavailable: {source}")]
    AcceleratorUnavailable {
        platform: String,
        source: DeviceError,
    },

    #[error("No kernel '{kernel}' is registered for platform '{platform}'")]
    KernelNotRegistered { kernel: String, platform: String },

    #[error("Kernel '{kernel}' is already registered for platform '{platform}'")]
    AlreadyRegistered { kernel: String, platform: String },

    #[error("Kernel '{kernel}' has not been bound to a force")]
    KernelNotBound { kernel: String },

    #[error("Kernel failed to initialize and cannot be used: {0}")]
    KernelFailed(String),

    #[error("Force configuration changed after the context was initialized: {0}")]
    ConfigurationChanged(String),
}
