use crate::core::tensor::{
    BOX_VECTORS, ENERGY, ElementType, FORCES, POSITIONS, ShapeMismatchError, TensorLayout,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Numeric precision configured on the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precision {
    Single,
    #[default]
    Mixed,
    Double,
}

impl Precision {
    /// The element type graph tensors must use when the precision policy requires a match.
    /// Mixed precision evaluates forces in single precision.
    pub fn element_type(self) -> ElementType {
        match self {
            Precision::Single | Precision::Mixed => ElementType::F32,
            Precision::Double => ElementType::F64,
        }
    }
}

/// How the bridge treats a graph whose tensor element types differ from the platform
/// precision. Host coordinates and results are always `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrecisionPolicy {
    /// Convert at the marshalling and extraction boundary.
    #[default]
    Convert,
    /// Reject graphs whose tensors do not use the platform precision.
    RequireMatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformConfig {
    pub platform_name: String,
    pub device_index: usize,
    pub precision: Precision,
    pub precision_policy: PrecisionPolicy,
}

impl PlatformConfig {
    /// Checks the tensor element types of a validated graph layout against the policy.
    pub fn check_layout(&self, layout: &TensorLayout) -> Result<(), ShapeMismatchError> {
        if self.precision_policy == PrecisionPolicy::Convert {
            return Ok(());
        }
        let expected = self.precision.element_type();
        let tensors = [
            (POSITIONS, Some(layout.positions)),
            (BOX_VECTORS, layout.box_vectors),
            (ENERGY, Some(layout.energy)),
            (FORCES, Some(layout.forces)),
        ];
        for (name, found) in tensors {
            if let Some(found) = found {
                if found != expected {
                    return Err(ShapeMismatchError::Precision {
                        name,
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("Loaded platform configuration from '{}'.", path.display());
        Self::from_toml_str(&content)
    }

    /// Parses a platform configuration. Keys are kebab-case; every key except `platform`
    /// falls back to its default when absent.
    ///
    /// ```toml
    /// platform = "CUDA"
    /// device-index = 0
    /// precision = "mixed"
    /// precision-policy = "convert"
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let partial: PartialPlatformConfig = toml::from_str(content)?;
        let mut builder = PlatformConfigBuilder::new();
        if let Some(name) = partial.platform {
            builder = builder.platform_name(name);
        }
        if let Some(index) = partial.device_index {
            builder = builder.device_index(index);
        }
        if let Some(precision) = partial.precision {
            builder = builder.precision(precision);
        }
        if let Some(policy) = partial.precision_policy {
            builder = builder.precision_policy(policy);
        }
        builder.build()
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialPlatformConfig {
    platform: Option<String>,
    #[serde(rename = "device-index")]
    device_index: Option<usize>,
    precision: Option<Precision>,
    #[serde(rename = "precision-policy")]
    precision_policy: Option<PrecisionPolicy>,
}

#[derive(Default)]
pub struct PlatformConfigBuilder {
    platform_name: Option<String>,
    device_index: Option<usize>,
    precision: Option<Precision>,
    precision_policy: Option<PrecisionPolicy>,
}

impl PlatformConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform_name(mut self, name: impl Into<String>) -> Self {
        self.platform_name = Some(name.into());
        self
    }
    pub fn device_index(mut self, index: usize) -> Self {
        self.device_index = Some(index);
        self
    }
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }
    pub fn precision_policy(mut self, policy: PrecisionPolicy) -> Self {
        self.precision_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<PlatformConfig, ConfigError> {
        Ok(PlatformConfig {
            platform_name: self
                .platform_name
                .ok_or(ConfigError::MissingParameter("platform"))?,
            device_index: self.device_index.unwrap_or(0),
            precision: self.precision.unwrap_or_default(),
            precision_policy: self.precision_policy.unwrap_or_default(),
        })
    }
}
