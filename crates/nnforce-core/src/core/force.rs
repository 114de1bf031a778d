use super::graph::{GraphDescriptor, LoadError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const RECORD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Failed to parse force record: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to write force record: {0}")]
    Write(#[from] toml::ser::Error),
    #[error("Unsupported force record version {found} (supported: {supported})", supported = RECORD_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("Force record contains an empty graph")]
    EmptyGraph,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ForceRecord {
    version: u32,
    uses_periodic_boundary_conditions: bool,
    graph: Vec<u8>,
}

/// A force whose energy and forces are defined by a pre-trained computational graph.
///
/// If periodic boundary conditions are enabled, the graph must take a 3×3 tensor called
/// `boxvectors` that receives the current periodic box vectors every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeuralNetworkForce {
    graph: GraphDescriptor,
}

impl NeuralNetworkForce {
    /// Creates a force from a serialized graph saved to a binary file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let graph = GraphDescriptor::from_file(path.as_ref(), false)?;
        Ok(Self { graph })
    }

    pub(crate) fn from_descriptor(graph: GraphDescriptor) -> Self {
        Self { graph }
    }

    #[inline]
    pub fn graph(&self) -> &GraphDescriptor {
        &self.graph
    }

    #[inline]
    pub fn serialized_graph(&self) -> &[u8] {
        self.graph.serialized_graph()
    }

    #[inline]
    pub fn uses_periodic_boundary_conditions(&self) -> bool {
        self.graph.uses_periodic_boundary()
    }

    /// Must be called before the force is bound to a simulation context. A bound force is
    /// shared immutably, so later changes can only reach the context through
    /// [`NeuralForceImpl::update_parameters`](crate::engine::force_impl::NeuralForceImpl::update_parameters),
    /// which rejects them.
    pub fn set_uses_periodic_boundary_conditions(&mut self, periodic: bool) {
        self.graph = self.graph.with_periodic_boundary(periodic);
    }

    /// Serializes the force, including its graph bytes, to a TOML record.
    pub fn to_record_string(&self) -> Result<String, RecordError> {
        let record = ForceRecord {
            version: RECORD_VERSION,
            uses_periodic_boundary_conditions: self.uses_periodic_boundary_conditions(),
            graph: self.serialized_graph().to_vec(),
        };
        Ok(toml::to_string(&record)?)
    }

    /// Restores a force from a record produced by [`to_record_string`](Self::to_record_string)
    /// without touching the file system.
    pub fn from_record_str(content: &str) -> Result<Self, RecordError> {
        let record: ForceRecord = toml::from_str(content)?;
        if record.version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion {
                found: record.version,
            });
        }
        if record.graph.is_empty() {
            return Err(RecordError::EmptyGraph);
        }
        Ok(Self::from_descriptor(GraphDescriptor::from_serialized(
            record.graph,
            record.uses_periodic_boundary_conditions,
        )))
    }
}
