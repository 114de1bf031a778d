use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read serialized graph '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialized graph '{path}' is empty", path = path.display())]
    Empty { path: PathBuf },
    #[error("Inference engine rejected the serialized graph: {message}")]
    Compile { message: String },
}

/// The serialized computational graph that defines a force, together with whether the
/// graph expects periodic box vectors as an input.
///
/// A descriptor never changes after construction. The bytes are reference counted, so
/// cloning is cheap and several execution contexts (for example one per simulation replica)
/// can read the same graph concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDescriptor {
    serialized_graph: Arc<[u8]>,
    uses_periodic_boundary: bool,
}

impl GraphDescriptor {
    /// Reads a serialized graph from disk.
    ///
    /// The bytes are treated as an opaque blob. Whether they form a well-formed graph is
    /// decided later by the inference engine when the graph is compiled.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file is missing or unreadable and
    /// [`LoadError::Empty`] if it contains no bytes.
    pub fn from_file(path: &Path, uses_periodic_boundary: bool) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if bytes.is_empty() {
            return Err(LoadError::Empty {
                path: path.to_path_buf(),
            });
        }
        debug!(
            "Loaded serialized graph '{}' ({} bytes).",
            path.display(),
            bytes.len()
        );
        Ok(Self::from_serialized(bytes, uses_periodic_boundary))
    }

    /// Restricted construction path for graphs that were already loaded once, e.g. when a
    /// force is restored from a saved record. It bypasses the file system entirely.
    pub(crate) fn from_serialized(bytes: impl Into<Arc<[u8]>>, uses_periodic_boundary: bool) -> Self {
        Self {
            serialized_graph: bytes.into(),
            uses_periodic_boundary,
        }
    }

    pub(crate) fn with_periodic_boundary(&self, uses_periodic_boundary: bool) -> Self {
        Self {
            serialized_graph: Arc::clone(&self.serialized_graph),
            uses_periodic_boundary,
        }
    }

    #[inline]
    pub fn serialized_graph(&self) -> &[u8] {
        &self.serialized_graph
    }

    #[inline]
    pub fn uses_periodic_boundary(&self) -> bool {
        self.uses_periodic_boundary
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.serialized_graph.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.serialized_graph.is_empty()
    }

    /// Whether two descriptors share the same graph bytes, regardless of periodicity.
    pub fn same_graph(&self, other: &GraphDescriptor) -> bool {
        Arc::ptr_eq(&self.serialized_graph, &other.serialized_graph)
            || self.serialized_graph == other.serialized_graph
    }
}
