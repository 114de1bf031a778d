use crate::core::tensor::{
    BOX_VECTORS, ElementType, ENERGY, FORCES, GraphSignature, HostView, HostViewMut, POSITIONS,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device out of memory while allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },
    #[error("Kernel launch failed: {0}")]
    Launch(String),
    #[error("Memory transfer failed: {0}")]
    Transfer(String),
    #[error("Graph compilation failed: {0}")]
    Compile(String),
    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

/// A device-resident tensor buffer. Dropping the buffer releases the device memory.
pub trait DeviceBuffer {
    fn len(&self) -> usize;

    fn element_type(&self) -> ElementType;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn size_in_bytes(&self) -> usize {
        self.len() * self.element_type().size_in_bytes()
    }
}

/// A graph that the inference engine has compiled and optimized for one device.
pub trait CompiledGraph {
    /// The input and output tensors the graph declares.
    fn signature(&self) -> &GraphSignature;
}

/// The device buffers bound to a compiled graph, addressed by tensor name.
///
/// The set of tensors is fixed by the force contract, so the buffers live in named slots;
/// [`input`](Self::input) and [`output`](Self::output) provide the by-name view an
/// inference engine expects.
#[derive(Debug)]
pub struct Bindings<B> {
    pub positions: B,
    pub box_vectors: Option<B>,
    pub energy: B,
    pub forces: B,
}

impl<B> Bindings<B> {
    pub fn input(&self, name: &str) -> Option<&B> {
        match name {
            POSITIONS => Some(&self.positions),
            BOX_VECTORS => self.box_vectors.as_ref(),
            _ => None,
        }
    }

    pub fn output(&self, name: &str) -> Option<&B> {
        match name {
            ENERGY => Some(&self.energy),
            FORCES => Some(&self.forces),
            _ => None,
        }
    }

    pub fn output_mut(&mut self, name: &str) -> Option<&mut B> {
        match name {
            ENERGY => Some(&mut self.energy),
            FORCES => Some(&mut self.forces),
            _ => None,
        }
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&'static str, &B)> {
        std::iter::once((POSITIONS, &self.positions))
            .chain(self.box_vectors.as_ref().map(|b| (BOX_VECTORS, b)))
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&'static str, &B)> {
        [(ENERGY, &self.energy), (FORCES, &self.forces)].into_iter()
    }
}

/// One accelerator device together with the inference engine that runs graphs on it.
///
/// All operations are issued on a single in-order stream. Transfers and executions may be
/// asynchronous; [`synchronize`](Self::synchronize) blocks until every previously issued
/// operation has finished.
pub trait Accelerator: Send {
    type Buffer: DeviceBuffer + Send;
    type Graph: CompiledGraph + Send;

    fn device_name(&self) -> String;

    /// Compiles a serialized graph for this device. This is the expensive step and is
    /// performed once per execution context.
    fn compile(&mut self, serialized_graph: &[u8]) -> Result<Self::Graph, DeviceError>;

    fn allocate(
        &mut self,
        element_type: ElementType,
        len: usize,
    ) -> Result<Self::Buffer, DeviceError>;

    /// Copies host data into an existing device buffer of the same length and element type.
    fn upload(
        &mut self,
        source: HostView<'_>,
        destination: &mut Self::Buffer,
    ) -> Result<(), DeviceError>;

    fn execute(
        &mut self,
        graph: &mut Self::Graph,
        bindings: &mut Bindings<Self::Buffer>,
    ) -> Result<(), DeviceError>;

    fn synchronize(&mut self) -> Result<(), DeviceError>;

    /// Copies a device buffer back to host memory of the same length and element type.
    fn download(
        &mut self,
        source: &Self::Buffer,
        destination: HostViewMut<'_>,
    ) -> Result<(), DeviceError>;
}
