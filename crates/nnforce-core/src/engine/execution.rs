use super::accelerator::{Accelerator, Bindings, CompiledGraph, DeviceError};
use super::config::PlatformConfig;
use super::error::ForceError;
use super::extract::{ComputeFlags, ResultExtractor};
use super::marshal::CoordinateMarshaller;
use crate::core::graph::{GraphDescriptor, LoadError};
use crate::core::pbc::PeriodicBox;
use crate::core::state::StepTotals;
use crate::core::tensor::{ElementType, GraphSignature, ShapeMismatchError, TensorLayout};
use nalgebra::Vector3;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStage {
    Allocate,
    Upload,
    Execute,
    Synchronize,
    Download,
}

impl fmt::Display for EvaluationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluationStage::Allocate => "buffer allocation",
            EvaluationStage::Upload => "input upload",
            EvaluationStage::Execute => "graph execution",
            EvaluationStage::Synchronize => "stream synchronization",
            EvaluationStage::Download => "output download",
        };
        f.write_str(name)
    }
}

/// A device-side failure while evaluating the graph. The step's results must be discarded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Graph evaluation failed during {stage}: {source}")]
pub struct EvaluationError {
    pub stage: EvaluationStage,
    #[source]
    pub source: DeviceError,
}

impl EvaluationError {
    pub fn new(stage: EvaluationStage, source: DeviceError) -> Self {
        Self { stage, source }
    }
}

/// A compiled graph bound to persistent device buffers for a fixed particle count.
///
/// Construction compiles the graph and allocates every input and output buffer exactly
/// once. Evaluations only transfer data into and out of those buffers, so the number of
/// device allocations never grows after construction. Dropping the context releases the
/// compiled graph and all buffers.
pub struct ExecutionContext<A: Accelerator> {
    accelerator: A,
    graph: A::Graph,
    bindings: Bindings<A::Buffer>,
    layout: TensorLayout,
    marshaller: CoordinateMarshaller,
    extractor: ResultExtractor,
    evaluations: u64,
}

/// Handles to the output buffers of one evaluation.
///
/// Borrows the execution context, so it cannot outlive the step it belongs to.
pub struct EvaluationOutput<'a, A: Accelerator> {
    accelerator: &'a mut A,
    bindings: &'a Bindings<A::Buffer>,
    extractor: &'a mut ResultExtractor,
}

impl<A: Accelerator> EvaluationOutput<'_, A> {
    pub fn energy(&self) -> &A::Buffer {
        &self.bindings.energy
    }

    pub fn forces(&self) -> &A::Buffer {
        &self.bindings.forces
    }

    /// Synchronizes the stream and adds the requested quantities into `totals`, which must
    /// hold one force per particle of the context.
    pub fn extract_into(
        self,
        flags: ComputeFlags,
        totals: &mut StepTotals,
    ) -> Result<f64, ForceError> {
        self.extractor
            .extract(self.accelerator, self.bindings, flags, totals)
    }
}

impl<A: Accelerator> ExecutionContext<A> {
    /// Compiles `graph` for the accelerator and allocates buffers for `particle_count`
    /// particles.
    ///
    /// # Errors
    ///
    /// - [`ForceError::Load`] if the inference engine rejects the serialized graph.
    /// - [`ForceError::ShapeMismatch`] if the graph's tensors do not match the particle
    ///   count, the periodicity flag, or (under `RequireMatch`) the platform precision.
    /// - [`ForceError::Evaluation`] if a buffer cannot be allocated.
    #[instrument(skip_all, name = "execution_context_init", fields(particles = particle_count))]
    pub fn new(
        mut accelerator: A,
        graph: &GraphDescriptor,
        particle_count: usize,
        config: &PlatformConfig,
    ) -> Result<Self, ForceError> {
        info!(
            "Compiling graph ({} bytes, periodic: {}) on {}.",
            graph.len(),
            graph.uses_periodic_boundary(),
            accelerator.device_name()
        );
        let compiled = accelerator
            .compile(graph.serialized_graph())
            .map_err(|e| LoadError::Compile {
                message: e.to_string(),
            })?;

        let layout = compiled
            .signature()
            .validate(particle_count, graph.uses_periodic_boundary())?;
        config.check_layout(&layout)?;
        debug!("Graph signature accepted: {:?}", layout);

        let mut allocate = |element_type: ElementType, len: usize| {
            accelerator
                .allocate(element_type, len)
                .map_err(|e| EvaluationError::new(EvaluationStage::Allocate, e))
        };
        let bindings = Bindings {
            positions: allocate(layout.positions, particle_count * 3)?,
            box_vectors: match layout.box_vectors {
                Some(element_type) => Some(allocate(element_type, 9)?),
                None => None,
            },
            energy: allocate(layout.energy, 1)?,
            forces: allocate(layout.forces, particle_count * 3)?,
        };

        info!("Execution context ready for {} particles.", particle_count);
        Ok(Self {
            accelerator,
            graph: compiled,
            bindings,
            marshaller: CoordinateMarshaller::new(&layout),
            extractor: ResultExtractor::new(&layout),
            layout,
            evaluations: 0,
        })
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.layout.particle_count
    }

    #[inline]
    pub fn uses_periodic_boundary(&self) -> bool {
        self.layout.box_vectors.is_some()
    }

    #[inline]
    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }

    pub fn signature(&self) -> &GraphSignature {
        self.graph.signature()
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    /// Number of evaluations that ran to completion on the device.
    #[inline]
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Writes the inputs into the persistent device buffers and runs the graph.
    ///
    /// The returned handles must be extracted before the next evaluation; the borrow
    /// checker enforces this ordering.
    pub fn evaluate(
        &mut self,
        positions: &[Vector3<f64>],
        periodic_box: Option<&PeriodicBox>,
    ) -> Result<EvaluationOutput<'_, A>, ForceError> {
        let inputs = self.marshaller.marshal(positions, periodic_box)?;

        self.accelerator
            .upload(inputs.positions, &mut self.bindings.positions)
            .map_err(|e| EvaluationError::new(EvaluationStage::Upload, e))?;
        if let (Some(staged), Some(buffer)) =
            (inputs.box_vectors, self.bindings.box_vectors.as_mut())
        {
            self.accelerator
                .upload(staged, buffer)
                .map_err(|e| EvaluationError::new(EvaluationStage::Upload, e))?;
        }

        self.accelerator
            .execute(&mut self.graph, &mut self.bindings)
            .map_err(|e| EvaluationError::new(EvaluationStage::Execute, e))?;
        self.evaluations += 1;
        trace!("Evaluation {} issued.", self.evaluations);

        Ok(EvaluationOutput {
            accelerator: &mut self.accelerator,
            bindings: &self.bindings,
            extractor: &mut self.extractor,
        })
    }

    /// Evaluates the graph and adds this step's energy and forces into `totals`.
    ///
    /// On error `totals` is left exactly as it was.
    pub fn accumulate(
        &mut self,
        positions: &[Vector3<f64>],
        periodic_box: Option<&PeriodicBox>,
        flags: ComputeFlags,
        totals: &mut StepTotals,
    ) -> Result<f64, ForceError> {
        if totals.particle_count() != self.layout.particle_count {
            return Err(ShapeMismatchError::ParticleCount {
                expected: self.layout.particle_count,
                found: totals.particle_count(),
            }
            .into());
        }
        self.evaluate(positions, periodic_box)?
            .extract_into(flags, totals)
    }
}
