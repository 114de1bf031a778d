use super::accelerator::Accelerator;
use super::config::PlatformConfig;
use super::error::ForceError;
use super::execution::ExecutionContext;
use super::extract::ComputeFlags;
use crate::core::force::NeuralNetworkForce;
use crate::core::graph::GraphDescriptor;
use crate::core::pbc::PeriodicBox;
use crate::core::state::StepTotals;
use nalgebra::Vector3;
use tracing::{debug, error, info};

/// Name under which the neural-network force kernel is registered.
pub const CALC_NEURAL_NETWORK_FORCE: &str = "CalcNeuralNetworkForce";

/// A platform-specific kernel computing one neural-network force in one simulation context.
pub trait CalcNeuralForceKernel: Send {
    fn name(&self) -> &str;

    /// Records the force and the particle count of the simulation context. Compilation is
    /// deferred to the first call of [`execute`](Self::execute). A kernel is bound once.
    fn initialize(
        &mut self,
        particle_count: usize,
        force: &NeuralNetworkForce,
    ) -> Result<(), ForceError>;

    /// Computes this step's contribution and adds it into `totals`, returning the energy.
    fn execute(
        &mut self,
        positions: &[Vector3<f64>],
        periodic_box: Option<&PeriodicBox>,
        flags: ComputeFlags,
        totals: &mut StepTotals,
    ) -> Result<f64, ForceError>;

    fn is_initialized(&self) -> bool;
}

enum KernelState<A: Accelerator> {
    Uninitialized(A),
    Initialized(Box<ExecutionContext<A>>),
    Failed(String),
}

struct KernelBinding {
    graph: GraphDescriptor,
    particle_count: usize,
}

/// The neural-network force kernel for any accelerator.
///
/// The kernel moves from `Uninitialized` to `Initialized` the first time it executes, which
/// is when the graph is compiled and the device buffers are allocated. There is no way back:
/// a kernel whose initialization failed stays `Failed`, and reinitializing requires a new
/// simulation context.
pub struct NeuralForceKernel<A: Accelerator> {
    config: PlatformConfig,
    binding: Option<KernelBinding>,
    state: KernelState<A>,
}

impl<A: Accelerator> NeuralForceKernel<A> {
    pub fn new(accelerator: A, config: PlatformConfig) -> Self {
        Self {
            config,
            binding: None,
            state: KernelState::Uninitialized(accelerator),
        }
    }

    /// The execution context, once the kernel has executed for the first time.
    pub fn execution_context(&self) -> Option<&ExecutionContext<A>> {
        match &self.state {
            KernelState::Initialized(context) => Some(context.as_ref()),
            _ => None,
        }
    }

    fn context(&mut self) -> Result<&mut ExecutionContext<A>, ForceError> {
        if let KernelState::Uninitialized(_) = self.state {
            let binding = self.binding.as_ref().ok_or_else(|| ForceError::KernelNotBound {
                kernel: CALC_NEURAL_NETWORK_FORCE.to_string(),
            })?;
            let previous = std::mem::replace(
                &mut self.state,
                KernelState::Failed("initialization interrupted".to_string()),
            );
            if let KernelState::Uninitialized(accelerator) = previous {
                match ExecutionContext::new(
                    accelerator,
                    &binding.graph,
                    binding.particle_count,
                    &self.config,
                ) {
                    Ok(context) => {
                        info!(
                            "Kernel '{}' initialized on platform '{}'.",
                            CALC_NEURAL_NETWORK_FORCE, self.config.platform_name
                        );
                        self.state = KernelState::Initialized(Box::new(context));
                    }
                    Err(e) => {
                        error!("Kernel initialization failed: {}", e);
                        self.state = KernelState::Failed(e.to_string());
                        return Err(e);
                    }
                }
            }
        }

        match &mut self.state {
            KernelState::Initialized(context) => Ok(context.as_mut()),
            KernelState::Failed(reason) => Err(ForceError::KernelFailed(reason.clone())),
            KernelState::Uninitialized(_) => Err(ForceError::KernelNotBound {
                kernel: CALC_NEURAL_NETWORK_FORCE.to_string(),
            }),
        }
    }
}

impl<A: Accelerator> CalcNeuralForceKernel for NeuralForceKernel<A> {
    fn name(&self) -> &str {
        CALC_NEURAL_NETWORK_FORCE
    }

    fn initialize(
        &mut self,
        particle_count: usize,
        force: &NeuralNetworkForce,
    ) -> Result<(), ForceError> {
        if !matches!(self.state, KernelState::Uninitialized(_)) {
            return Err(ForceError::ConfigurationChanged(
                "kernel is already initialized".to_string(),
            ));
        }
        if self.binding.is_some() {
            return Err(ForceError::ConfigurationChanged(
                "kernel is already bound to a force".to_string(),
            ));
        }
        debug!(
            "Binding kernel to a force with {} particles (periodic: {}).",
            particle_count,
            force.uses_periodic_boundary_conditions()
        );
        self.binding = Some(KernelBinding {
            graph: force.graph().clone(),
            particle_count,
        });
        Ok(())
    }

    fn execute(
        &mut self,
        positions: &[Vector3<f64>],
        periodic_box: Option<&PeriodicBox>,
        flags: ComputeFlags,
        totals: &mut StepTotals,
    ) -> Result<f64, ForceError> {
        self.context()?
            .accumulate(positions, periodic_box, flags, totals)
    }

    fn is_initialized(&self) -> bool {
        matches!(self.state, KernelState::Initialized(_))
    }
}
