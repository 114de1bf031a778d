use super::config::PlatformConfig;
use super::error::ForceError;
use super::extract::ComputeFlags;
use super::kernel::{CALC_NEURAL_NETWORK_FORCE, CalcNeuralForceKernel};
use super::registry::KernelRegistry;
use crate::core::force::NeuralNetworkForce;
use crate::core::pbc::PeriodicBox;
use crate::core::state::StepTotals;
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Binds a [`NeuralNetworkForce`] to one simulation context.
///
/// The force definition is shared read-only; the kernel, and with it every device
/// resource, belongs to this context alone.
pub struct NeuralForceImpl {
    force: Arc<NeuralNetworkForce>,
    kernel: Box<dyn CalcNeuralForceKernel>,
    particle_count: usize,
}

impl NeuralForceImpl {
    /// Creates the platform kernel for `config` and binds it to `force`.
    ///
    /// # Errors
    ///
    /// Fails if no kernel is registered for the platform or the accelerator cannot be
    /// opened. Graph compilation happens later, on the first step.
    #[instrument(skip_all, name = "neural_force_init", fields(platform = %config.platform_name))]
    pub fn new(
        force: Arc<NeuralNetworkForce>,
        particle_count: usize,
        registry: &KernelRegistry,
        config: &PlatformConfig,
    ) -> Result<Self, ForceError> {
        let mut kernel = registry.create_kernel(CALC_NEURAL_NETWORK_FORCE, config)?;
        kernel.initialize(particle_count, &force)?;
        info!(
            "Neural network force bound to {} particles (periodic: {}).",
            particle_count,
            force.uses_periodic_boundary_conditions()
        );
        Ok(Self {
            force,
            kernel,
            particle_count,
        })
    }

    pub fn force(&self) -> &NeuralNetworkForce {
        &self.force
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    pub fn is_initialized(&self) -> bool {
        self.kernel.is_initialized()
    }

    /// Adds this force's energy and forces for the current step into `totals` and
    /// returns its energy. On error `totals` is left unchanged.
    pub fn calc_forces_and_energy(
        &mut self,
        positions: &[Vector3<f64>],
        periodic_box: Option<&PeriodicBox>,
        flags: ComputeFlags,
        totals: &mut StepTotals,
    ) -> Result<f64, ForceError> {
        self.kernel
            .execute(positions, periodic_box, flags, totals)
            .inspect_err(|e| error!("Neural network force evaluation failed: {}", e))
    }

    /// Rejects any change to the graph or the periodicity flag after binding. The graph
    /// is compiled for a fixed contract, so such changes need a new context.
    pub fn update_parameters(&mut self, force: &NeuralNetworkForce) -> Result<(), ForceError> {
        if force.uses_periodic_boundary_conditions()
            != self.force.uses_periodic_boundary_conditions()
        {
            return Err(ForceError::ConfigurationChanged(
                "periodic boundary conditions flag".to_string(),
            ));
        }
        if !force.graph().same_graph(self.force.graph()) {
            return Err(ForceError::ConfigurationChanged("serialized graph".to_string()));
        }
        Ok(())
    }
}
