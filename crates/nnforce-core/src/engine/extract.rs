use super::accelerator::{Accelerator, Bindings};
use super::error::ForceError;
use super::execution::{EvaluationError, EvaluationStage};
use crate::core::state::StepTotals;
use crate::core::tensor::{HostTensor, ShapeMismatchError, TensorLayout};
use nalgebra::Vector3;

/// Graph energies are reported in the host's kJ/mol.
pub const ENERGY_CONVERSION: f64 = 1.0;
/// Graph forces are reported in the host's kJ/mol/nm.
pub const FORCE_CONVERSION: f64 = 1.0;

/// Which quantities the host asked for in the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeFlags {
    pub energy: bool,
    pub forces: bool,
}

impl ComputeFlags {
    pub const ALL: ComputeFlags = ComputeFlags {
        energy: true,
        forces: true,
    };
    pub const ENERGY_ONLY: ComputeFlags = ComputeFlags {
        energy: true,
        forces: false,
    };
    pub const FORCES_ONLY: ComputeFlags = ComputeFlags {
        energy: false,
        forces: true,
    };
}

impl Default for ComputeFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// Copies the graph's energy and force outputs into the host's step totals.
///
/// The force tensor is already the negated energy gradient, so it is added as is, scaled
/// only by [`FORCE_CONVERSION`]. Host staging tensors are allocated once and reused.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    particle_count: usize,
    energy: HostTensor,
    forces: HostTensor,
}

impl ResultExtractor {
    pub fn new(layout: &TensorLayout) -> Self {
        Self {
            particle_count: layout.particle_count,
            energy: HostTensor::zeros(layout.energy, 1),
            forces: HostTensor::zeros(layout.forces, layout.particle_count * 3),
        }
    }

    /// Waits for the accelerator stream, reads the outputs and adds the requested
    /// quantities into `totals`. Returns the energy contribution of this step.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeMismatchError::ParticleCount`] if `totals` does not hold one force
    /// per particle, and [`EvaluationError`] if the device cannot be read. `totals` is
    /// untouched in both cases.
    pub fn extract<A: Accelerator>(
        &mut self,
        accelerator: &mut A,
        outputs: &Bindings<A::Buffer>,
        flags: ComputeFlags,
        totals: &mut StepTotals,
    ) -> Result<f64, ForceError> {
        if totals.particle_count() != self.particle_count {
            return Err(ShapeMismatchError::ParticleCount {
                expected: self.particle_count,
                found: totals.particle_count(),
            }
            .into());
        }
        accelerator
            .synchronize()
            .map_err(|e| EvaluationError::new(EvaluationStage::Synchronize, e))?;

        accelerator
            .download(&outputs.energy, self.energy.view_mut())
            .map_err(|e| EvaluationError::new(EvaluationStage::Download, e))?;
        if flags.forces {
            accelerator
                .download(&outputs.forces, self.forces.view_mut())
                .map_err(|e| EvaluationError::new(EvaluationStage::Download, e))?;
        }

        let energy = self.energy.get(0) * ENERGY_CONVERSION;
        if flags.energy {
            totals.potential_energy += energy;
        }
        if flags.forces {
            for (i, force) in totals.forces.iter_mut().enumerate() {
                *force += Vector3::new(
                    self.forces.get(3 * i),
                    self.forces.get(3 * i + 1),
                    self.forces.get(3 * i + 2),
                ) * FORCE_CONVERSION;
            }
        }
        Ok(energy)
    }
}
