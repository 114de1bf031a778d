use crate::core::pbc::PeriodicBox;
use crate::core::tensor::{HostTensor, HostView, ShapeMismatchError, TensorLayout};
use nalgebra::Vector3;

/// Staged input tensors for one evaluation, borrowed from the marshaller.
#[derive(Debug, Clone, Copy)]
pub struct MarshalledInputs<'a> {
    pub positions: HostView<'a>,
    pub box_vectors: Option<HostView<'a>>,
}

/// Converts host coordinates into the layout and precision of the graph's input tensors.
///
/// Row `i` of the positions tensor always holds particle `i`. Positions are copied as
/// given; periodic wrapping is left to the graph, which receives the box every step.
#[derive(Debug, Clone)]
pub struct CoordinateMarshaller {
    particle_count: usize,
    positions: HostTensor,
    box_vectors: Option<HostTensor>,
}

impl CoordinateMarshaller {
    pub fn new(layout: &TensorLayout) -> Self {
        Self {
            particle_count: layout.particle_count,
            positions: HostTensor::zeros(layout.positions, layout.particle_count * 3),
            box_vectors: layout.box_vectors.map(|t| HostTensor::zeros(t, 9)),
        }
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.particle_count
    }

    #[inline]
    pub fn uses_periodic_boundary(&self) -> bool {
        self.box_vectors.is_some()
    }

    /// Writes `positions` (and the box, for periodic graphs) into the staging tensors.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeMismatchError`] if the particle count differs from the one fixed at
    /// construction, if a periodic graph receives no box, or if a non-periodic graph
    /// receives one. Nothing is written in that case.
    pub fn marshal(
        &mut self,
        positions: &[Vector3<f64>],
        periodic_box: Option<&PeriodicBox>,
    ) -> Result<MarshalledInputs<'_>, ShapeMismatchError> {
        if positions.len() != self.particle_count {
            return Err(ShapeMismatchError::ParticleCount {
                expected: self.particle_count,
                found: positions.len(),
            });
        }
        match (&mut self.box_vectors, periodic_box) {
            (Some(staging), Some(pbox)) => staging.fill_from(pbox.rows()),
            (Some(_), None) => return Err(ShapeMismatchError::MissingBoxVectors),
            (None, Some(_)) => return Err(ShapeMismatchError::UnexpectedBoxVectors),
            (None, None) => {}
        }

        self.positions
            .fill_from(positions.iter().flat_map(|p| [p.x, p.y, p.z]));

        Ok(MarshalledInputs {
            positions: self.positions.view(),
            box_vectors: self.box_vectors.as_ref().map(HostTensor::view),
        })
    }
}
