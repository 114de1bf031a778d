use nalgebra::Vector3;

/// The host's running totals for one simulation step.
///
/// Every force term adds its contribution into the same totals, so a term never overwrites
/// what other terms have already accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTotals {
    pub potential_energy: f64,
    pub forces: Vec<Vector3<f64>>,
}

impl StepTotals {
    pub fn new(particle_count: usize) -> Self {
        Self {
            potential_energy: 0.0,
            forces: vec![Vector3::zeros(); particle_count],
        }
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.forces.len()
    }

    /// Zeroes the totals in place at the start of a new step.
    pub fn reset(&mut self) {
        self.potential_energy = 0.0;
        self.forces.iter_mut().for_each(|f| *f = Vector3::zeros());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_zeroed_totals() {
        let totals = StepTotals::new(4);
        assert_eq!(totals.particle_count(), 4);
        assert_eq!(totals.potential_energy, 0.0);
        assert!(totals.forces.iter().all(|f| *f == Vector3::zeros()));
    }

    #[test]
    fn reset_clears_energy_and_forces_without_resizing() {
        let mut totals = StepTotals::new(2);
        totals.potential_energy = 12.5;
        totals.forces[1] = Vector3::new(1.0, -2.0, 3.0);

        totals.reset();

        assert_eq!(totals, StepTotals::new(2));
    }
}
