use std::fmt;
use thiserror::Error;

/// Input tensor holding one row of Cartesian coordinates per particle.
pub const POSITIONS: &str = "positions";
/// Optional input tensor holding the three periodic box vectors as rows.
pub const BOX_VECTORS: &str = "boxvectors";
/// Output tensor holding the potential energy.
pub const ENERGY: &str = "energy";
/// Output tensor holding the already-negated energy gradient, one row per particle.
pub const FORCES: &str = "forces";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeMismatchError {
    #[error("Particle count mismatch: expected {expected}, found {found}")]
    ParticleCount { expected: usize, found: usize },
    #[error("Force uses periodic boundary conditions but no box vectors were supplied")]
    MissingBoxVectors,
    #[error("Box vectors were supplied to a force that does not use periodic boundary conditions")]
    UnexpectedBoxVectors,
    #[error("Graph does not declare the required tensor '{name}'")]
    MissingTensor { name: &'static str },
    #[error("Tensor '{name}' has shape {found}, expected {expected}")]
    TensorShape {
        name: &'static str,
        expected: String,
        found: String,
    },
    #[error("Tensor '{name}' uses {found} elements, but the platform requires {expected}")]
    Precision {
        name: &'static str,
        expected: ElementType,
        found: ElementType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    F32,
    F64,
}

impl ElementType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
        }
    }
}

/// A single tensor dimension as declared by a compiled graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    Fixed(usize),
    /// Resolved when the execution context binds the graph to a particle count.
    Dynamic,
}

impl Dim {
    fn accepts(self, value: usize) -> bool {
        match self {
            Dim::Fixed(n) => n == value,
            Dim::Dynamic => true,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Dynamic => write!(f, "?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub dims: Vec<Dim>,
    pub element_type: ElementType,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, dims: Vec<Dim>, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            dims,
            element_type,
        }
    }

    fn shape_string(&self) -> String {
        let dims: Vec<String> = self.dims.iter().map(ToString::to_string).collect();
        format!("[{}]", dims.join(", "))
    }

    fn matches(&self, expected: &[usize]) -> bool {
        self.dims.len() == expected.len()
            && self.dims.iter().zip(expected).all(|(d, &e)| d.accepts(e))
    }
}

/// The input and output tensors a compiled graph declares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphSignature {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

/// Element types resolved for every tensor of the contract, after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorLayout {
    pub particle_count: usize,
    pub positions: ElementType,
    pub box_vectors: Option<ElementType>,
    pub energy: ElementType,
    pub forces: ElementType,
}

impl GraphSignature {
    pub fn input(&self, name: &str) -> Option<&TensorSpec> {
        self.inputs.iter().find(|t| t.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&TensorSpec> {
        self.outputs.iter().find(|t| t.name == name)
    }

    /// Checks the signature against the fixed contract: `positions` (N×3) in, optional
    /// `boxvectors` (3×3) in, `energy` (scalar) out, `forces` (N×3) out.
    ///
    /// The box input must be declared exactly when `periodic` is set. A scalar energy may be
    /// declared with zero dimensions or as a single element.
    pub fn validate(
        &self,
        particle_count: usize,
        periodic: bool,
    ) -> Result<TensorLayout, ShapeMismatchError> {
        let positions = Self::require(self.input(POSITIONS), POSITIONS, &[particle_count, 3])?;

        let box_vectors = match (self.input(BOX_VECTORS), periodic) {
            (Some(spec), true) => Some(Self::require(Some(spec), BOX_VECTORS, &[3, 3])?),
            (None, true) => return Err(ShapeMismatchError::MissingTensor { name: BOX_VECTORS }),
            (Some(_), false) => return Err(ShapeMismatchError::UnexpectedBoxVectors),
            (None, false) => None,
        };

        let energy_spec = self
            .output(ENERGY)
            .ok_or(ShapeMismatchError::MissingTensor { name: ENERGY })?;
        if !(energy_spec.dims.is_empty() || energy_spec.matches(&[1])) {
            return Err(ShapeMismatchError::TensorShape {
                name: ENERGY,
                expected: "[] or [1]".to_string(),
                found: energy_spec.shape_string(),
            });
        }

        let forces = Self::require(self.output(FORCES), FORCES, &[particle_count, 3])?;

        Ok(TensorLayout {
            particle_count,
            positions,
            box_vectors,
            energy: energy_spec.element_type,
            forces,
        })
    }

    fn require(
        spec: Option<&TensorSpec>,
        name: &'static str,
        expected: &[usize],
    ) -> Result<ElementType, ShapeMismatchError> {
        let spec = spec.ok_or(ShapeMismatchError::MissingTensor { name })?;
        if !spec.matches(expected) {
            let expected: Vec<String> = expected.iter().map(ToString::to_string).collect();
            return Err(ShapeMismatchError::TensorShape {
                name,
                expected: format!("[{}]", expected.join(", ")),
                found: spec.shape_string(),
            });
        }
        Ok(spec.element_type)
    }
}

/// Host-side staging storage for one tensor, kept in the element type the graph expects.
///
/// Staging tensors are allocated once per execution context and overwritten every step.
#[derive(Debug, Clone, PartialEq)]
pub enum HostTensor {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

#[derive(Debug, Clone, Copy)]
pub enum HostView<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
}

#[derive(Debug)]
pub enum HostViewMut<'a> {
    F32(&'a mut [f32]),
    F64(&'a mut [f64]),
}

impl HostTensor {
    pub fn zeros(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::F32 => HostTensor::F32(vec![0.0; len]),
            ElementType::F64 => HostTensor::F64(vec![0.0; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            HostTensor::F32(_) => ElementType::F32,
            HostTensor::F64(_) => ElementType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HostTensor::F32(v) => v.len(),
            HostTensor::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrites the tensor in order from `values`, converting to the stored precision.
    /// The iterator must yield exactly `len()` values.
    pub fn fill_from(&mut self, values: impl IntoIterator<Item = f64>) {
        match self {
            HostTensor::F32(v) => {
                for (slot, value) in v.iter_mut().zip(values) {
                    *slot = value as f32;
                }
            }
            HostTensor::F64(v) => {
                for (slot, value) in v.iter_mut().zip(values) {
                    *slot = value;
                }
            }
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        match self {
            HostTensor::F32(v) => f64::from(v[index]),
            HostTensor::F64(v) => v[index],
        }
    }

    pub fn view(&self) -> HostView<'_> {
        match self {
            HostTensor::F32(v) => HostView::F32(v),
            HostTensor::F64(v) => HostView::F64(v),
        }
    }

    pub fn view_mut(&mut self) -> HostViewMut<'_> {
        match self {
            HostTensor::F32(v) => HostViewMut::F32(v),
            HostTensor::F64(v) => HostViewMut::F64(v),
        }
    }
}

impl HostView<'_> {
    pub fn len(&self) -> usize {
        match self {
            HostView::F32(v) => v.len(),
            HostView::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            HostView::F32(_) => ElementType::F32,
            HostView::F64(_) => ElementType::F64,
        }
    }
}

impl HostViewMut<'_> {
    pub fn len(&self) -> usize {
        match self {
            HostViewMut::F32(v) => v.len(),
            HostViewMut::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            HostViewMut::F32(_) => ElementType::F32,
            HostViewMut::F64(_) => ElementType::F64,
        }
    }
}
