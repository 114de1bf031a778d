use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoxError {
    #[error("Box vectors must be in reduced form (a = (ax,0,0), b = (bx,by,0)); got a = {a:?}, b = {b:?}")]
    NotLowerTriangular { a: [f64; 3], b: [f64; 3] },
    #[error("Box vector diagonal must be strictly positive; got ({0}, {1}, {2})")]
    NonPositiveDiagonal(f64, f64, f64),
    #[error("Box vector {vector} is not reduced: |{component}| exceeds half of the preceding length")]
    NotReduced {
        vector: &'static str,
        component: &'static str,
    },
    #[error("Box vector tensor must hold 9 values, found {0}")]
    TensorLength(usize),
    #[error("Box vectors contain non-finite values")]
    NonFinite,
}

/// A periodic simulation cell in the reduced triclinic form used by molecular-dynamics
/// engines: `a` lies along x, `b` lies in the xy plane, and every off-diagonal component is
/// at most half of the corresponding diagonal length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    a: Vector3<f64>,
    b: Vector3<f64>,
    c: Vector3<f64>,
}

impl PeriodicBox {
    pub fn new(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Result<Self, BoxError> {
        if !(a.iter().chain(b.iter()).chain(c.iter()).all(|v| v.is_finite())) {
            return Err(BoxError::NonFinite);
        }
        if a.y != 0.0 || a.z != 0.0 || b.z != 0.0 {
            return Err(BoxError::NotLowerTriangular {
                a: [a.x, a.y, a.z],
                b: [b.x, b.y, b.z],
            });
        }
        if a.x <= 0.0 || b.y <= 0.0 || c.z <= 0.0 {
            return Err(BoxError::NonPositiveDiagonal(a.x, b.y, c.z));
        }
        if 2.0 * b.x.abs() > a.x {
            return Err(BoxError::NotReduced {
                vector: "b",
                component: "bx",
            });
        }
        if 2.0 * c.x.abs() > a.x {
            return Err(BoxError::NotReduced {
                vector: "c",
                component: "cx",
            });
        }
        if 2.0 * c.y.abs() > b.y {
            return Err(BoxError::NotReduced {
                vector: "c",
                component: "cy",
            });
        }
        Ok(Self { a, b, c })
    }

    pub fn orthorhombic(lx: f64, ly: f64, lz: f64) -> Result<Self, BoxError> {
        Self::new(
            Vector3::new(lx, 0.0, 0.0),
            Vector3::new(0.0, ly, 0.0),
            Vector3::new(0.0, 0.0, lz),
        )
    }

    /// Rebuilds a box from the row-major 3×3 layout of the `boxvectors` tensor.
    pub fn from_rows(values: &[f64]) -> Result<Self, BoxError> {
        if values.len() != 9 {
            return Err(BoxError::TensorLength(values.len()));
        }
        Self::new(
            Vector3::new(values[0], values[1], values[2]),
            Vector3::new(values[3], values[4], values[5]),
            Vector3::new(values[6], values[7], values[8]),
        )
    }

    /// Row-major components, row i being box vector i.
    pub fn rows(&self) -> [f64; 9] {
        [
            self.a.x, self.a.y, self.a.z, self.b.x, self.b.y, self.b.z, self.c.x, self.c.y,
            self.c.z,
        ]
    }

    /// Maps a position into the brick-shaped primary cell `[0, ax) × [0, by) × [0, cz)` by
    /// subtracting whole box vectors, starting from `c` so triclinic cells reduce correctly.
    pub fn wrap(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let mut r = *position;
        r -= self.c * (r.z / self.c.z).floor();
        r -= self.b * (r.y / self.b.y).floor();
        r -= self.a * (r.x / self.a.x).floor();
        r
    }
}
