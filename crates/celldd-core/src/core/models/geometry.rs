use super::process_grid::DecompositionError;
use nalgebra::{Point3, Vector3};

/// The global simulation box: edge lengths and per-axis periodicity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    lengths: Vector3<f64>,
    periodic: [bool; 3],
}

impl BoxGeometry {
    /// Creates a box anchored at the origin.
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::InvalidBoxLength`] if any edge is non-positive or not finite.
    pub fn new(lengths: Vector3<f64>, periodic: [bool; 3]) -> Result<Self, DecompositionError> {
        for axis in 0..3 {
            let length = lengths[axis];
            if !(length.is_finite() && length > 0.0) {
                return Err(DecompositionError::InvalidBoxLength { axis, length });
            }
        }
        Ok(Self { lengths, periodic })
    }

    /// A fully periodic cube.
    pub fn cube(side: f64) -> Result<Self, DecompositionError> {
        Self::new(Vector3::repeat(side), [true; 3])
    }

    pub fn lengths(&self) -> &Vector3<f64> {
        &self.lengths
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodic[axis]
    }
}

/// The region owned by one rank, half-open on every axis: `lower <= x < upper`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub lower: Point3<f64>,
    pub upper: Point3<f64>,
}

impl Domain {
    pub fn new(lower: Point3<f64>, upper: Point3<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn size(&self) -> Vector3<f64> {
        self.upper - self.lower
    }

    pub fn contains_on_axis(&self, position: &Point3<f64>, axis: usize) -> bool {
        position[axis] >= self.lower[axis] && position[axis] < self.upper[axis]
    }

    pub fn contains(&self, position: &Point3<f64>) -> bool {
        (0..3).all(|axis| self.contains_on_axis(position, axis))
    }
}
