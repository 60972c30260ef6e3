use super::geometry::{BoxGeometry, Domain};
use super::ids::Rank;
use nalgebra::Point3;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecompositionError {
    #[error("Box length along axis {axis} must be positive and finite, got {length}")]
    InvalidBoxLength { axis: usize, length: f64 },

    #[error("At least one rank is required")]
    NoRanks,

    #[error("Process grid {grid:?} holds {cells} rank(s), but {ranks} were requested")]
    GridMismatch {
        grid: [usize; 3],
        cells: usize,
        ranks: usize,
    },

    #[error("Rank {rank} is outside a process grid of {size} rank(s)")]
    RankOutOfRange { rank: Rank, size: usize },
}

/// The 3-D arrangement of ranks tiling the global box.
///
/// Ranks are numbered `x + nx * (y + ny * z)` from their grid position. Every rank owns an
/// equally sized domain, so all ranks build cell grids of identical shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGrid {
    dims: [usize; 3],
}

impl ProcessGrid {
    /// Creates a process grid with explicit dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::NoRanks`] if any dimension is zero.
    pub fn new(dims: [usize; 3]) -> Result<Self, DecompositionError> {
        if dims.contains(&0) {
            return Err(DecompositionError::NoRanks);
        }
        Ok(Self { dims })
    }

    /// Creates an explicit grid and checks it holds exactly `ranks` ranks.
    pub fn with_rank_count(dims: [usize; 3], ranks: usize) -> Result<Self, DecompositionError> {
        let grid = Self::new(dims)?;
        if grid.size() != ranks {
            return Err(DecompositionError::GridMismatch {
                grid: dims,
                cells: grid.size(),
                ranks,
            });
        }
        Ok(grid)
    }

    /// Factorizes `ranks` into the most cube-like grid, largest factor on the first axis.
    ///
    /// # Arguments
    ///
    /// * `ranks` - Total number of workers.
    ///
    /// # Return
    ///
    /// A grid whose dimensions multiply to `ranks` and minimise the spread between the largest
    /// and smallest factor.
    pub fn balanced(ranks: usize) -> Result<Self, DecompositionError> {
        if ranks == 0 {
            return Err(DecompositionError::NoRanks);
        }
        let mut best = [ranks, 1, 1];
        for a in (1..=ranks).filter(|a| ranks % a == 0) {
            let rest = ranks / a;
            for b in (1..=rest).filter(|b| rest % b == 0) {
                let mut dims = [a, b, rest / b];
                dims.sort_unstable_by(|x, y| y.cmp(x));
                if dims[0] - dims[2] < best[0] - best[2] {
                    best = dims;
                }
            }
        }
        Ok(Self { dims: best })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn check_rank(&self, rank: Rank) -> Result<(), DecompositionError> {
        if rank >= self.size() {
            return Err(DecompositionError::RankOutOfRange {
                rank,
                size: self.size(),
            });
        }
        Ok(())
    }

    pub fn position_of(&self, rank: Rank) -> [usize; 3] {
        let [nx, ny, _] = self.dims;
        [rank % nx, (rank / nx) % ny, rank / (nx * ny)]
    }

    pub fn rank_at(&self, position: [usize; 3]) -> Rank {
        let [nx, ny, _] = self.dims;
        position[0] + nx * (position[1] + ny * position[2])
    }

    /// Returns the half-open domain owned by `rank`.
    pub fn domain_of(&self, rank: Rank, geometry: &BoxGeometry) -> Domain {
        let position = self.position_of(rank);
        let mut lower = Point3::origin();
        let mut upper = Point3::origin();
        for axis in 0..3 {
            let length = geometry.lengths()[axis];
            let n = self.dims[axis];
            lower[axis] = length * position[axis] as f64 / n as f64;
            upper[axis] = if position[axis] + 1 == n {
                length
            } else {
                length * (position[axis] + 1) as f64 / n as f64
            };
        }
        Domain::new(lower, upper)
    }

    /// Neighbour rank per direction (index `2 * axis + face`, face 0 = low, 1 = high).
    ///
    /// Periodic axes wrap around; a non-periodic global face has no neighbour. A rank can be
    /// its own neighbour when an axis holds a single rank.
    pub fn neighbors(&self, rank: Rank, geometry: &BoxGeometry) -> [Option<Rank>; 6] {
        let position = self.position_of(rank);
        let mut neighbors = [None; 6];
        for axis in 0..3 {
            let n = self.dims[axis];
            let here = position[axis];
            let periodic = geometry.is_periodic(axis);

            let low = if here > 0 {
                Some(here - 1)
            } else if periodic {
                Some(n - 1)
            } else {
                None
            };
            let high = if here + 1 < n {
                Some(here + 1)
            } else if periodic {
                Some(0)
            } else {
                None
            };

            for (face, coordinate) in [low, high].into_iter().enumerate() {
                neighbors[2 * axis + face] = coordinate.map(|c| {
                    let mut target = position;
                    target[axis] = c;
                    self.rank_at(target)
                });
            }
        }
        neighbors
    }

    /// Boundary sign per direction: `+1` when sending across the low periodic face of the box,
    /// `-1` across the high periodic face, `0` otherwise. Multiplied by the box length it
    /// shifts transmitted ghost positions into the receiver's frame.
    pub fn boundary_signs(&self, rank: Rank, geometry: &BoxGeometry) -> [i8; 6] {
        let position = self.position_of(rank);
        let mut signs = [0; 6];
        for axis in 0..3 {
            if !geometry.is_periodic(axis) {
                continue;
            }
            if position[axis] == 0 {
                signs[2 * axis] = 1;
            }
            if position[axis] + 1 == self.dims[axis] {
                signs[2 * axis + 1] = -1;
            }
        }
        signs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn open_box() -> BoxGeometry {
        BoxGeometry::new(Vector3::repeat(10.0), [false; 3]).unwrap()
    }

    #[test]
    fn balanced_factorization_prefers_cubes() {
        assert_eq!(ProcessGrid::balanced(1).unwrap().dims(), [1, 1, 1]);
        assert_eq!(ProcessGrid::balanced(2).unwrap().dims(), [2, 1, 1]);
        assert_eq!(ProcessGrid::balanced(8).unwrap().dims(), [2, 2, 2]);
        assert_eq!(ProcessGrid::balanced(12).unwrap().dims(), [3, 2, 2]);
        assert_eq!(ProcessGrid::balanced(7).unwrap().dims(), [7, 1, 1]);
        assert_eq!(ProcessGrid::balanced(0), Err(DecompositionError::NoRanks));
    }

    #[test]
    fn explicit_grid_must_match_rank_count() {
        let err = ProcessGrid::with_rank_count([2, 2, 1], 3).unwrap_err();
        assert!(matches!(err, DecompositionError::GridMismatch { cells: 4, .. }));
        assert!(ProcessGrid::with_rank_count([2, 2, 1], 4).is_ok());
    }

    #[test]
    fn rank_position_round_trip() {
        let grid = ProcessGrid::new([3, 2, 2]).unwrap();
        for rank in 0..grid.size() {
            assert_eq!(grid.rank_at(grid.position_of(rank)), rank);
        }
        assert_eq!(grid.position_of(4), [1, 1, 0]);
    }

    #[test]
    fn domains_tile_the_box() {
        let geometry = BoxGeometry::cube(10.0).unwrap();
        let grid = ProcessGrid::new([3, 1, 1]).unwrap();
        let d0 = grid.domain_of(0, &geometry);
        let d1 = grid.domain_of(1, &geometry);
        let d2 = grid.domain_of(2, &geometry);
        assert_eq!(d0.lower.x, 0.0);
        assert_eq!(d0.upper.x, d1.lower.x);
        assert_eq!(d1.upper.x, d2.lower.x);
        assert_eq!(d2.upper.x, 10.0);
        assert_eq!(d1.upper.y, 10.0);
    }

    #[test]
    fn periodic_neighbors_wrap_and_alias_self() {
        let geometry = BoxGeometry::cube(10.0).unwrap();
        let grid = ProcessGrid::new([2, 1, 1]).unwrap();
        let neighbors = grid.neighbors(0, &geometry);
        assert_eq!(neighbors[0], Some(1));
        assert_eq!(neighbors[1], Some(1));
        assert_eq!(&neighbors[2..], &[Some(0); 4]);
    }

    #[test]
    fn open_faces_have_no_neighbor() {
        let grid = ProcessGrid::new([3, 1, 1]).unwrap();
        let neighbors = grid.neighbors(0, &open_box());
        assert_eq!(neighbors[0], None);
        assert_eq!(neighbors[1], Some(1));
        assert_eq!(&neighbors[2..], &[None; 4]);
        assert_eq!(grid.neighbors(2, &open_box())[1], None);
    }

    #[test]
    fn boundary_signs_only_on_periodic_box_faces() {
        let geometry = BoxGeometry::cube(10.0).unwrap();
        let grid = ProcessGrid::new([2, 1, 1]).unwrap();
        assert_eq!(grid.boundary_signs(0, &geometry), [1, 0, 1, -1, 1, -1]);
        assert_eq!(grid.boundary_signs(1, &geometry), [0, -1, 1, -1, 1, -1]);
        assert_eq!(grid.boundary_signs(0, &open_box()), [0; 6]);
    }
}
