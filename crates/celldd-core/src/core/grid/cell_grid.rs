use super::cell::Cell;
use crate::core::models::geometry::Domain;
use itertools::iproduct;
use nalgebra::{Point3, Vector3};
use thiserror::Error;
use tracing::{debug, info};

/// Smallest usable cell budget: one inner cell plus a halo layer on every face.
pub const MIN_CELL_BUDGET: usize = 27;
/// Default upper bound on the number of cells (inner and halo) per rank.
pub const DEFAULT_MAX_NUM_CELLS: usize = 32768;
/// Number of sizing-range enlargements tried before giving up.
pub const MAX_SIZING_TRIALS: usize = 100;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Local domain length along axis {axis} must be positive and finite, got {length}")]
    DegenerateDomain { axis: usize, length: f64 },

    #[error("Invalid interaction range: cutoff {cutoff}, skin {skin}")]
    InvalidRange { cutoff: f64, skin: f64 },

    #[error("Interaction range {range} exceeds the local domain length {length} along axis {axis}")]
    RangeExceedsDomain { axis: usize, range: f64, length: f64 },

    #[error("Cell budget must be at least {MIN_CELL_BUDGET} cells, got {budget}")]
    BudgetTooSmall { budget: usize },

    #[error("Cannot enlarge the sizing range: computed step {step} is not positive")]
    NonPositiveSizingStep { step: f64 },

    #[error("No cell grid with at most {budget} cells found within {trials} sizing trials")]
    NoSuitableGrid { budget: usize, trials: usize },

    #[error(
        "Position {position:?} maps to cell coordinate {coordinate} on periodic axis {axis}, outside 1..={inner}"
    )]
    PositionOutOfRange {
        axis: usize,
        position: [f64; 3],
        coordinate: i64,
        inner: usize,
    },
}

/// The link-cell grid of one rank.
///
/// The grid covers the rank's domain with `inner_dims` cells per axis and adds one halo layer
/// on each face, so the full grid has `ghost_dims = inner_dims + 2` cells per axis. Cells are
/// addressed by the linear index `x + gx * (y + gy * z)` over the ghost dimensions; inner
/// cells have coordinates in `1..=inner_dims` on every axis.
#[derive(Debug, Clone)]
pub struct CellGrid {
    domain: Domain,
    periodic: [bool; 3],
    ghost_dims: [usize; 3],
    inner_dims: [usize; 3],
    cell_size: Vector3<f64>,
    inv_cell_size: Vector3<f64>,
    cutoff: f64,
    sizing_range: f64,
    max_skin: f64,
    strict: bool,
    inner: Vec<usize>,
    halo: Vec<usize>,
    neighbors: Vec<Vec<usize>>,
}

fn ghost_dims_for(size: &Vector3<f64>, range: f64) -> [usize; 3] {
    let mut dims = [0; 3];
    for axis in 0..3 {
        dims[axis] = ((size[axis] / range).floor() as usize).saturating_add(2).max(3);
    }
    dims
}

fn total_cells(dims: [usize; 3]) -> usize {
    dims.iter().fold(1usize, |acc, &d| acc.saturating_mul(d))
}

impl CellGrid {
    /// Sizes a cell grid for `domain`.
    ///
    /// Each axis gets `floor(len / range)` inner cells (at least one), with
    /// `range = cutoff + skin`. When the resulting total exceeds `max_num_cells`, the sizing
    /// range is enlarged in steps of `(max_len / 2 - range) / 100` until the grid fits.
    ///
    /// # Arguments
    ///
    /// * `domain` - The rank's half-open domain.
    /// * `periodic` - Periodicity of the global box, used when locating positions.
    /// * `cutoff` - The interaction cutoff.
    /// * `skin` - Extra distance added to the cutoff.
    /// * `max_num_cells` - Budget for inner plus halo cells.
    ///
    /// # Errors
    ///
    /// All errors describe configurations that cannot be decomposed and are fatal.
    pub fn build(
        domain: &Domain,
        periodic: [bool; 3],
        cutoff: f64,
        skin: f64,
        max_num_cells: usize,
    ) -> Result<Self, GridError> {
        let size = domain.size();
        for axis in 0..3 {
            let length = size[axis];
            if !(length.is_finite() && length > 0.0) {
                return Err(GridError::DegenerateDomain { axis, length });
            }
        }
        if !(cutoff.is_finite() && cutoff > 0.0 && skin.is_finite() && skin >= 0.0) {
            return Err(GridError::InvalidRange { cutoff, skin });
        }
        if max_num_cells < MIN_CELL_BUDGET {
            return Err(GridError::BudgetTooSmall {
                budget: max_num_cells,
            });
        }

        let mut range = cutoff + skin;
        for axis in 0..3 {
            if range > size[axis] {
                return Err(GridError::RangeExceedsDomain {
                    axis,
                    range,
                    length: size[axis],
                });
            }
        }

        let mut ghost_dims = ghost_dims_for(&size, range);
        if total_cells(ghost_dims) > max_num_cells {
            let step = (size.max() / 2.0 - range) / MAX_SIZING_TRIALS as f64;
            if !(step > 0.0) {
                return Err(GridError::NonPositiveSizingStep { step });
            }
            let mut fits = false;
            for _ in 0..MAX_SIZING_TRIALS {
                range += step;
                ghost_dims = ghost_dims_for(&size, range);
                if total_cells(ghost_dims) <= max_num_cells {
                    fits = true;
                    break;
                }
            }
            if !fits {
                return Err(GridError::NoSuitableGrid {
                    budget: max_num_cells,
                    trials: MAX_SIZING_TRIALS,
                });
            }
            debug!(range, budget = max_num_cells, "Enlarged cell sizing range to fit the budget.");
        }

        let inner_dims = ghost_dims.map(|d| d - 2);
        let mut cell_size = Vector3::zeros();
        let mut inv_cell_size = Vector3::zeros();
        for axis in 0..3 {
            cell_size[axis] = size[axis] / inner_dims[axis] as f64;
            inv_cell_size[axis] = inner_dims[axis] as f64 / size[axis];
        }
        let max_skin = cell_size.min() - cutoff;

        let mut grid = Self {
            domain: *domain,
            periodic,
            ghost_dims,
            inner_dims,
            cell_size,
            inv_cell_size,
            cutoff,
            sizing_range: range,
            max_skin,
            strict: false,
            inner: Vec::new(),
            halo: Vec::new(),
            neighbors: Vec::new(),
        };

        let count = grid.cell_count();
        let (inner, halo): (Vec<usize>, Vec<usize>) = (0..count).partition(|&c| grid.is_inner(c));
        grid.neighbors = (0..count)
            .map(|c| {
                if grid.is_inner(c) {
                    grid.upper_half_neighbors(c)
                } else {
                    Vec::new()
                }
            })
            .collect();
        grid.inner = inner;
        grid.halo = halo;

        info!(
            ghost_dims = ?grid.ghost_dims,
            cell_size = ?[cell_size.x, cell_size.y, cell_size.z],
            max_skin,
            "Cell grid built."
        );
        Ok(grid)
    }

    /// Enables reporting of out-of-domain positions on periodic axes as errors.
    pub fn with_strict_checks(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn ghost_dims(&self) -> [usize; 3] {
        self.ghost_dims
    }

    pub fn inner_dims(&self) -> [usize; 3] {
        self.inner_dims
    }

    pub fn cell_size(&self) -> &Vector3<f64> {
        &self.cell_size
    }

    pub fn inv_cell_size(&self) -> &Vector3<f64> {
        &self.inv_cell_size
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// The range the grid was finally sized for; never below `cutoff + skin`.
    pub fn sizing_range(&self) -> f64 {
        self.sizing_range
    }

    /// Largest skin the grid supports: `min(cell_size) - cutoff`.
    pub fn max_skin(&self) -> f64 {
        self.max_skin
    }

    pub fn cell_count(&self) -> usize {
        total_cells(self.ghost_dims)
    }

    pub fn linear_index(&self, position: [usize; 3]) -> usize {
        position[0] + self.ghost_dims[0] * (position[1] + self.ghost_dims[1] * position[2])
    }

    pub fn grid_position(&self, index: usize) -> [usize; 3] {
        let [gx, gy, _] = self.ghost_dims;
        [index % gx, (index / gx) % gy, index / (gx * gy)]
    }

    pub fn is_inner(&self, index: usize) -> bool {
        let position = self.grid_position(index);
        (0..3).all(|axis| (1..=self.inner_dims[axis]).contains(&position[axis]))
    }

    /// Linear indices of all inner cells in ascending order.
    pub fn inner_cells(&self) -> &[usize] {
        &self.inner
    }

    /// Linear indices of all halo cells in ascending order.
    pub fn halo_cells(&self) -> &[usize] {
        &self.halo
    }

    /// Upper-half neighbour list of `cell`: the cell itself and every adjacent cell with a
    /// linear index not below its own. Empty for halo cells.
    pub fn neighbor_list(&self, cell: usize) -> &[usize] {
        self.neighbors.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Allocates empty cells carrying their neighbour lists.
    pub fn allocate_cells(&self) -> Vec<Cell> {
        self.neighbors
            .iter()
            .map(|neighbors| Cell::with_neighbors(neighbors))
            .collect()
    }

    /// Linear indices of the sub-box `lo..=hi` (inclusive, ghost coordinates), with x varying
    /// slowest. Empty for an invalid range.
    pub fn sub_grid_indices(&self, lo: [usize; 3], hi: [usize; 3]) -> Vec<usize> {
        if (0..3).any(|axis| lo[axis] > hi[axis] || hi[axis] >= self.ghost_dims[axis]) {
            return Vec::new();
        }
        iproduct!(lo[0]..=hi[0], lo[1]..=hi[1], lo[2]..=hi[2])
            .map(|(x, y, z)| self.linear_index([x, y, z]))
            .collect()
    }

    /// Maps a position to the inner cell owning it.
    ///
    /// Positions inside the domain that fall outside the inner range through rounding are
    /// clamped to the edge cell, as are positions beyond a non-periodic face. On a periodic
    /// axis an out-of-domain position is an error in strict mode and clamped otherwise.
    pub fn locate(&self, position: &Point3<f64>) -> Result<usize, GridError> {
        let mut coordinates = [0; 3];
        for axis in 0..3 {
            let raw = self.raw_coordinate(position, axis);
            let inner = self.inner_dims[axis];
            if (1..=inner as i64).contains(&raw) {
                coordinates[axis] = raw as usize;
                continue;
            }
            let inside = self.domain.contains_on_axis(position, axis);
            if self.strict && self.periodic[axis] && !inside {
                return Err(GridError::PositionOutOfRange {
                    axis,
                    position: [position.x, position.y, position.z],
                    coordinate: raw,
                    inner,
                });
            }
            coordinates[axis] = raw.clamp(1, inner as i64) as usize;
        }
        Ok(self.linear_index(coordinates))
    }

    /// Maps a position to an inner cell, always clamping to the inner range.
    pub fn locate_capped(&self, position: &Point3<f64>) -> usize {
        let mut coordinates = [0; 3];
        for axis in 0..3 {
            let raw = self.raw_coordinate(position, axis);
            coordinates[axis] = raw.clamp(1, self.inner_dims[axis] as i64) as usize;
        }
        self.linear_index(coordinates)
    }

    fn raw_coordinate(&self, position: &Point3<f64>, axis: usize) -> i64 {
        ((position[axis] - self.domain.lower[axis]) * self.inv_cell_size[axis]).floor() as i64 + 1
    }

    fn upper_half_neighbors(&self, cell: usize) -> Vec<usize> {
        let [x, y, z] = self.grid_position(cell);
        iproduct!(-1isize..=1, -1isize..=1, -1isize..=1)
            .map(|(dz, dy, dx)| {
                self.linear_index([
                    x.saturating_add_signed(dx),
                    y.saturating_add_signed(dy),
                    z.saturating_add_signed(dz),
                ])
            })
            .filter(|&neighbor| neighbor >= cell)
            .collect()
    }
}
