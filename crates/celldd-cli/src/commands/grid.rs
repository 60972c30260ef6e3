use crate::cli::GridArgs;
use crate::config::{self, AppConfig};
use crate::error::Result;
use celldd::core::models::geometry::Domain;
use celldd::core::models::ids::Rank;
use celldd::engine::state::SimulationState;
use nalgebra::Vector3;
use tracing::info;

/// The decomposition one rank would run with.
#[derive(Debug, Clone, PartialEq)]
pub struct RankGrid {
    pub rank: Rank,
    pub position: [usize; 3],
    pub domain: Domain,
    pub inner_dims: [usize; 3],
    pub cell_size: Vector3<f64>,
    pub max_skin: f64,
    pub halo_cells: usize,
}

pub fn run(args: GridArgs) -> Result<()> {
    let config = config::build_config(&args.decomposition, None, None)?;
    let grids = rank_grids(&config)?;
    info!(ranks = grids.len(), "Cell grids computed.");

    let cells = &config.decomposition.cells;
    println!(
        "cutoff {:.4}, skin {:.4}, at most {} cells per rank",
        cells.cutoff, cells.skin, cells.max_num_cells
    );
    for grid in &grids {
        let [nx, ny, nz] = grid.inner_dims;
        println!(
            "rank {:>4} at {:?}: [{:.3}, {:.3}, {:.3}] - [{:.3}, {:.3}, {:.3}], {}x{}x{} cells of {:.4} x {:.4} x {:.4}, {} halo cells, max skin {:.4}",
            grid.rank,
            grid.position,
            grid.domain.lower.x,
            grid.domain.lower.y,
            grid.domain.lower.z,
            grid.domain.upper.x,
            grid.domain.upper.y,
            grid.domain.upper.z,
            nx,
            ny,
            nz,
            grid.cell_size.x,
            grid.cell_size.y,
            grid.cell_size.z,
            grid.halo_cells,
            grid.max_skin
        );
    }
    Ok(())
}

/// Builds the state of every rank without particles and reports its cell grid.
pub fn rank_grids(config: &AppConfig) -> Result<Vec<RankGrid>> {
    (0..config.process_grid.size())
        .map(|rank| -> Result<RankGrid> {
            let state = SimulationState::new(
                rank,
                config.decomposition,
                config.geometry,
                config.process_grid,
            )?;
            let grid = state.grid();
            Ok(RankGrid {
                rank,
                position: config.process_grid.position_of(rank),
                domain: *state.domain(),
                inner_dims: grid.inner_dims(),
                cell_size: *grid.cell_size(),
                max_skin: grid.max_skin(),
                halo_cells: grid.halo_cells().len(),
            })
        })
        .collect()
}
