use celldd::core::grid::cell_grid::DEFAULT_MAX_NUM_CELLS;

pub struct DefaultsConfig {
    pub periodic: [bool; 3],
    pub ranks: usize,
    pub max_num_cells: usize,
    pub particles: usize,
    pub steps: usize,
    pub rebuild_every: usize,
    pub seed: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            periodic: [true; 3],
            ranks: 1,
            max_num_cells: DEFAULT_MAX_NUM_CELLS,
            particles: 1000,
            steps: 100,
            rebuild_every: 10,
            seed: 42,
        }
    }
}

impl DefaultsConfig {
    /// Largest per-axis step that keeps the accumulated drift between two rebuilds within half
    /// the skin.
    pub fn max_displacement(&self, skin: f64, rebuild_every: usize) -> f64 {
        skin / (2.0 * 3f64.sqrt() * rebuild_every as f64)
    }
}
