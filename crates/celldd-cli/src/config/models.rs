use celldd::core::models::geometry::BoxGeometry;
use celldd::core::models::process_grid::ProcessGrid;
use celldd::engine::config::DecompositionConfig;

/// Parameters of the random-walk driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    pub particles: usize,
    pub steps: usize,
    /// Upper bound of the uniform per-axis displacement applied every step.
    pub max_displacement: f64,
    pub rebuild_every: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AppConfig {
    pub geometry: BoxGeometry,
    pub process_grid: ProcessGrid,
    pub decomposition: DecompositionConfig,
    pub run: RunSettings,
}
