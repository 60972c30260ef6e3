use crate::core::grid::cell_grid::{DEFAULT_MAX_NUM_CELLS, MIN_CELL_BUDGET};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
}

/// Parameters that size the link-cell grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    pub cutoff: f64,
    pub skin: f64,
    pub max_num_cells: usize,
}

impl CellConfig {
    pub fn range(&self) -> f64 {
        self.cutoff + self.skin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecompositionConfig {
    pub cells: CellConfig,
    /// Enables the expensive consistency checks after every protocol pass.
    pub strict_checks: bool,
}

#[derive(Default)]
pub struct DecompositionConfigBuilder {
    cutoff: Option<f64>,
    skin: Option<f64>,
    max_num_cells: Option<usize>,
    strict_checks: Option<bool>,
}

impl DecompositionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn skin(mut self, skin: f64) -> Self {
        self.skin = Some(skin);
        self
    }
    pub fn max_num_cells(mut self, max_num_cells: usize) -> Self {
        self.max_num_cells = Some(max_num_cells);
        self
    }
    pub fn strict_checks(mut self, strict: bool) -> Self {
        self.strict_checks = Some(strict);
        self
    }

    /// Validates and assembles the configuration.
    ///
    /// `max_num_cells` defaults to [`DEFAULT_MAX_NUM_CELLS`]; `strict_checks` defaults to on in
    /// debug builds and off in release builds.
    pub fn build(self) -> Result<DecompositionConfig, ConfigError> {
        let cutoff = self.cutoff.ok_or(ConfigError::MissingParameter("cutoff"))?;
        let skin = self.skin.ok_or(ConfigError::MissingParameter("skin"))?;
        let max_num_cells = self.max_num_cells.unwrap_or(DEFAULT_MAX_NUM_CELLS);

        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(ConfigError::Invalid {
                parameter: "cutoff",
                reason: format!("must be positive and finite, got {cutoff}"),
            });
        }
        if !(skin.is_finite() && skin >= 0.0) {
            return Err(ConfigError::Invalid {
                parameter: "skin",
                reason: format!("must be non-negative and finite, got {skin}"),
            });
        }
        if max_num_cells < MIN_CELL_BUDGET {
            return Err(ConfigError::Invalid {
                parameter: "max_num_cells",
                reason: format!("must be at least {MIN_CELL_BUDGET}, got {max_num_cells}"),
            });
        }

        Ok(DecompositionConfig {
            cells: CellConfig {
                cutoff,
                skin,
                max_num_cells,
            },
            strict_checks: self.strict_checks.unwrap_or(cfg!(debug_assertions)),
        })
    }
}
