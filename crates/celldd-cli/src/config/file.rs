use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBoxConfig {
    pub lengths: Option<[f64; 3]>,
    pub periodic: Option<[bool; 3]>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDecompositionConfig {
    pub node_grid: Option<[usize; 3]>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileCellsConfig {
    pub cutoff: Option<f64>,
    pub skin: Option<f64>,
    pub max_num_cells: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileChecksConfig {
    pub strict: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRunConfig {
    pub particles: Option<usize>,
    pub steps: Option<usize>,
    pub max_displacement: Option<f64>,
    pub rebuild_every: Option<usize>,
    pub seed: Option<u64>,
}

/// The configuration file as written, every key optional.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(rename = "box")]
    pub simulation_box: Option<FileBoxConfig>,
    pub decomposition: Option<FileDecompositionConfig>,
    pub cells: Option<FileCellsConfig>,
    pub checks: Option<FileChecksConfig>,
    pub run: Option<FileRunConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
