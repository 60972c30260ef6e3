use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{AppConfig, RunSettings};
use crate::cli::DecompositionArgs;
use crate::error::{CliError, Result};
use celldd::core::models::geometry::BoxGeometry;
use celldd::core::models::process_grid::ProcessGrid;
use celldd::engine::config::DecompositionConfigBuilder;
use celldd::engine::error::EngineError;
use nalgebra::Vector3;
use std::str::FromStr;
use tracing::{debug, warn};

/// Merges defaults, the configuration file, `--set` overrides and command-line flags, in
/// increasing order of precedence.
pub fn build_config(
    args: &DecompositionArgs,
    steps: Option<usize>,
    seed: Option<u64>,
) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::from_file(&args.config)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let box_file = file_config.simulation_box.take().unwrap_or_default();
    let lengths = box_file.lengths.ok_or_else(|| {
        CliError::Config("`box.lengths` is required in the config file.".to_string())
    })?;
    let periodic = box_file.periodic.unwrap_or(defaults.periodic);
    let geometry =
        BoxGeometry::new(Vector3::from(lengths), periodic).map_err(EngineError::from)?;

    let node_grid = file_config
        .decomposition
        .take()
        .unwrap_or_default()
        .node_grid;
    let process_grid = resolve_process_grid(args.ranks, node_grid, &defaults)?;

    let cells_file = file_config.cells.take().unwrap_or_default();
    let mut builder = DecompositionConfigBuilder::new()
        .max_num_cells(cells_file.max_num_cells.unwrap_or(defaults.max_num_cells));
    if let Some(cutoff) = cells_file.cutoff {
        builder = builder.cutoff(cutoff);
    }
    if let Some(skin) = cells_file.skin {
        builder = builder.skin(skin);
    }
    if let Some(strict) = file_config.checks.take().and_then(|checks| checks.strict) {
        builder = builder.strict_checks(strict);
    }
    let decomposition = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let run_file = file_config.run.take().unwrap_or_default();
    let rebuild_every = run_file.rebuild_every.unwrap_or(defaults.rebuild_every);
    if rebuild_every == 0 {
        return Err(CliError::Config(
            "`run.rebuild-every` must be at least 1.".to_string(),
        ));
    }
    let max_displacement = run_file.max_displacement.unwrap_or_else(|| {
        defaults.max_displacement(decomposition.cells.skin, rebuild_every)
    });
    if !(max_displacement.is_finite() && max_displacement >= 0.0) {
        return Err(CliError::Config(format!(
            "`run.max-displacement` must be non-negative and finite, got {}.",
            max_displacement
        )));
    }

    let run = RunSettings {
        particles: run_file.particles.unwrap_or(defaults.particles),
        steps: steps.or(run_file.steps).unwrap_or(defaults.steps),
        max_displacement,
        rebuild_every,
        seed: seed.or(run_file.seed).unwrap_or(defaults.seed),
    };

    let config = AppConfig {
        geometry,
        process_grid,
        decomposition,
        run,
    };
    check_drift(&config)?;
    debug!("Final configuration: {:?}", config);
    Ok(config)
}

fn resolve_process_grid(
    ranks: Option<usize>,
    node_grid: Option<[usize; 3]>,
    defaults: &DefaultsConfig,
) -> Result<ProcessGrid> {
    let grid = match (ranks, node_grid) {
        (Some(0), _) => {
            return Err(CliError::Argument(
                "--ranks must be at least 1".to_string(),
            ));
        }
        (Some(ranks), Some(dims)) => ProcessGrid::with_rank_count(dims, ranks),
        (Some(ranks), None) => ProcessGrid::balanced(ranks),
        (None, Some(dims)) => ProcessGrid::new(dims),
        (None, None) => ProcessGrid::balanced(defaults.ranks),
    };
    grid.map_err(|e| CliError::Core(e.into()))
}

/// Rejects runs in which a particle could pass through a whole domain between two rebuilds,
/// and warns when the drift exceeds what the skin covers.
fn check_drift(config: &AppConfig) -> Result<()> {
    let run = &config.run;
    let drift = run.max_displacement * run.rebuild_every as f64;
    let dims = config.process_grid.dims();
    let lengths = config.geometry.lengths();
    let narrowest = (0..3)
        .map(|axis| lengths[axis] / dims[axis] as f64)
        .fold(f64::INFINITY, f64::min);

    if drift >= narrowest {
        return Err(CliError::Config(format!(
            "Particles may drift {:.4} between rebuilds, which exceeds the narrowest domain ({:.4}). Lower `run.max-displacement` or `run.rebuild-every`.",
            drift, narrowest
        )));
    }
    let skin = config.decomposition.cells.skin;
    if drift * 3f64.sqrt() > 0.5 * skin {
        warn!(
            drift,
            skin, "Drift between rebuilds exceeds half the skin; pairs near the cutoff may be missed."
        );
    }
    Ok(())
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "cells.cutoff" => {
                config.cells.get_or_insert_with(Default::default).cutoff =
                    Some(parse_value(key, value, "float")?);
            }
            "cells.skin" => {
                config.cells.get_or_insert_with(Default::default).skin =
                    Some(parse_value(key, value, "float")?);
            }
            "cells.max-num-cells" => {
                config.cells.get_or_insert_with(Default::default).max_num_cells =
                    Some(parse_value(key, value, "integer")?);
            }
            "checks.strict" => {
                config.checks.get_or_insert_with(Default::default).strict =
                    Some(parse_value(key, value, "boolean")?);
            }
            "run.particles" => {
                config.run.get_or_insert_with(Default::default).particles =
                    Some(parse_value(key, value, "integer")?);
            }
            "run.steps" => {
                config.run.get_or_insert_with(Default::default).steps =
                    Some(parse_value(key, value, "integer")?);
            }
            "run.max-displacement" => {
                config.run.get_or_insert_with(Default::default).max_displacement =
                    Some(parse_value(key, value, "float")?);
            }
            "run.rebuild-every" => {
                config.run.get_or_insert_with(Default::default).rebuild_every =
                    Some(parse_value(key, value, "integer")?);
            }
            "run.seed" => {
                config.run.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use celldd::core::grid::cell_grid::DEFAULT_MAX_NUM_CELLS;
    use celldd::core::models::process_grid::DecompositionError;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    const BASE_CONFIG: &str = r#"
        [box]
        lengths = [10.0, 10.0, 10.0]

        [cells]
        cutoff = 2.0
        skin = 0.3
        "#;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("celldd.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn args_for(path: PathBuf) -> DecompositionArgs {
        DecompositionArgs {
            config: path,
            ranks: None,
            set_values: vec![],
        }
    }

    #[test]
    fn minimal_file_is_completed_with_defaults() {
        let (_dir, path) = write_config(BASE_CONFIG);
        let config = build_config(&args_for(path), None, None).expect("build ok");
        let defaults = DefaultsConfig::default();

        assert_eq!(config.geometry.periodic(), [true; 3]);
        assert_eq!(config.process_grid.dims(), [1, 1, 1]);
        assert_eq!(config.decomposition.cells.cutoff, 2.0);
        assert_eq!(config.decomposition.cells.max_num_cells, DEFAULT_MAX_NUM_CELLS);
        assert_eq!(config.run.particles, defaults.particles);
        assert_eq!(config.run.steps, defaults.steps);
        assert_eq!(config.run.rebuild_every, defaults.rebuild_every);
        assert_eq!(config.run.seed, defaults.seed);
        assert!(
            (config.run.max_displacement - defaults.max_displacement(0.3, 10)).abs() < 1e-15
        );
    }

    #[test]
    fn full_file_is_honoured() {
        let (_dir, path) = write_config(
            r#"
            [box]
            lengths = [20.0, 10.0, 10.0]
            periodic = [true, false, true]

            [decomposition]
            node-grid = [2, 1, 1]

            [cells]
            cutoff = 1.5
            skin = 0.5
            max-num-cells = 125

            [checks]
            strict = false

            [run]
            particles = 64
            steps = 3
            max-displacement = 0.02
            rebuild-every = 4
            seed = 5
            "#,
        );
        let config = build_config(&args_for(path), None, None).expect("build ok");

        assert_eq!(config.geometry.periodic(), [true, false, true]);
        assert_eq!(config.process_grid.dims(), [2, 1, 1]);
        assert_eq!(config.decomposition.cells.max_num_cells, 125);
        assert!(!config.decomposition.strict_checks);
        assert_eq!(
            config.run,
            RunSettings {
                particles: 64,
                steps: 3,
                max_displacement: 0.02,
                rebuild_every: 4,
                seed: 5,
            }
        );
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let (_dir, path) = write_config(include_str!("../../celldd.example.toml"));
        let config = build_config(&args_for(path), None, None).expect("build ok");
        assert_eq!(config.process_grid.size(), 4);
        assert_eq!(config.run.particles, 5000);
    }

    #[test]
    fn missing_cutoff_is_a_configuration_error() {
        let (_dir, path) = write_config("[box]\nlengths = [10.0, 10.0, 10.0]\n[cells]\nskin = 0.3\n");
        let err = build_config(&args_for(path), None, None).unwrap_err();
        match err {
            CliError::Config(message) => assert!(message.contains("cutoff")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_box_lengths_is_a_configuration_error() {
        let (_dir, path) = write_config("[cells]\ncutoff = 1.0\nskin = 0.1\n");
        let err = build_config(&args_for(path), None, None).unwrap_err();
        assert!(matches!(err, CliError::Config(message) if message.contains("box.lengths")));
    }

    #[test]
    fn set_values_and_flags_override_the_file() {
        let (_dir, path) = write_config(BASE_CONFIG);
        let mut args = args_for(path);
        args.ranks = Some(4);
        args.set_values = vec![
            "cells.skin=0.4".to_string(),
            "cells.max-num-cells=1000".to_string(),
            "checks.strict=true".to_string(),
            "run.particles=10".to_string(),
            "run.steps=7".to_string(),
            "run.seed=3".to_string(),
        ];

        let config = build_config(&args, Some(9), None).expect("build ok");
        assert_eq!(config.process_grid.size(), 4);
        assert_eq!(config.process_grid.dims(), [2, 2, 1]);
        assert!((config.decomposition.cells.skin - 0.4).abs() < 1e-12);
        assert_eq!(config.decomposition.cells.max_num_cells, 1000);
        assert!(config.decomposition.strict_checks);
        assert_eq!(config.run.particles, 10);
        assert_eq!(config.run.steps, 9);
        assert_eq!(config.run.seed, 3);
    }

    #[test]
    fn malformed_set_values_are_rejected() {
        let (_dir, path) = write_config(BASE_CONFIG);
        for bad in ["cells.skin", "cells.radius=1", "run.steps=many"] {
            let mut args = args_for(path.clone());
            args.set_values = vec![bad.to_string()];
            assert!(
                matches!(build_config(&args, None, None), Err(CliError::Config(_))),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn rank_count_must_match_the_node_grid() {
        let (_dir, path) = write_config(&format!("{BASE_CONFIG}\n[decomposition]\nnode-grid = [2, 2, 1]\n"));
        let mut args = args_for(path);
        args.ranks = Some(3);
        let err = build_config(&args, None, None).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(EngineError::Decomposition(DecompositionError::GridMismatch { .. }))
        ));

        args.ranks = Some(0);
        assert!(matches!(
            build_config(&args, None, None),
            Err(CliError::Argument(_))
        ));
    }

    #[test]
    fn drift_beyond_a_domain_is_rejected() {
        let (_dir, path) = write_config(BASE_CONFIG);
        let mut args = args_for(path);
        args.ranks = Some(2);
        args.set_values = vec![
            "run.max-displacement=1.0".to_string(),
            "run.rebuild-every=5".to_string(),
        ];
        let err = build_config(&args, None, None).unwrap_err();
        assert!(matches!(err, CliError::Config(message) if message.contains("narrowest domain")));
    }

    #[test]
    fn zero_rebuild_interval_is_rejected() {
        let (_dir, path) = write_config(BASE_CONFIG);
        let mut args = args_for(path);
        args.set_values = vec!["run.rebuild-every=0".to_string()];
        assert!(matches!(
            build_config(&args, None, None),
            Err(CliError::Config(_))
        ));
    }
}
