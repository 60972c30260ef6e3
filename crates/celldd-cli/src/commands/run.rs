use crate::cli::RunArgs;
use crate::config::{self, AppConfig, RunSettings};
use crate::error::{CliError, Result};
use celldd::comm::channel::ChannelTransport;
use celldd::comm::error::CommError;
use celldd::comm::exchange::Communicator;
use celldd::core::models::ids::Rank;
use celldd::core::models::particle::Particle;
use celldd::engine::error::EngineError;
use celldd::engine::state::SimulationState;
use celldd::workflows::interaction::InteractionView;
use celldd::workflows::step::{ForceKernel, compute_forces, global_particle_count, prepare_step};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, info_span};

/// Counts the pairs within the cutoff; applies no forces.
#[derive(Debug, Default)]
struct PairCounter {
    pairs: usize,
}

impl ForceKernel for PairCounter {
    fn compute(&mut self, view: &mut InteractionView<'_>) -> std::result::Result<(), EngineError> {
        self.pairs = view.build_pair_lists(view.cutoff());
        Ok(())
    }
}

/// What one rank did over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankSummary {
    pub rank: Rank,
    pub real: usize,
    pub ghosts: usize,
    pub sent: usize,
    pub received: usize,
    pub rebuilds: usize,
    /// Pairs within the cutoff over all ranks at the last step.
    pub global_pairs: u64,
}

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = config::build_config(&args.decomposition, args.steps, args.seed)?;
    let dims = config.process_grid.dims();

    println!(
        "Running {} step(s) with {} particles on {} rank(s) ({}x{}x{})...",
        config.run.steps,
        config.run.particles,
        config.process_grid.size(),
        dims[0],
        dims[1],
        dims[2]
    );
    let summaries = run_simulation(&config)?;
    print_summary(&summaries);
    Ok(())
}

/// Runs the random walk on one thread per rank and returns the per-rank summaries.
pub fn run_simulation(config: &AppConfig) -> Result<Vec<RankSummary>> {
    let particles = seed_particles(config);
    let transports = ChannelTransport::mesh(config.process_grid.size());
    info!(
        ranks = transports.len(),
        particles = particles.len(),
        "Starting rank workers."
    );

    let outcomes = std::thread::scope(|scope| -> Result<Vec<Result<RankSummary>>> {
        let particles = &particles;
        let handles = transports
            .into_iter()
            .enumerate()
            .map(|(rank, transport)| {
                std::thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || run_rank(rank, transport, config, particles))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| match handle.join() {
                Ok(outcome) => outcome.map_err(CliError::from),
                Err(_) => Err(CliError::Other(anyhow::anyhow!(
                    "Worker thread for rank {} panicked",
                    rank
                ))),
            })
            .collect())
    })?;

    let mut summaries = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for (rank, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                error!(rank, "Rank failed: {}", e);
                failures.push(e);
            }
        }
    }
    match root_cause(failures) {
        Some(e) => Err(e),
        None => Ok(summaries),
    }
}

/// Picks the failure that caused the others. A failing rank drops its transport, so its
/// peers fail with disconnects that only echo the original error.
fn root_cause(mut failures: Vec<CliError>) -> Option<CliError> {
    let is_echo = |e: &CliError| {
        matches!(
            e,
            CliError::Core(EngineError::Comm {
                source: CommError::Disconnected { .. },
                ..
            })
        )
    };
    let index = failures.iter().position(|e| !is_echo(e)).unwrap_or(0);
    (index < failures.len()).then(|| failures.swap_remove(index))
}

fn seed_particles(config: &AppConfig) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(config.run.seed);
    let lengths = config.geometry.lengths();
    (0..config.run.particles as u64)
        .map(|id| {
            let position = Point3::new(
                rng.gen_range(0.0..lengths.x),
                rng.gen_range(0.0..lengths.y),
                rng.gen_range(0.0..lengths.z),
            );
            Particle::new(id, position)
        })
        .collect()
}

fn random_walk(state: &mut SimulationState, rng: &mut StdRng, max_displacement: f64) {
    if max_displacement <= 0.0 {
        return;
    }
    for particle in state.real_particles_mut() {
        particle.position +=
            Vector3::from_fn(|_, _| rng.gen_range(-max_displacement..max_displacement));
    }
}

fn run_rank(
    rank: Rank,
    transport: ChannelTransport,
    config: &AppConfig,
    particles: &[Particle],
) -> std::result::Result<RankSummary, EngineError> {
    let span = info_span!("rank", rank);
    let _guard = span.enter();

    let comm = Communicator::new(transport, &config.process_grid, &config.geometry)
        .map_err(|source| EngineError::Comm { rank, source })?;
    let mut state = SimulationState::new(
        rank,
        config.decomposition,
        config.geometry,
        config.process_grid,
    )?;
    let own: Vec<Particle> = particles
        .iter()
        .filter(|p| state.domain().contains(&p.position))
        .cloned()
        .collect();
    for particle in own {
        state.insert_particle(particle)?;
    }
    debug!(real = state.n_real_particles(), "Initial particles placed.");

    let run: &RunSettings = &config.run;
    let expected = particles.len() as u64;
    let mut rng = StdRng::seed_from_u64(run.seed.wrapping_add(rank as u64 + 1));
    let mut kernel = PairCounter::default();
    let mut summary = RankSummary {
        rank,
        ..Default::default()
    };

    for step in 0..run.steps {
        let report = prepare_step(&mut state, &comm, step % run.rebuild_every == 0)?;
        if let Some(migration) = report.migration {
            summary.rebuilds += 1;
            summary.sent += migration.sent;
            summary.received += migration.received;
        }
        compute_forces(&mut state, &comm, &mut kernel)?;

        let total = global_particle_count(&state, &comm)?;
        if total != expected {
            return Err(EngineError::ConsistencyViolation {
                rank,
                detail: format!("step {step}: {total} particles in the system, expected {expected}"),
            });
        }
        summary.global_pairs = comm
            .all_reduce_sum(kernel.pairs as u64)
            .map_err(|source| EngineError::Comm { rank, source })?;
        debug!(
            step,
            real = report.real,
            ghosts = report.ghosts,
            pairs = summary.global_pairs,
            "Step complete."
        );

        random_walk(&mut state, &mut rng, run.max_displacement);
    }

    let report = prepare_step(&mut state, &comm, true)?;
    if let Some(migration) = report.migration {
        summary.rebuilds += 1;
        summary.sent += migration.sent;
        summary.received += migration.received;
    }
    summary.real = report.real;
    summary.ghosts = report.ghosts;
    info!(
        real = summary.real,
        sent = summary.sent,
        received = summary.received,
        "Rank finished."
    );
    Ok(summary)
}

fn print_summary(summaries: &[RankSummary]) {
    println!(
        "{:>6} {:>10} {:>10} {:>10} {:>10} {:>9}",
        "rank", "real", "ghosts", "sent", "received", "rebuilds"
    );
    for s in summaries {
        println!(
            "{:>6} {:>10} {:>10} {:>10} {:>10} {:>9}",
            s.rank, s.real, s.ghosts, s.sent, s.received, s.rebuilds
        );
    }
    let total: usize = summaries.iter().map(|s| s.real).sum();
    let migrated: usize = summaries.iter().map(|s| s.sent).sum();
    let pairs = summaries.first().map_or(0, |s| s.global_pairs);
    println!("Particles: {total}, migrations: {migrated}, pairs within cutoff at last step: {pairs}");
}
