#![allow(dead_code)]

use celldd::comm::channel::ChannelTransport;
use celldd::comm::exchange::Communicator;
use celldd::core::models::geometry::BoxGeometry;
use celldd::core::models::particle::Particle;
use celldd::core::models::process_grid::ProcessGrid;
use celldd::engine::config::{DecompositionConfig, DecompositionConfigBuilder};
use celldd::engine::state::SimulationState;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub type RankComm = Communicator<ChannelTransport>;

/// A decomposition shared by all rank threads of a test.
#[derive(Debug, Clone, Copy)]
pub struct World {
    pub geometry: BoxGeometry,
    pub grid: ProcessGrid,
    pub config: DecompositionConfig,
}

impl World {
    pub fn new(geometry: BoxGeometry, dims: [usize; 3], cutoff: f64, skin: f64) -> Self {
        let config = DecompositionConfigBuilder::new()
            .cutoff(cutoff)
            .skin(skin)
            .strict_checks(true)
            .build()
            .unwrap();
        Self {
            geometry,
            grid: ProcessGrid::new(dims).unwrap(),
            config,
        }
    }

    pub fn with_strict_checks(mut self, strict: bool) -> Self {
        self.config.strict_checks = strict;
        self
    }

    /// Runs `body` once per rank, each on its own thread, and returns the results by rank.
    pub fn run<R, F>(&self, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&mut SimulationState, &RankComm) -> R + Sync,
    {
        self.run_on(ChannelTransport::mesh(self.grid.size()), body)
    }

    /// Like [`World::run`], with every send blocking until it is received.
    pub fn run_synchronous<R, F>(&self, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&mut SimulationState, &RankComm) -> R + Sync,
    {
        self.run_on(ChannelTransport::synchronous_mesh(self.grid.size()), body)
    }

    fn run_on<R, F>(&self, transports: Vec<ChannelTransport>, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&mut SimulationState, &RankComm) -> R + Sync,
    {
        let body = &body;
        std::thread::scope(|scope| {
            let handles: Vec<_> = transports
                .into_iter()
                .enumerate()
                .map(|(rank, transport)| {
                    scope.spawn(move || {
                        let mut state =
                            SimulationState::new(rank, self.config, self.geometry, self.grid)
                                .unwrap();
                        let comm = Communicator::new(transport, &self.grid, &self.geometry).unwrap();
                        body(&mut state, &comm)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        })
    }
}

/// `n` particles with ids `0..n` at reproducible positions inside the box.
pub fn random_particles(geometry: &BoxGeometry, n: usize, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let lengths = geometry.lengths();
    (0..n as u64)
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

/// Inserts the particles of `all` that fall into this rank's domain.
pub fn seed_rank(state: &mut SimulationState, all: &[Particle]) {
    for particle in all {
        if state.domain().contains(&particle.position) {
            state.insert_particle(particle.clone()).unwrap();
        }
    }
}

/// Ids of the real particles on this rank, sorted.
pub fn real_ids(state: &SimulationState) -> Vec<u64> {
    let mut ids: Vec<u64> = state.real_particles().map(|p| p.id.0).collect();
    ids.sort_unstable();
    ids
}
