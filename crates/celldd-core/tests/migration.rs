mod common;

use celldd::core::models::geometry::BoxGeometry;
use celldd::core::models::ids::ParticleId;
use celldd::core::models::particle::Particle;
use celldd::engine::error::EngineError;
use celldd::engine::migration::exchange_and_sort;
use celldd::workflows::step::{global_particle_count, prepare_step};
use common::{World, random_particles, real_ids, seed_rank};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn assert_each_id_owned_once(per_rank: &[Vec<u64>], n: u64) {
    let mut all: Vec<u64> = per_rank.iter().flatten().copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..n).collect::<Vec<_>>());
}

#[test]
fn particle_crossing_a_rank_boundary_changes_owner_and_leaves_a_ghost() {
    let world = World::new(BoxGeometry::cube(10.0).unwrap(), [2, 1, 1], 1.0, 0.2);
    let eps = 1e-3;
    let id = ParticleId(7);

    let results = world.run(|state, comm| {
        if state.rank() == 0 {
            state
                .insert_particle(Particle::new(id, Point3::new(5.0 - eps, 5.0, 5.0)))
                .unwrap();
        }
        prepare_step(state, comm, true).unwrap();
        let owned_before = state.is_real(id);

        if state.rank() == 0 {
            state.particle_mut(id).unwrap().position.x = 5.0 + eps;
        }
        let report = prepare_step(state, comm, true).unwrap();
        let resident = state.particle(id).map(|p| p.position);
        (owned_before, state.is_real(id), resident, report)
    });

    let (was_owner0, owner0, seen0, report0) = results[0];
    let (was_owner1, owner1, seen1, report1) = results[1];
    assert!(was_owner0 && !was_owner1);
    assert!(!owner0 && owner1);
    assert_eq!(report0.migration.unwrap().sent, 1);
    assert_eq!(report1.migration.unwrap().received, 1);
    assert_eq!(report0.real, 0);
    assert_eq!(report1.real, 1);

    let ghost = seen0.expect("origin rank keeps a ghost of the particle");
    assert!((ghost.x - (5.0 + eps)).abs() < 1e-12);
    assert!((seen1.unwrap().x - (5.0 + eps)).abs() < 1e-12);
}

#[test]
fn random_walk_conserves_particles_on_four_ranks() {
    let geometry = BoxGeometry::cube(12.0).unwrap();
    let world = World::new(geometry, [2, 2, 1], 1.5, 0.3);
    let n = 300;
    let particles = random_particles(&geometry, n, 11);

    let per_rank = world.run(|state, comm| {
        seed_rank(state, &particles);
        let mut rng = StdRng::seed_from_u64(100 + state.rank() as u64);
        for step in 0..12 {
            let report = prepare_step(state, comm, step % 3 == 0).unwrap();
            assert_eq!(report.rebuilt(), step % 3 == 0);
            assert_eq!(global_particle_count(state, comm).unwrap(), n as u64);
            for particle in state.real_particles_mut() {
                particle.position += Vector3::new(
                    rng.gen_range(-0.25..0.25),
                    rng.gen_range(-0.25..0.25),
                    rng.gen_range(-0.25..0.25),
                );
            }
        }
        prepare_step(state, comm, true).unwrap();
        for particle in state.real_particles() {
            assert!(state.domain().contains(&particle.position));
        }
        real_ids(state)
    });

    assert_each_id_owned_once(&per_rank, n as u64);
}

#[test]
fn migration_works_over_rendezvous_channels() {
    let geometry = BoxGeometry::cube(12.0).unwrap();
    let world = World::new(geometry, [2, 2, 2], 1.5, 0.3);
    let n = 200;
    let particles = random_particles(&geometry, n, 5);

    let per_rank = world.run_synchronous(|state, comm| {
        seed_rank(state, &particles);
        let mut rng = StdRng::seed_from_u64(state.rank() as u64);
        for _ in 0..5 {
            prepare_step(state, comm, true).unwrap();
            for particle in state.real_particles_mut() {
                particle.position.x += rng.gen_range(-1.0..1.0);
                particle.position.z += rng.gen_range(-1.0..1.0);
            }
        }
        prepare_step(state, comm, true).unwrap();
        assert_eq!(global_particle_count(state, comm).unwrap(), n as u64);
        real_ids(state)
    });

    assert_each_id_owned_once(&per_rank, n as u64);
}

#[test]
fn particles_pushed_past_an_open_face_stay_with_the_edge_rank() {
    let geometry = BoxGeometry::new(Vector3::repeat(12.0), [false; 3]).unwrap();
    let world = World::new(geometry, [3, 1, 1], 1.5, 0.3);
    let n = 120;
    let particles = random_particles(&geometry, n, 23);

    let per_rank = world.run(|state, comm| {
        seed_rank(state, &particles);
        for _ in 0..10 {
            prepare_step(state, comm, true).unwrap();
            for particle in state.real_particles_mut() {
                particle.position.x += 0.5;
            }
        }
        prepare_step(state, comm, true).unwrap();
        assert_eq!(global_particle_count(state, comm).unwrap(), n as u64);

        let last = state.rank() + 1 == state.process_grid().size();
        let domain = *state.domain();
        for particle in state.real_particles() {
            assert!(particle.position.x >= domain.lower.x);
            assert!(particle.position.x < domain.upper.x || last);
            assert_eq!(particle.image, [0; 3]);
        }
        real_ids(state)
    });

    assert_each_id_owned_once(&per_rank, n as u64);
}

#[test]
fn wrapped_particles_record_their_image_crossings() {
    let world = World::new(BoxGeometry::cube(10.0).unwrap(), [2, 1, 1], 1.0, 0.2);
    let id = ParticleId(3);

    let results = world.run(|state, comm| {
        if state.rank() == 1 {
            state
                .insert_particle(Particle::new(id, Point3::new(9.9, 2.0, 2.0)))
                .unwrap();
        }
        prepare_step(state, comm, true).unwrap();
        if state.rank() == 1 {
            state.particle_mut(id).unwrap().position.x += 0.3;
        }
        prepare_step(state, comm, true).unwrap();
        state
            .is_real(id)
            .then(|| state.particle(id).map(|p| (p.position, p.image)))
            .flatten()
    });

    assert!(results[1].is_none());
    let (position, image) = results[0].unwrap();
    assert!((position.x - 0.2).abs() < 1e-9);
    assert_eq!(image, [1, 0, 0]);
}

#[test]
fn particle_skipping_a_whole_domain_is_caught_in_strict_mode() {
    let world = World::new(BoxGeometry::cube(12.0).unwrap(), [1, 1, 3], 1.5, 0.3);
    let id = ParticleId(4);

    let results = world.run(|state, comm| {
        if state.rank() == 0 {
            state
                .insert_particle(Particle::new(id, Point3::new(6.0, 6.0, 2.0)))
                .unwrap();
            state.particle_mut(id).unwrap().position.z = 9.0;
        }
        match exchange_and_sort(state, comm) {
            Ok(_) => None,
            Err(EngineError::ConsistencyViolation { rank, detail }) => Some((rank, detail)),
            Err(e) => panic!("unexpected error: {e}"),
        }
    });

    assert!(results[0].is_none());
    assert!(results[2].is_none());
    let (rank, detail) = results[1].clone().unwrap();
    assert_eq!(rank, 1);
    assert!(detail.contains("outside the domain [4, 8) on axis 2"), "{detail}");
}
