use se_maintenance_core::{BlockRef, Command, EntityId, FactoryMode, Vector3};
use se_maintenance_system_clustering::{ClusterScan, SingletonResolver};
use se_maintenance_system_mutation::{MutationOptions, Mutations};
use se_maintenance_world::{
    self as world,
    fixtures::{self, BlockBuilder, CheckpointBuilder, GridBuilder, SectorBuilder},
    query, World,
};

fn factory_grid() -> GridBuilder {
    GridBuilder::new(1)
        .moving(Vector3::new(4.0, 0.0, 0.0), Vector3::new(0.0, 0.1, 0.0))
        .block(BlockBuilder::new("Refinery").enabled(true).inventory("InputInventory", 0).queue(3))
        .block(BlockBuilder::new("Refinery").enabled(true).inventory("InputInventory", 2))
        .block(BlockBuilder::new("Assembler").enabled(true).queue(0))
        .block(BlockBuilder::new("Assembler").enabled(true).queue(1))
        .block(BlockBuilder::new("ReflectorLight").enabled(true))
        .block(BlockBuilder::new("ReflectorLight").enabled(false))
}

fn world_with(grid: GridBuilder) -> World {
    fixtures::world(SectorBuilder::new().grid(grid), CheckpointBuilder::new())
        .expect("fixture world is valid")
}

fn collect(world: &World, options: MutationOptions) -> Vec<Command> {
    let sector = query::sector(world);
    let mutations = Mutations::new(options);
    let mut commands = Vec::new();
    for cluster in ClusterScan::new(sector, &SingletonResolver) {
        mutations.handle(&cluster, sector, &mut commands);
    }
    commands
}

fn disable(index: usize) -> Command {
    Command::SetBlockEnabled {
        block: BlockRef::new(EntityId::new(1), index),
        enabled: false,
    }
}

#[test]
fn soft_mode_stops_only_idle_factories() {
    let world = world_with(factory_grid());
    let commands = collect(
        &world,
        MutationOptions {
            factories: Some(FactoryMode::Soft),
            ..MutationOptions::default()
        },
    );
    assert_eq!(
        commands,
        vec![disable(0), disable(2)],
        "refinery with input and assembler with queue keep running"
    );
}

#[test]
fn hard_mode_stops_every_factory() {
    let world = world_with(factory_grid());
    let commands = collect(
        &world,
        MutationOptions {
            factories: Some(FactoryMode::Hard),
            ..MutationOptions::default()
        },
    );
    assert_eq!(
        commands,
        vec![disable(0), disable(1), disable(2), disable(3)]
    );
}

#[test]
fn remaining_operators_target_their_blocks() {
    let world = world_with(factory_grid());
    let commands = collect(
        &world,
        MutationOptions {
            zero_inertia: true,
            strip_refinery_queues: true,
            disable_spotlights: true,
            factories: None,
        },
    );
    assert_eq!(
        commands,
        vec![
            Command::ZeroVelocity {
                entity: EntityId::new(1)
            },
            Command::ClearProductionQueue {
                block: BlockRef::new(EntityId::new(1), 0)
            },
            disable(4),
        ],
        "already disabled lights and refineries without a queue are skipped"
    );
}

#[test]
fn second_pass_emits_nothing() {
    let mut world = world_with(factory_grid());
    let options = MutationOptions {
        zero_inertia: true,
        factories: Some(FactoryMode::Hard),
        strip_refinery_queues: true,
        disable_spotlights: true,
    };

    let first = collect(&world, options);
    assert!(!first.is_empty());
    let mut events = Vec::new();
    for command in first {
        world::apply(&mut world, command, &mut events);
    }

    let second = collect(&world, options);
    assert!(second.is_empty(), "mutations must be idempotent: {second:?}");
}

#[test]
fn static_grids_without_velocity_are_left_alone() {
    let world = world_with(GridBuilder::new(1).stationary().block(BlockBuilder::armor()));
    let commands = collect(
        &world,
        MutationOptions {
            zero_inertia: true,
            ..MutationOptions::default()
        },
    );
    assert!(commands.is_empty());
}
