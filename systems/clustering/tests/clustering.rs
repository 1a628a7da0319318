use se_maintenance_core::{EntityId, Vector3};
use se_maintenance_system_clustering::{
    has_joint, Cluster, ClusterResolver, ClusterScan, JointGraphResolver, JointGuard, JointLinks,
    SingletonResolver,
};
use se_maintenance_world::{
    fixtures::{BlockBuilder, GridBuilder, SectorBuilder},
    Sector,
};

fn id(value: i64) -> EntityId {
    EntityId::new(value)
}

fn sector() -> Sector {
    SectorBuilder::new()
        .grid(GridBuilder::new(1).block(BlockBuilder::armor()))
        .floating_object(2, Vector3::ZERO)
        .grid(
            GridBuilder::new(3)
                .block(BlockBuilder::armor())
                .block(BlockBuilder::new("MotorStator")),
        )
        .grid(GridBuilder::new(4).block(BlockBuilder::new("MotorRotor")))
        .grid(GridBuilder::new(5))
        .voxel_map(6, "asteroid", Vector3::new(500.0, 0.0, 0.0))
        .build()
        .expect("fixture sector is valid")
}

#[test]
fn singleton_resolver_returns_the_seed_alone() {
    let sector = sector();
    let cluster = SingletonResolver.resolve(id(3), &sector);
    assert_eq!(cluster.seed(), id(3));
    assert_eq!(cluster.members(), &[id(3)]);
    assert_eq!(cluster.blocks(&sector).count(), 2);
}

#[test]
fn scan_visits_only_cube_grids_in_store_order() {
    let sector = sector();
    let seeds: Vec<_> = ClusterScan::new(&sector, &SingletonResolver)
        .map(|cluster| cluster.seed())
        .collect();
    assert_eq!(seeds, vec![id(1), id(3), id(4), id(5)]);
}

#[test]
fn joint_graph_closes_over_links_breadth_first() {
    let sector = sector();
    let mut links = JointLinks::new();
    links.link(id(5), id(3));
    links.link(id(3), id(4));
    links.link(id(4), id(99));
    let resolver = JointGraphResolver::new(links);

    let cluster = resolver.resolve(id(5), &sector);
    assert_eq!(
        cluster.members(),
        &[id(5), id(3), id(4)],
        "unknown neighbours are skipped and each entity is visited once"
    );

    let from_middle = resolver.resolve(id(3), &sector);
    let mut sorted = from_middle.members().to_vec();
    sorted.sort();
    assert_eq!(sorted, vec![id(3), id(4), id(5)], "membership does not depend on the seed");
}

#[test]
fn scan_skips_entities_already_covered() {
    let sector = sector();
    let mut links = JointLinks::new();
    links.link(id(3), id(4));
    let resolver = JointGraphResolver::new(links);

    let clusters: Vec<Cluster> = ClusterScan::new(&sector, &resolver).collect();
    assert_eq!(clusters.len(), 3);
    assert!(clusters[1].contains(id(3)) && clusters[1].contains(id(4)));
    assert_eq!(clusters[2].seed(), id(5));
}

#[test]
fn joint_guard_protects_rotor_grids_unless_overridden() {
    let sector = sector();
    let plain = Cluster::singleton(id(1));
    let stator = Cluster::singleton(id(3));
    let rotor = Cluster::singleton(id(4));

    assert!(!has_joint(&plain, &sector));
    assert!(has_joint(&stator, &sector));
    assert!(has_joint(&rotor, &sector));

    let guard = JointGuard::new(false);
    assert!(guard.vetoes(&rotor, &sector), "rotor grids are never removed");
    assert!(!guard.vetoes(&plain, &sector));

    let overridden = JointGuard::new(true);
    assert!(!overridden.vetoes(&rotor, &sector));
}
