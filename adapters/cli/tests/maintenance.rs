use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
};

use se_maintenance_cli::{
    config::MaintenanceConfig, FsVoxelArchive, Maintenance, RunReport, SaveFolder,
    SOCIAL_STORE_FILE, WORLD_STORE_FILE,
};
use se_maintenance_core::{Command, EntityId, PlayerId, RemovalReason, Vector3};
use se_maintenance_world::{
    fixtures::{faction, player, BlockBuilder, CheckpointBuilder, GridBuilder, SectorBuilder},
    query, Document, World,
};

struct TempSave {
    root: PathBuf,
}

impl TempSave {
    fn new(name: &str) -> Self {
        let root = env::temp_dir().join(format!("se-maintenance-{name}-{}", process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("temporary save folder is writable");
        Self { root }
    }

    fn with_stores(name: &str, sector: SectorBuilder, checkpoint: CheckpointBuilder) -> Self {
        let save = Self::new(name);
        sector
            .document()
            .write(save.root.join(WORLD_STORE_FILE))
            .expect("world store written");
        checkpoint
            .document()
            .write(save.root.join(SOCIAL_STORE_FILE))
            .expect("social store written");
        save
    }

    fn folder(&self) -> SaveFolder {
        SaveFolder::new(&self.root)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn load(&self) -> World {
        World::from_documents(
            Document::load(self.path(WORLD_STORE_FILE)).expect("world store loads"),
            Document::load(self.path(SOCIAL_STORE_FILE)).expect("social store loads"),
        )
        .expect("stores are valid")
    }

    fn run(&self, config: MaintenanceConfig, dry_run: bool) -> RunReport {
        Maintenance::new(config, dry_run)
            .run(&self.folder(), &FsVoxelArchive::new(&self.root))
            .expect("maintenance succeeds")
    }
}

impl Drop for TempSave {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn far(offset: f64) -> Vector3 {
    Vector3::new(10_000.0 + offset, 0.0, 0.0)
}

fn sector() -> SectorBuilder {
    SectorBuilder::new()
        .grid(
            GridBuilder::new(1)
                .at(far(0.0))
                .moving(Vector3::new(3.0, 0.0, 0.0), Vector3::ZERO)
                .block(BlockBuilder::reactor(1).owner(1))
                .block(BlockBuilder::new("ReflectorLight").enabled(true).owner(1)),
        )
        .grid(
            GridBuilder::new(2)
                .at(Vector3::new(100.0, 0.0, 0.0))
                .block(BlockBuilder::reactor(0).owner(2)),
        )
        .grid(
            GridBuilder::new(3)
                .at(far(500.0))
                .block(BlockBuilder::new("MotorRotor").owner(3))
                .block(BlockBuilder::reactor(0).owner(3)),
        )
        .floating_object(4, far(50.0))
        .voxel_map(5, "asteroid_large", Vector3::ZERO)
}

fn checkpoint() -> CheckpointBuilder {
    CheckpointBuilder::new()
        .player(1, "Tess", false)
        .player(2, "Orin", true)
        .player(3, "Mara", false)
        .player(4, "Pell", false)
        .faction(10, "TES", &[1, 2], &[])
        .faction(20, "ORN", &[2], &[4])
        .relation(10, 20)
        .request(10, &[20])
}

fn config() -> MaintenanceConfig {
    let mut config = MaintenanceConfig::default();
    config.removal.require_power = true;
    config.removal.cleanup_items = true;
    config.mutation.zero_inertia = true;
    config.mutation.disable_spotlights = true;
    config.pruning.players = true;
    config.pruning.factions = true;
    config
}

#[test]
fn live_run_prunes_and_keeps_references_consistent() {
    let save = TempSave::with_stores("live", sector(), checkpoint());
    let report = save.run(config(), false);

    assert_eq!(report.entities_removed, 2, "unpowered grid and floating item");
    assert_eq!(report.joint_protected, 1);
    assert_eq!(report.mutations, 2);
    assert_eq!(report.players_removed, 2);
    assert_eq!(report.factions_removed, 1);
    assert!(report.commands.contains(&Command::RemoveEntity {
        entity: EntityId::new(2),
        reason: RemovalReason::Unpowered,
    }));
    assert_eq!(report.backups.len(), 2);
    assert!(save.path(&format!("{SOCIAL_STORE_FILE}.backup")).is_file());
    assert!(save.path(&format!("{WORLD_STORE_FILE}.backup")).is_file());

    let world = save.load();
    let entities: Vec<_> = query::entities(&world).iter().map(|e| e.id().get()).collect();
    assert_eq!(entities, vec![1, 3, 5]);
    let grid = query::entity(&world, EntityId::new(1))
        .and_then(|entity| entity.grid())
        .expect("powered grid survives");
    assert!(!grid.is_moving());
    assert!(!grid.blocks()[1].is_enabled(), "spotlight switched off");

    let players: Vec<PlayerId> = query::players(&world).iter().map(|p| p.id()).collect();
    assert_eq!(players, vec![player(1), player(3)], "owner of the rotor grid stays");

    let factions: Vec<_> = query::factions(&world).iter().map(|f| f.id()).collect();
    assert_eq!(factions, vec![faction(10)]);
    let members: Vec<_> = query::factions(&world)[0]
        .members()
        .iter()
        .map(|member| member.player())
        .collect();
    assert_eq!(members, vec![player(1)]);
    assert!(query::relations(&world).is_empty());
    assert_eq!(query::requests(&world)[0].targets().count(), 0);
    assert!(query::faction_players(&world)
        .iter()
        .all(|entry| entry.player() == player(1)));
}

#[test]
fn dry_run_decides_the_same_and_writes_nothing() {
    let dry_save = TempSave::with_stores("dry", sector(), checkpoint());
    let live_save = TempSave::with_stores("dry-live", sector(), checkpoint());

    let world_before = fs::read(dry_save.path(WORLD_STORE_FILE)).expect("readable");
    let social_before = fs::read(dry_save.path(SOCIAL_STORE_FILE)).expect("readable");

    let dry = dry_save.run(config(), true);
    let live = live_save.run(config(), false);

    assert_eq!(dry.commands, live.commands, "dry run must log the live decisions");
    assert!(dry.events.is_empty());
    assert!(!live.events.is_empty());
    assert!(dry.backups.is_empty());
    assert_eq!(fs::read(dry_save.path(WORLD_STORE_FILE)).expect("readable"), world_before);
    assert_eq!(fs::read(dry_save.path(SOCIAL_STORE_FILE)).expect("readable"), social_before);
    assert!(!dry_save.path(&format!("{WORLD_STORE_FILE}.backup")).exists());
}

#[test]
fn second_run_changes_nothing() {
    let save = TempSave::with_stores("idempotent", sector(), checkpoint());
    let mut config = config();
    config.backup.skip = true;

    let first = save.run(config.clone(), false);
    assert!(!first.commands.is_empty());
    assert!(first.backups.is_empty());
    let after_first = fs::read(save.path(SOCIAL_STORE_FILE)).expect("readable");

    let second = save.run(config, false);
    assert!(second.commands.is_empty(), "unexpected commands: {:?}", second.commands);
    assert_eq!(fs::read(save.path(SOCIAL_STORE_FILE)).expect("readable"), after_first);
}

#[test]
fn terrain_is_restored_only_when_clear() {
    let sector = sector().voxel_map(6, "asteroid_moon", far(100.0));
    let save = TempSave::with_stores("terrain", sector, CheckpointBuilder::new());
    let archive_dir = save.path("VoxelBackups");
    fs::create_dir_all(&archive_dir).expect("archive folder");
    for name in ["asteroid_large", "asteroid_moon"] {
        fs::write(save.path(&format!("{name}.vx2")), b"mined").expect("live voxel");
        fs::write(archive_dir.join(format!("{name}.vx2")), b"pristine").expect("snapshot");
    }

    let mut config = MaintenanceConfig::default();
    config.removal.require_power = true;
    config.terrain.restore = true;
    config.backup.skip = true;
    let report = save.run(config, false);

    let allowed: Vec<_> = report
        .restore_decisions
        .iter()
        .map(|decision| (decision.storage_name.as_str(), decision.allowed))
        .collect();
    assert_eq!(
        allowed,
        vec![("asteroid_large", true), ("asteroid_moon", false)],
        "the removed grid no longer blocks the large asteroid"
    );
    assert_eq!(report.volumes_restored, 1);
    assert_eq!(read(&save.path("asteroid_large.vx2")), "pristine");
    assert_eq!(read(&save.path("asteroid_moon.vx2")), "mined");
}

#[test]
fn snapshot_copies_every_volume() {
    let save = TempSave::with_stores("snapshot", sector(), CheckpointBuilder::new());
    fs::write(save.path("asteroid_large.vx2"), b"rock").expect("live voxel");

    let mut config = MaintenanceConfig::default();
    config.terrain.snapshot = true;
    config.backup.skip = true;
    let report = save.run(config, false);

    assert_eq!(report.volumes_snapshotted, 1);
    assert_eq!(read(&save.path("VoxelBackups/asteroid_large.vx2")), "rock");
}

#[test]
fn missing_faction_table_aborts_before_writing() {
    let save = TempSave::new("broken");
    sector()
        .document()
        .write(save.path(WORLD_STORE_FILE))
        .expect("world store written");
    fs::write(
        save.path(SOCIAL_STORE_FILE),
        "<MyObjectBuilder_Checkpoint><AllPlayers /></MyObjectBuilder_Checkpoint>",
    )
    .expect("social store written");
    let before = fs::read(save.path(WORLD_STORE_FILE)).expect("readable");

    let archive = FsVoxelArchive::new(&save.root);
    let error = Maintenance::new(config(), false)
        .run(&save.folder(), &archive)
        .expect_err("a save without factions is rejected");
    assert!(format!("{error:#}").contains("Factions"), "unexpected error: {error:#}");
    assert_eq!(fs::read(save.path(WORLD_STORE_FILE)).expect("readable"), before);
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("file readable")
}
