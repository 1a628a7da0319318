//! The maintenance run: back up, load, decide, apply and write back.
//!
//! Decisions are taken by the pure systems in a fixed order. The world pass
//! (removal and mutation of grids) completes before the ownership ledger is
//! frozen, the ledger is frozen before players are marked, and player removal
//! completes before factions are marked. A dry run takes exactly the same
//! decisions and logs the same commands, but never applies or writes them.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use se_maintenance_core::{Command, EntityId, Event, PlayerId, RemovalReason};
use se_maintenance_system_capability::{CapabilityEvaluator, Verdict};
use se_maintenance_system_clustering::{ClusterScan, JointGuard, SingletonResolver};
use se_maintenance_system_mutation::Mutations;
use se_maintenance_system_ownership::{FrozenLedger, OwnershipLedger};
use se_maintenance_system_proximity::{RestoreDecision, RestorePlanner};
use se_maintenance_system_pruning::{FactionPruner, PlayerPruner};
use se_maintenance_world::{self as world, query, Document, EntityKind, Sector, World};
use tracing::{debug, info, warn};

use crate::{
    backup::{create_backups, BackupMode},
    config::MaintenanceConfig,
    voxel::VoxelArchive,
};

/// File name of the social store inside a save folder.
pub const SOCIAL_STORE_FILE: &str = "Sandbox.sbc";
/// File name of the world store inside a save folder.
pub const WORLD_STORE_FILE: &str = "SANDBOX_0_0_0_.sbs";

/// Save folder holding both store files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveFolder {
    root: PathBuf,
}

impl SaveFolder {
    /// Wraps the provided folder.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Folder path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the world store file.
    #[must_use]
    pub fn world_store(&self) -> PathBuf {
        self.root.join(WORLD_STORE_FILE)
    }

    /// Path of the social store file.
    #[must_use]
    pub fn social_store(&self) -> PathBuf {
        self.root.join(SOCIAL_STORE_FILE)
    }
}

/// Summary of a maintenance run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunReport {
    /// Whether the run left the save untouched.
    pub dry_run: bool,
    /// Backup files written before loading.
    pub backups: Vec<PathBuf>,
    /// Every command decided, in execution order.
    pub commands: Vec<Command>,
    /// Every effective change; empty for dry runs.
    pub events: Vec<Event>,
    /// Entities selected for removal.
    pub entities_removed: usize,
    /// Grids kept only because they carry a joint.
    pub joint_protected: usize,
    /// Velocity, block toggle and queue edits.
    pub mutations: usize,
    /// Players selected for removal.
    pub players_removed: usize,
    /// Factions selected for removal.
    pub factions_removed: usize,
    /// Terrain volumes copied into the archive.
    pub volumes_snapshotted: usize,
    /// Restore decision for every terrain volume checked.
    pub restore_decisions: Vec<RestoreDecision>,
    /// Terrain volumes restored from the archive.
    pub volumes_restored: usize,
}

impl RunReport {
    fn record(&mut self, command: &Command) {
        match command {
            Command::RemoveEntity { .. } => self.entities_removed += 1,
            Command::ZeroVelocity { .. }
            | Command::SetBlockEnabled { .. }
            | Command::ClearProductionQueue { .. } => self.mutations += 1,
            Command::RemovePlayerFromRoster { .. } => self.players_removed += 1,
            Command::RemoveFaction { .. } => self.factions_removed += 1,
            _ => {}
        }
    }
}

/// Commands and ledger produced by the world pass.
struct WorldPass {
    commands: Vec<Command>,
    ledger: OwnershipLedger,
    removed: BTreeSet<EntityId>,
}

/// Orchestrates a single maintenance run over a save folder.
#[derive(Clone, Debug)]
pub struct Maintenance {
    config: MaintenanceConfig,
    dry_run: bool,
}

impl Maintenance {
    /// Creates a run with the provided settings.
    #[must_use]
    pub fn new(config: MaintenanceConfig, dry_run: bool) -> Self {
        Self { config, dry_run }
    }

    /// Runs maintenance over the save folder.
    pub fn run(&self, save: &SaveFolder, archive: &dyn VoxelArchive) -> Result<RunReport> {
        let mut report = RunReport {
            dry_run: self.dry_run,
            ..RunReport::default()
        };
        let world_path = save.world_store();
        let social_path = save.social_store();

        if self.dry_run || self.config.backup.skip {
            info!(dry_run = self.dry_run, "skipping backups");
        } else {
            let mode = if self.config.backup.timestamped {
                BackupMode::Timestamped
            } else {
                BackupMode::Overwrite
            };
            report.backups = create_backups(&[&social_path, &world_path], mode)?;
        }

        let mut world = load_world(&world_path, &social_path)?;
        info!(
            entities = query::entities(&world).len(),
            players = query::players(&world).len(),
            factions = query::factions(&world).len(),
            "save loaded"
        );

        if self.config.terrain.snapshot {
            self.snapshot_terrain(query::sector(&world), archive, &mut report)?;
        }

        let pass = self.world_pass(query::sector(&world), &mut report);
        self.execute(&mut world, pass.commands, &mut report);
        let ledger = pass.ledger.freeze();
        debug!(owners = ledger.len(), "ownership ledger frozen");

        let removed_players = if self.config.pruning.players {
            self.prune_players(&mut world, &ledger, &mut report)
        } else {
            BTreeSet::new()
        };
        if self.config.pruning.factions {
            self.prune_factions(&mut world, &removed_players, &mut report);
        }

        if self.config.terrain.restore {
            self.restore_terrain(&world, &pass.removed, archive, &mut report)?;
        }

        if self.dry_run {
            info!(commands = report.commands.len(), "dry run, save left untouched");
        } else {
            let (sector, checkpoint) = world.into_documents();
            sector
                .write(&world_path)
                .with_context(|| format!("failed to write {}", world_path.display()))?;
            checkpoint
                .write(&social_path)
                .with_context(|| format!("failed to write {}", social_path.display()))?;
            info!(events = report.events.len(), "save written");
        }

        Ok(report)
    }

    fn world_pass(&self, sector: &Sector, report: &mut RunReport) -> WorldPass {
        let removal = &self.config.removal;
        let evaluator = CapabilityEvaluator::new(removal.policies(), removal.remove_npc_ships);
        let guard = JointGuard::new(removal.override_joints);
        let mutations = Mutations::new(self.config.mutation);
        let mut pass = WorldPass {
            commands: Vec::new(),
            ledger: OwnershipLedger::new(),
            removed: BTreeSet::new(),
        };

        if removal.cleanup_items {
            for entity in sector.entities() {
                if entity.kind() == EntityKind::FloatingObject {
                    pass.commands.push(Command::RemoveEntity {
                        entity: entity.id(),
                        reason: RemovalReason::FloatingObject,
                    });
                    let _ = pass.removed.insert(entity.id());
                }
            }
        }

        for cluster in ClusterScan::new(sector, &SingletonResolver) {
            let verdict = if !evaluator.is_active() {
                Verdict::Keep
            } else if guard.vetoes(&cluster, sector) {
                debug!(seed = %cluster.seed(), "joint guard kept cluster");
                report.joint_protected += 1;
                Verdict::Keep
            } else {
                evaluator.evaluate(&cluster, sector)
            };

            match verdict {
                Verdict::Remove(reason) => {
                    for &entity in cluster.members() {
                        pass.commands.push(Command::RemoveEntity { entity, reason });
                        let _ = pass.removed.insert(entity);
                    }
                }
                Verdict::Keep => {
                    pass.ledger
                        .absorb(OwnershipLedger::record_owners(&cluster, sector));
                    mutations.handle(&cluster, sector, &mut pass.commands);
                }
            }
        }

        pass
    }

    fn prune_players(
        &self,
        world: &mut World,
        ledger: &FrozenLedger,
        report: &mut RunReport,
    ) -> BTreeSet<PlayerId> {
        let checkpoint = query::checkpoint(world);
        let marked = PlayerPruner.mark(checkpoint, ledger);
        let mut commands = Vec::new();
        PlayerPruner.sweep(checkpoint, &marked, &mut commands);
        for (player, reason) in &marked {
            let name = query::players(world)
                .iter()
                .find(|record| record.id() == *player)
                .map_or("", |record| record.name());
            info!(player = %player, name, %reason, "player selected for removal");
        }
        self.execute(world, commands, report);
        marked.into_keys().collect()
    }

    fn prune_factions(
        &self,
        world: &mut World,
        removed_players: &BTreeSet<PlayerId>,
        report: &mut RunReport,
    ) {
        let checkpoint = query::checkpoint(world);
        let marked = FactionPruner.mark(checkpoint, removed_players);
        let mut commands = Vec::new();
        FactionPruner.sweep(checkpoint, &marked, &mut commands);
        self.execute(world, commands, report);
    }

    fn snapshot_terrain(
        &self,
        sector: &Sector,
        archive: &dyn VoxelArchive,
        report: &mut RunReport,
    ) -> Result<()> {
        for entity in sector.entities() {
            let Some(storage_name) = entity.storage_name() else {
                continue;
            };
            if entity.kind() != EntityKind::VoxelMap {
                continue;
            }
            if self.dry_run {
                info!(storage_name, "would snapshot terrain volume");
                continue;
            }
            archive
                .save(storage_name)
                .with_context(|| format!("failed to snapshot terrain volume {storage_name}"))?;
            report.volumes_snapshotted += 1;
        }
        Ok(())
    }

    fn restore_terrain(
        &self,
        world: &World,
        removed: &BTreeSet<EntityId>,
        archive: &dyn VoxelArchive,
        report: &mut RunReport,
    ) -> Result<()> {
        let planner = RestorePlanner::new(self.config.terrain.volumes.clone());
        let decisions = planner.plan(query::sector(world), removed);
        for decision in &decisions {
            if !decision.allowed {
                info!(entity = %decision.entity, storage_name = %decision.storage_name, "terrain restore refused, entities nearby");
                continue;
            }
            if self.dry_run {
                info!(entity = %decision.entity, storage_name = %decision.storage_name, "would restore terrain volume");
                continue;
            }
            if archive.restore(&decision.storage_name)? {
                info!(entity = %decision.entity, storage_name = %decision.storage_name, "terrain volume restored");
                report.volumes_restored += 1;
            } else {
                warn!(storage_name = %decision.storage_name, "no snapshot to restore from");
            }
        }
        report.restore_decisions = decisions;
        Ok(())
    }

    fn execute(&self, world: &mut World, commands: Vec<Command>, report: &mut RunReport) {
        for command in commands {
            info!(dry_run = self.dry_run, %command, "maintenance");
            report.record(&command);
            if !self.dry_run {
                world::apply(world, command.clone(), &mut report.events);
            }
            report.commands.push(command);
        }
    }
}

fn load_world(world_path: &Path, social_path: &Path) -> Result<World> {
    let sector = Document::load(world_path)
        .with_context(|| format!("failed to load world store {}", world_path.display()))?;
    let checkpoint = Document::load(social_path)
        .with_context(|| format!("failed to load social store {}", social_path.display()))?;
    World::from_documents(sector, checkpoint).context("save stores are not usable")
}
