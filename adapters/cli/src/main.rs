#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line entry point for Space Engineers save maintenance.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use se_maintenance_cli::{FsVoxelArchive, Maintenance, MaintenanceConfig, SaveFolder};
use se_maintenance_core::{BlockKind, FactoryMode};
use se_maintenance_system_capability::CleanupPreset;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Prunes and tidies a Space Engineers save.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Save folder containing Sandbox.sbc and SANDBOX_0_0_0_.sbs
    save_path: PathBuf,

    /// TOML file with maintenance settings; flags are applied on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not back up the store files
    #[arg(long, short = 'B')]
    skip_backup: bool,

    /// Keep every backup under a timestamped name
    #[arg(long, short = 'b')]
    big_backup: bool,

    /// Decide and log everything, change nothing
    #[arg(long, short = 'w')]
    whatif: bool,

    /// Remove grids using a preset: junk (no reactor), dead (no power), beacon (no power and no beacon)
    #[arg(long, short = 'c', value_name = "PRESET")]
    cleanup_objects: Option<CleanupPreset>,

    /// Remove grids without a power source
    #[arg(long)]
    require_power: bool,

    /// Count enabled solar panels as power
    #[arg(long)]
    allow_solar: bool,

    /// Keep grids carrying a block of this kind
    #[arg(long = "want-block", value_name = "KIND")]
    want_blocks: Vec<BlockKind>,

    /// Keep grids carrying a block with this subtype name
    #[arg(long = "want-subtype", value_name = "NAME")]
    want_subtypes: Vec<String>,

    /// Allow removing grids that carry rotors or pistons
    #[arg(long)]
    override_joints: bool,

    /// Remove drifting cargo ships spawned by the game
    #[arg(long)]
    remove_npc_ships: bool,

    /// Remove free-floating items
    #[arg(long, short = 'C')]
    cleanup_items: bool,

    /// Remove players that own nothing and are dead or factionless
    #[arg(long, short = 'p')]
    prune_players: bool,

    /// Remove factions without members
    #[arg(long, short = 'f')]
    prune_factions: bool,

    /// Stop every moving or spinning grid
    #[arg(long)]
    stop_movement: bool,

    /// Switch off refineries and assemblers: soft (idle ones only) or hard (all)
    #[arg(long, value_name = "MODE")]
    disable_factories: Option<FactoryMode>,

    /// Drop pending refinery queues
    #[arg(long)]
    strip_refinery_queues: bool,

    /// Switch off every spotlight
    #[arg(long)]
    disable_spotlights: bool,

    /// Copy every asteroid file into VoxelBackups before maintenance
    #[arg(long)]
    snapshot_asteroids: bool,

    /// Restore asteroids nobody is near from VoxelBackups
    #[arg(long)]
    restore_asteroids: bool,
}

impl Args {
    fn apply_to(self, config: &mut MaintenanceConfig) {
        config.backup.skip |= self.skip_backup;
        config.backup.timestamped |= self.big_backup;

        let removal = &mut config.removal;
        if self.cleanup_objects.is_some() {
            removal.preset = self.cleanup_objects;
        }
        removal.require_power |= self.require_power;
        removal.allow_solar |= self.allow_solar;
        removal.want_blocks.extend(self.want_blocks);
        removal.want_subtypes.extend(self.want_subtypes);
        removal.override_joints |= self.override_joints;
        removal.remove_npc_ships |= self.remove_npc_ships;
        removal.cleanup_items |= self.cleanup_items;

        config.pruning.players |= self.prune_players;
        config.pruning.factions |= self.prune_factions;

        let mutation = &mut config.mutation;
        mutation.zero_inertia |= self.stop_movement;
        if self.disable_factories.is_some() {
            mutation.factories = self.disable_factories;
        }
        mutation.strip_refinery_queues |= self.strip_refinery_queues;
        mutation.disable_spotlights |= self.disable_spotlights;

        config.terrain.snapshot |= self.snapshot_asteroids;
        config.terrain.restore |= self.restore_asteroids;
    }
}

/// Entry point for the save maintenance command-line interface.
fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => MaintenanceConfig::from_path(path)?,
        None => MaintenanceConfig::default(),
    };
    let save = SaveFolder::new(args.save_path.clone());
    let dry_run = args.whatif;
    args.apply_to(&mut config);

    if !config.has_action() {
        bail!("no maintenance action selected; run with --help to list them");
    }

    let archive = FsVoxelArchive::new(save.root());
    let report = Maintenance::new(config, dry_run).run(&save, &archive)?;

    info!(
        dry_run = report.dry_run,
        backups = report.backups.len(),
        entities_removed = report.entities_removed,
        joint_protected = report.joint_protected,
        mutations = report.mutations,
        players_removed = report.players_removed,
        factions_removed = report.factions_removed,
        volumes_snapshotted = report.volumes_snapshotted,
        volumes_restored = report.volumes_restored,
        "maintenance finished"
    );
    Ok(())
}
