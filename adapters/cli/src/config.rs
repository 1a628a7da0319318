//! Maintenance settings read from an optional TOML file.
//!
//! Every table and field is optional. Command-line flags are layered on top
//! of the file by the binary: boolean flags switch features on, valued flags
//! replace the file's value.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use se_maintenance_core::BlockKind;
use se_maintenance_system_capability::{CleanupPreset, RemovalPolicy, WantedCapabilities};
use se_maintenance_system_mutation::MutationOptions;
use se_maintenance_system_proximity::VolumeClassifier;
use serde::Deserialize;

/// Complete set of maintenance settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Backup behaviour.
    pub backup: BackupConfig,
    /// Grid and item removal.
    pub removal: RemovalConfig,
    /// In-place edits of surviving grids.
    pub mutation: MutationOptions,
    /// Player and faction pruning.
    pub pruning: PruningConfig,
    /// Terrain snapshot and restore.
    pub terrain: TerrainConfig,
}

/// Backup behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    /// Skip copying the store files before maintenance.
    pub skip: bool,
    /// Keep every backup under a timestamped name instead of overwriting one.
    pub timestamped: bool,
}

/// Grid and item removal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemovalConfig {
    /// Named policy combination.
    pub preset: Option<CleanupPreset>,
    /// Remove grids without a power source.
    pub require_power: bool,
    /// Count enabled solar panels as power.
    pub allow_solar: bool,
    /// Block kinds protecting a grid from removal.
    pub want_blocks: Vec<BlockKind>,
    /// Block subtype names protecting a grid from removal.
    pub want_subtypes: Vec<String>,
    /// Allow removal of grids carrying rotors or pistons.
    pub override_joints: bool,
    /// Remove drifting ships spawned by the game.
    pub remove_npc_ships: bool,
    /// Remove free-floating items.
    pub cleanup_items: bool,
}

impl RemovalConfig {
    /// Policies that must all vote for removal: the preset's, then the custom one.
    #[must_use]
    pub fn policies(&self) -> Vec<RemovalPolicy> {
        let mut policies = self
            .preset
            .map(|preset| preset.policies(self.allow_solar))
            .unwrap_or_default();
        let custom = RemovalPolicy {
            require_power: self.require_power,
            allow_solar: self.allow_solar,
            wanted: WantedCapabilities::new(
                self.want_blocks.iter().copied(),
                self.want_subtypes.iter().cloned(),
            ),
        };
        if custom.is_active() {
            policies.push(custom);
        }
        policies
    }
}

/// Player and faction pruning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PruningConfig {
    /// Remove players that own nothing and are dead or factionless.
    pub players: bool,
    /// Remove factions without members.
    pub factions: bool,
}

/// Terrain snapshot and restore.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainConfig {
    /// Copy every terrain volume into the archive before maintenance.
    pub snapshot: bool,
    /// Restore terrain volumes nobody is near from the archive.
    pub restore: bool,
    /// Volume classification and safe radii.
    pub volumes: VolumeClassifier,
}

impl MaintenanceConfig {
    /// Reads the configuration file at the provided path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid maintenance config")
    }

    /// Reports whether any maintenance action is selected.
    #[must_use]
    pub fn has_action(&self) -> bool {
        let removal = &self.removal;
        removal.preset.is_some()
            || removal.require_power
            || !removal.want_blocks.is_empty()
            || !removal.want_subtypes.is_empty()
            || removal.remove_npc_ships
            || removal.cleanup_items
            || self.mutation.is_active()
            || self.pruning.players
            || self.pruning.factions
            || self.terrain.snapshot
            || self.terrain.restore
    }
}
