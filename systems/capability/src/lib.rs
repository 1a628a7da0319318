#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Decides whether a cluster is worth keeping based on the blocks it carries.
//!
//! Three independent checks feed the decision: a power check (does the
//! cluster have the potential to generate power), a capability match (does
//! it contain a block of a wanted kind or subtype) and an NPC heuristic
//! (does it look like a drifting trader the game spawned and forgot). The
//! [`CapabilityEvaluator`] combines them into a [`Verdict`].

use std::{collections::BTreeSet, str::FromStr};

use se_maintenance_core::{BlockKind, ParseKindError, RemovalReason};
use se_maintenance_system_clustering::Cluster;
use se_maintenance_world::{Block, Sector};
use serde::Deserialize;
use tracing::debug;

/// Beacon names the game assigns to its own cargo and escort ships.
pub const NPC_BEACON_NAMES: [&str; 9] = [
    "Private Sail",
    "Business Shipment",
    "Commercial Freighter",
    "Mining Carriage",
    "Mining Transport",
    "Mining Hauler",
    "Military Escort",
    "Military Minelayer",
    "Military Transporter",
];

/// Block kinds and subtype names that make a cluster worth keeping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WantedCapabilities {
    kinds: BTreeSet<BlockKind>,
    subtypes: BTreeSet<String>,
}

impl WantedCapabilities {
    /// Creates a filter from wanted kinds and subtype names.
    #[must_use]
    pub fn new(
        kinds: impl IntoIterator<Item = BlockKind>,
        subtypes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            subtypes: subtypes.into_iter().collect(),
        }
    }

    /// Reports whether no kind and no subtype was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty() && self.subtypes.is_empty()
    }

    /// Reports whether the block satisfies the filter.
    #[must_use]
    pub fn matches(&self, block: &Block) -> bool {
        self.kinds.contains(&block.kind())
            || block
                .subtype()
                .is_some_and(|subtype| self.subtypes.contains(subtype))
    }
}

/// One set of keep conditions evaluated against a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemovalPolicy {
    /// Remove clusters without a potential power source.
    pub require_power: bool,
    /// Count enabled solar panels as a power source.
    pub allow_solar: bool,
    /// Capabilities that protect a cluster; empty means no filter.
    pub wanted: WantedCapabilities,
}

impl RemovalPolicy {
    /// Reports whether the policy asks for anything at all.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.require_power || !self.wanted.is_empty()
    }
}

/// Reports whether the cluster could produce power.
///
/// Fuelled reactors and charged batteries count even when switched off.
/// Solar panels count only when enabled and only if `allow_solar` is set.
#[must_use]
pub fn has_power(cluster: &Cluster, sector: &Sector, allow_solar: bool) -> bool {
    cluster.blocks(sector).any(|block| match block.kind() {
        BlockKind::Reactor => block.inventory_items() > 0,
        BlockKind::Battery => block.stored_power() > 0.0,
        BlockKind::SolarPanel => allow_solar && block.is_enabled(),
        _ => false,
    })
}

/// Reports whether any block of the cluster matches the wanted capabilities.
#[must_use]
pub fn has_wanted(cluster: &Cluster, sector: &Sector, wanted: &WantedCapabilities) -> bool {
    cluster.blocks(sector).any(|block| wanted.matches(block))
}

/// Applies a single policy: keep when the power condition holds and the
/// capability condition holds, remove otherwise.
#[must_use]
pub fn should_remove(cluster: &Cluster, sector: &Sector, policy: &RemovalPolicy) -> bool {
    let power_ok = !policy.require_power || has_power(cluster, sector, policy.allow_solar);
    let wanted_ok = policy.wanted.is_empty() || has_wanted(cluster, sector, &policy.wanted);
    !(power_ok && wanted_ok)
}

/// Reports whether the cluster looks like an abandoned ship spawned by the game.
#[must_use]
pub fn is_likely_unmanned(cluster: &Cluster, sector: &Sector) -> bool {
    let mut entities = cluster.entities(sector).peekable();
    if entities.peek().is_none() {
        return false;
    }
    let drifting = entities.all(|entity| {
        entity
            .grid()
            .is_some_and(|grid| !grid.is_static() && grid.dampeners_enabled() == Some(false))
    });
    drifting
        && cluster.blocks(sector).any(|block| {
            block.kind() == BlockKind::Beacon
                && block
                    .custom_name()
                    .is_some_and(|name| NPC_BEACON_NAMES.contains(&name))
        })
}

/// Outcome of evaluating a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The cluster stays.
    Keep,
    /// The cluster should be removed for the provided reason.
    Remove(RemovalReason),
}

/// Named policy combinations offered on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPreset {
    /// Removes grids without any reactor.
    Junk,
    /// Removes grids without a power source.
    Dead,
    /// Removes grids that have neither a power source nor a beacon.
    Beacon,
}

impl CleanupPreset {
    /// Expands the preset into the policies that must all vote for removal.
    #[must_use]
    pub fn policies(self, allow_solar: bool) -> Vec<RemovalPolicy> {
        let power = RemovalPolicy {
            require_power: true,
            allow_solar,
            wanted: WantedCapabilities::default(),
        };
        let wanted = |kind: BlockKind| RemovalPolicy {
            require_power: false,
            allow_solar,
            wanted: WantedCapabilities::new([kind], std::iter::empty()),
        };
        match self {
            Self::Junk => vec![wanted(BlockKind::Reactor)],
            Self::Dead => vec![power],
            Self::Beacon => vec![power, wanted(BlockKind::Beacon)],
        }
    }
}

impl FromStr for CleanupPreset {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "junk" => Ok(Self::Junk),
            "dead" => Ok(Self::Dead),
            "beacon" => Ok(Self::Beacon),
            _ => Err(ParseKindError::new("cleanup preset", value)),
        }
    }
}

/// Combines the NPC heuristic and the removal policies into a verdict.
#[derive(Clone, Debug, Default)]
pub struct CapabilityEvaluator {
    policies: Vec<RemovalPolicy>,
    remove_npc_ships: bool,
}

impl CapabilityEvaluator {
    /// Creates an evaluator; a cluster is removed only when every policy votes remove.
    #[must_use]
    pub fn new(policies: Vec<RemovalPolicy>, remove_npc_ships: bool) -> Self {
        Self {
            policies,
            remove_npc_ships,
        }
    }

    /// Reports whether the evaluator can ever remove a cluster.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.remove_npc_ships || !self.policies.is_empty()
    }

    /// Evaluates a cluster.
    #[must_use]
    pub fn evaluate(&self, cluster: &Cluster, sector: &Sector) -> Verdict {
        if self.remove_npc_ships && is_likely_unmanned(cluster, sector) {
            debug!(seed = %cluster.seed(), "cluster matches npc heuristic");
            return Verdict::Remove(RemovalReason::NpcDerelict);
        }

        let Some(first) = self.policies.first() else {
            return Verdict::Keep;
        };
        if !self
            .policies
            .iter()
            .all(|policy| should_remove(cluster, sector, policy))
        {
            return Verdict::Keep;
        }

        let reason = if first.require_power && !has_power(cluster, sector, first.allow_solar) {
            RemovalReason::Unpowered
        } else {
            RemovalReason::MissingCapability
        };
        debug!(seed = %cluster.seed(), %reason, "every removal policy voted remove");
        Verdict::Remove(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse_from_names() {
        assert_eq!("junk".parse::<CleanupPreset>().ok(), Some(CleanupPreset::Junk));
        assert_eq!(" Dead ".parse::<CleanupPreset>().ok(), Some(CleanupPreset::Dead));
        assert!("all".parse::<CleanupPreset>().is_err());
    }

    #[test]
    fn presets_deserialize_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            preset: CleanupPreset,
        }
        let wrapper: Wrapper = toml::from_str("preset = \"beacon\"").expect("valid preset");
        assert_eq!(wrapper.preset, CleanupPreset::Beacon);
    }

    #[test]
    fn beacon_preset_requires_power_then_beacon() {
        let policies = CleanupPreset::Beacon.policies(true);
        assert_eq!(policies.len(), 2);
        assert!(policies[0].require_power && policies[0].allow_solar);
        assert!(!policies[1].require_power);
        assert!(!policies[1].wanted.is_empty());
    }

    #[test]
    fn empty_policy_is_inactive() {
        assert!(!RemovalPolicy::default().is_active());
        assert!(!CapabilityEvaluator::default().is_active());
    }
}
