#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Records which players still own blocks in clusters that survive the world pass.

use std::collections::BTreeSet;

use se_maintenance_core::PlayerId;
use se_maintenance_system_clustering::Cluster;
use se_maintenance_world::{Block, Sector};

/// Running set of owners, filled while surviving clusters are visited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnershipLedger {
    owners: BTreeSet<PlayerId>,
}

impl OwnershipLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every player owning at least one block of the cluster.
    #[must_use]
    pub fn record_owners(cluster: &Cluster, sector: &Sector) -> BTreeSet<PlayerId> {
        cluster.blocks(sector).filter_map(Block::owner).collect()
    }

    /// Adds the owners of a surviving cluster.
    pub fn absorb(&mut self, owners: BTreeSet<PlayerId>) {
        self.owners.extend(owners);
    }

    /// Number of distinct owners recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Reports whether no owner has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Ends the world pass; the frozen ledger can only be read.
    #[must_use]
    pub fn freeze(self) -> FrozenLedger {
        FrozenLedger {
            owners: self.owners,
        }
    }
}

/// Complete, read-only ownership ledger consulted by player pruning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrozenLedger {
    owners: BTreeSet<PlayerId>,
}

impl FrozenLedger {
    /// Reports whether the player owns anything in a surviving cluster.
    #[must_use]
    pub fn owns(&self, player: PlayerId) -> bool {
        self.owners.contains(&player)
    }

    /// Number of distinct owners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Reports whether nobody owns anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbing_merges_owner_sets() {
        let mut ledger = OwnershipLedger::new();
        ledger.absorb(BTreeSet::from([PlayerId::new(1), PlayerId::new(2)]));
        ledger.absorb(BTreeSet::from([PlayerId::new(2), PlayerId::new(3)]));
        assert_eq!(ledger.len(), 3);

        let frozen = ledger.freeze();
        assert!(frozen.owns(PlayerId::new(3)));
        assert!(!frozen.owns(PlayerId::new(4)));
    }
}
