#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cascading removal of abandoned players and empty factions.
//!
//! Both workflows run in two phases. `mark` reads the social store and decides
//! the removal set; `sweep` turns that set into commands covering every table
//! that references a removed identifier. Neither phase mutates the store, so
//! the decision never observes a partially swept collection.
//!
//! Players are pruned before factions: a faction only counts as empty once
//! every membership change caused by player removal is known.

use std::collections::{BTreeMap, BTreeSet};

use se_maintenance_core::{Command, FactionId, PlayerId, RemovalReason};
use se_maintenance_system_ownership::FrozenLedger;
use se_maintenance_world::Checkpoint;
use tracing::debug;

/// Players selected for removal together with the reason.
pub type MarkedPlayers = BTreeMap<PlayerId, RemovalReason>;

/// Removes players that own nothing and are dead or outside every faction.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlayerPruner;

impl PlayerPruner {
    /// Decides which roster players are abandoned.
    #[must_use]
    pub fn mark(&self, checkpoint: &Checkpoint, ledger: &FrozenLedger) -> MarkedPlayers {
        let mut marked = MarkedPlayers::new();
        for player in checkpoint.players() {
            if ledger.owns(player.id()) {
                continue;
            }
            let dead = player.is_dead();
            let factionless = !checkpoint
                .factions()
                .iter()
                .any(|faction| faction.has_member(player.id()));
            if dead || factionless {
                debug!(player = %player.id(), name = player.name(), dead, factionless, "player marked");
                let _ = marked.insert(player.id(), RemovalReason::PlayerAbandoned { dead, factionless });
            }
        }
        marked
    }

    /// Emits the removal of every marked player from every table referencing it.
    pub fn sweep(&self, checkpoint: &Checkpoint, marked: &MarkedPlayers, out: &mut Vec<Command>) {
        for (&player, &reason) in marked {
            if checkpoint.players().iter().any(|record| record.id() == player) {
                out.push(Command::RemovePlayerFromRoster { player, reason });
            }
            if checkpoint
                .directory()
                .iter()
                .any(|entry| entry.player() == Some(player))
            {
                out.push(Command::RemovePlayerFromDirectory { player });
            }
            for faction in checkpoint.factions() {
                if faction.has_member(player) {
                    out.push(Command::RemoveFactionMember {
                        faction: faction.id(),
                        player,
                    });
                }
                if faction
                    .join_requests()
                    .iter()
                    .any(|request| request.player() == player)
                {
                    out.push(Command::RemoveJoinRequest {
                        faction: faction.id(),
                        player,
                    });
                }
            }
            if checkpoint
                .faction_players()
                .iter()
                .any(|entry| entry.player() == player)
            {
                out.push(Command::RemoveFactionPlayerEntry { player });
            }
        }
    }
}

/// Removes factions left without members and everything pointing at them.
#[derive(Clone, Copy, Debug, Default)]
pub struct FactionPruner;

impl FactionPruner {
    /// Decides which factions are empty once `removed_players` are gone.
    ///
    /// Passing the players removed by [`PlayerPruner`] gives the same answer
    /// whether or not their removal has been applied to the store yet.
    #[must_use]
    pub fn mark(
        &self,
        checkpoint: &Checkpoint,
        removed_players: &BTreeSet<PlayerId>,
    ) -> BTreeSet<FactionId> {
        checkpoint
            .factions()
            .iter()
            .filter(|faction| {
                faction
                    .members()
                    .iter()
                    .all(|member| removed_players.contains(&member.player()))
            })
            .inspect(|faction| debug!(faction = %faction.id(), tag = faction.tag(), "faction marked"))
            .map(|faction| faction.id())
            .collect()
    }

    /// Emits removal of the marked factions, their relations and their requests.
    pub fn sweep(
        &self,
        checkpoint: &Checkpoint,
        marked: &BTreeSet<FactionId>,
        out: &mut Vec<Command>,
    ) {
        for faction in checkpoint.factions() {
            if marked.contains(&faction.id()) {
                out.push(Command::RemoveFaction {
                    faction: faction.id(),
                    reason: RemovalReason::FactionEmpty,
                });
            }
        }

        let mut pairs = BTreeSet::new();
        for relation in checkpoint.relations() {
            let (first, second) = (relation.first(), relation.second());
            if !marked.contains(&first) && !marked.contains(&second) {
                continue;
            }
            if pairs.insert((first.min(second), first.max(second))) {
                out.push(Command::RemoveRelation { first, second });
            }
        }

        let mut owners = BTreeSet::new();
        let mut targets = BTreeSet::new();
        for entry in checkpoint.requests() {
            let owner = entry.owner();
            if marked.contains(&owner) {
                if owners.insert(owner) {
                    out.push(Command::RemoveRequestEntry { owner });
                }
                continue;
            }
            for target in entry.targets().filter(|target| marked.contains(target)) {
                if targets.insert((owner, target)) {
                    out.push(Command::RemoveRequestTarget { owner, target });
                }
            }
        }
    }
}
