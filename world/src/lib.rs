#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative save state for the maintenance engine.
//!
//! The [`World`] owns both persisted stores: the [`Sector`] (spatial
//! entities) and the [`Checkpoint`] (players, factions and the tables that
//! cross-reference them). Systems read it through [`query`] and respond with
//! commands; [`apply`] is the only code path that mutates it.

mod checkpoint;
#[cfg(feature = "fixtures")]
pub mod fixtures;
mod sector;
pub mod xml;

use std::path::PathBuf;

use se_maintenance_core::{Command, Event};
use thiserror::Error;

pub use checkpoint::{
    Checkpoint, DirectoryEntry, Faction, FactionMember, FactionPlayerEntry, FactionRelation,
    FactionRequestEntry, PlayerRecord, UNREADABLE_NAME,
};
pub use sector::{Block, Entity, EntityKind, Grid, Sector};
pub use xml::{Document, Element};

/// Errors raised while loading, interpreting, or writing a store document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read or written.
    #[error("could not access {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The XML reader or writer rejected the document.
    #[error("invalid xml: {0}")]
    Xml(#[from] quick_xml::Error),
    /// The document is not a well-formed tree.
    #[error("malformed document: {0}")]
    Malformed(&'static str),
    /// A collection every save must contain is absent.
    #[error("required collection `{0}` is missing")]
    MissingCollection(&'static str),
    /// A required identifier is absent or not a number.
    #[error("{record} has invalid {field} `{value}`")]
    InvalidField {
        /// Kind of record carrying the field.
        record: &'static str,
        /// Name of the offending field.
        field: &'static str,
        /// Raw value found in the document.
        value: String,
    },
}

impl DocumentError {
    pub(crate) fn invalid_field(record: &'static str, field: &'static str, value: &str) -> Self {
        Self::InvalidField {
            record,
            field,
            value: value.to_owned(),
        }
    }
}

/// Both persisted stores of a save, loaded fully into memory.
#[derive(Clone, Debug, PartialEq)]
pub struct World {
    sector: Sector,
    checkpoint: Checkpoint,
}

impl World {
    /// Creates a world from already typed stores.
    #[must_use]
    pub fn new(sector: Sector, checkpoint: Checkpoint) -> Self {
        Self { sector, checkpoint }
    }

    /// Builds the world from the world store and social store documents.
    pub fn from_documents(sector: Document, checkpoint: Document) -> Result<Self, DocumentError> {
        Ok(Self::new(
            Sector::from_document(sector)?,
            Checkpoint::from_document(checkpoint)?,
        ))
    }

    /// Lowers both stores back into documents, world store first.
    #[must_use]
    pub fn into_documents(self) -> (Document, Document) {
        (self.sector.into_document(), self.checkpoint.into_document())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Commands that match nothing (already removed, already disabled) leave the
/// world untouched and emit no event, so replaying a command batch is a no-op.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::RemoveEntity { entity, reason } => {
            if world.sector.remove_entity(entity) {
                out_events.push(Event::EntityRemoved { entity, reason });
            }
        }
        Command::ZeroVelocity { entity } => {
            let stopped = world
                .sector
                .entity_mut(entity)
                .and_then(Entity::grid_mut)
                .map_or(false, Grid::stop);
            if stopped {
                out_events.push(Event::EntityStopped { entity });
            }
        }
        Command::SetBlockEnabled { block, enabled } => {
            let toggled = world
                .sector
                .entity_mut(block.entity)
                .and_then(Entity::grid_mut)
                .and_then(|grid| grid.block_mut(block.index))
                .map_or(false, |target| target.set_enabled(enabled));
            if toggled {
                out_events.push(Event::BlockToggled { block, enabled });
            }
        }
        Command::ClearProductionQueue { block } => {
            let cleared = world
                .sector
                .entity_mut(block.entity)
                .and_then(Entity::grid_mut)
                .and_then(|grid| grid.block_mut(block.index))
                .map_or(false, Block::clear_queue);
            if cleared {
                out_events.push(Event::ProductionQueueCleared { block });
            }
        }
        Command::RemovePlayerFromRoster { player, .. } => {
            if world.checkpoint.remove_player(player) {
                out_events.push(Event::PlayerRemoved { player });
            }
        }
        Command::RemovePlayerFromDirectory { player } => {
            if world.checkpoint.remove_directory_entry(player) {
                out_events.push(Event::PlayerDirectoryEntryRemoved { player });
            }
        }
        Command::RemoveFactionMember { faction, player } => {
            let removed = world
                .checkpoint
                .faction_mut(faction)
                .map_or(false, |target| target.remove_member(player));
            if removed {
                out_events.push(Event::FactionMemberRemoved { faction, player });
            }
        }
        Command::RemoveJoinRequest { faction, player } => {
            let removed = world
                .checkpoint
                .faction_mut(faction)
                .map_or(false, |target| target.remove_join_request(player));
            if removed {
                out_events.push(Event::JoinRequestRemoved { faction, player });
            }
        }
        Command::RemoveFactionPlayerEntry { player } => {
            if world.checkpoint.remove_faction_player_entry(player) {
                out_events.push(Event::FactionPlayerEntryRemoved { player });
            }
        }
        Command::RemoveFaction { faction, .. } => {
            if world.checkpoint.remove_faction(faction) {
                out_events.push(Event::FactionRemoved { faction });
            }
        }
        Command::RemoveRelation { first, second } => {
            if world.checkpoint.remove_relation(first, second) {
                out_events.push(Event::RelationRemoved { first, second });
            }
        }
        Command::RemoveRequestEntry { owner } => {
            if world.checkpoint.remove_request_entry(owner) {
                out_events.push(Event::RequestEntryRemoved { owner });
            }
        }
        Command::RemoveRequestTarget { owner, target } => {
            if world.checkpoint.remove_request_target(owner, target) {
                out_events.push(Event::RequestTargetRemoved { owner, target });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use se_maintenance_core::{EntityId, FactionId, PlayerId};

    use super::{
        Checkpoint, Entity, Faction, FactionPlayerEntry, FactionRelation, FactionRequestEntry,
        PlayerRecord, Sector, World,
    };

    /// Provides read-only access to the world store.
    #[must_use]
    pub fn sector(world: &World) -> &Sector {
        &world.sector
    }

    /// Provides read-only access to the social store.
    #[must_use]
    pub fn checkpoint(world: &World) -> &Checkpoint {
        &world.checkpoint
    }

    /// Entities of the world store in persisted order.
    #[must_use]
    pub fn entities(world: &World) -> &[Entity] {
        world.sector.entities()
    }

    /// Looks up a single entity.
    #[must_use]
    pub fn entity(world: &World, id: EntityId) -> Option<&Entity> {
        world.sector.entity(id)
    }

    /// Flat player roster.
    #[must_use]
    pub fn players(world: &World) -> &[PlayerRecord] {
        world.checkpoint.players()
    }

    /// Factions in persisted order.
    #[must_use]
    pub fn factions(world: &World) -> &[Faction] {
        world.checkpoint.factions()
    }

    /// Faction-to-player map entries.
    #[must_use]
    pub fn faction_players(world: &World) -> &[FactionPlayerEntry] {
        world.checkpoint.faction_players()
    }

    /// Relations between factions.
    #[must_use]
    pub fn relations(world: &World) -> &[FactionRelation] {
        world.checkpoint.relations()
    }

    /// Faction-to-faction request entries.
    #[must_use]
    pub fn requests(world: &World) -> &[FactionRequestEntry] {
        world.checkpoint.requests()
    }

    /// First faction whose member set contains the player.
    #[must_use]
    pub fn faction_of(world: &World, player: PlayerId) -> Option<FactionId> {
        world
            .checkpoint
            .factions()
            .iter()
            .find(|faction| faction.has_member(player))
            .map(Faction::id)
    }
}
