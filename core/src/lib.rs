#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the save maintenance engine.
//!
//! This crate defines the message surface that connects the adapter, the
//! authoritative stores, and the pure decision systems. Systems inspect the
//! stores through read-only queries and respond with [`Command`] values
//! describing desired mutations. The world crate executes those commands via
//! its `apply` entry points and reports every effective change as an
//! [`Event`]. A dry run produces the same commands but never applies them.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(i64);

        impl $name {
            /// Creates a new identifier with the provided numeric value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Retrieves the numeric representation of the identifier.
            #[must_use]
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse::<i64>().map(Self)
            }
        }
    };
}

identifier!(
    /// Identifier of an entity stored in the world store.
    EntityId
);

identifier!(
    /// Identifier of a player identity stored in the social store.
    PlayerId
);

identifier!(
    /// Identifier of a faction stored in the social store.
    FactionId
);

/// Three component vector used for positions and velocities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// Component along the x axis.
    pub x: f64,
    /// Component along the y axis.
    pub y: f64,
    /// Component along the z axis.
    pub z: f64,
}

impl Vector3 {
    /// Vector with every component set to zero.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new vector from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Reports whether every component is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Manhattan (L1) distance between two points.
    #[must_use]
    pub fn manhattan_distance(&self, other: &Self) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }
}

/// Closed set of block kinds the maintenance systems reason about.
///
/// Every persisted block type that is not listed maps to [`BlockKind::Generic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum BlockKind {
    /// Fuel burning reactor.
    Reactor,
    /// Rechargeable battery.
    Battery,
    /// Solar panel.
    SolarPanel,
    /// Broadcasting beacon.
    Beacon,
    /// Radio or laser antenna.
    Antenna,
    /// Ore refinery.
    Refinery,
    /// Component assembler.
    Assembler,
    /// Reflector light (spotlight).
    ReflectorLight,
    /// Rotor head attached to a stator.
    Rotor,
    /// Motor stator (rotor base).
    Stator,
    /// Piston base.
    PistonBase,
    /// Piston head attached to a piston base.
    PistonTop,
    /// Any block without maintenance-specific semantics.
    Generic,
}

const TYPE_ID_PREFIX: &str = "MyObjectBuilder_";

impl BlockKind {
    /// Classifies a persisted `xsi:type` identifier.
    #[must_use]
    pub fn from_type_id(type_id: &str) -> Self {
        let name = type_id.strip_prefix(TYPE_ID_PREFIX).unwrap_or(type_id);
        match name {
            "Reactor" => Self::Reactor,
            "BatteryBlock" => Self::Battery,
            "SolarPanel" => Self::SolarPanel,
            "Beacon" => Self::Beacon,
            "RadioAntenna" | "LaserAntenna" => Self::Antenna,
            "Refinery" => Self::Refinery,
            "Assembler" => Self::Assembler,
            "ReflectorLight" => Self::ReflectorLight,
            "MotorRotor" | "MotorAdvancedRotor" => Self::Rotor,
            "MotorStator" | "MotorAdvancedStator" => Self::Stator,
            "PistonBase" | "ExtendedPistonBase" => Self::PistonBase,
            "PistonTop" => Self::PistonTop,
            _ => Self::Generic,
        }
    }

    /// Reports whether the block physically joins two grids.
    #[must_use]
    pub const fn is_joint(&self) -> bool {
        matches!(
            self,
            Self::Rotor | Self::Stator | Self::PistonBase | Self::PistonTop
        )
    }

    /// Name accepted on the command line and in configuration files.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reactor => "reactor",
            Self::Battery => "battery",
            Self::SolarPanel => "solar-panel",
            Self::Beacon => "beacon",
            Self::Antenna => "antenna",
            Self::Refinery => "refinery",
            Self::Assembler => "assembler",
            Self::ReflectorLight => "reflector-light",
            Self::Rotor => "rotor",
            Self::Stator => "stator",
            Self::PistonBase => "piston-base",
            Self::PistonTop => "piston-top",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error raised when a user supplied name does not denote a known kind.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown {what} `{name}`")]
pub struct ParseKindError {
    what: &'static str,
    name: String,
}

impl ParseKindError {
    /// Creates an error for the unrecognised `name` of a `what`.
    #[must_use]
    pub fn new(what: &'static str, name: &str) -> Self {
        Self {
            what,
            name: name.to_owned(),
        }
    }
}

impl FromStr for BlockKind {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        let kind = match normalized.as_str() {
            "reactor" => Self::Reactor,
            "battery" => Self::Battery,
            "solar-panel" | "solar" => Self::SolarPanel,
            "beacon" => Self::Beacon,
            "antenna" => Self::Antenna,
            "refinery" => Self::Refinery,
            "assembler" => Self::Assembler,
            "reflector-light" | "spotlight" => Self::ReflectorLight,
            "rotor" => Self::Rotor,
            "stator" => Self::Stator,
            "piston-base" => Self::PistonBase,
            "piston-top" => Self::PistonTop,
            _ => return Err(ParseKindError::new("block kind", value)),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for BlockKind {
    type Error = ParseKindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Strategy used when switching off production blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactoryMode {
    /// Only idle factories are switched off.
    Soft,
    /// Every factory is switched off.
    Hard,
}

impl FromStr for FactoryMode {
    type Err = ParseKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            _ => Err(ParseKindError::new("factory mode", value)),
        }
    }
}

/// Explains why a record was selected for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// The grid has no potential power source although one was required.
    Unpowered,
    /// The grid contains none of the requested capabilities.
    MissingCapability,
    /// The grid looks like an abandoned non-player ship.
    NpcDerelict,
    /// The entity is a free-floating item.
    FloatingObject,
    /// The player owns nothing and is either dead or outside every faction.
    PlayerAbandoned {
        /// Whether the player identity is flagged dead.
        dead: bool,
        /// Whether the player belongs to no faction.
        factionless: bool,
    },
    /// The faction has no remaining members.
    FactionEmpty,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpowered => write!(f, "no power source"),
            Self::MissingCapability => write!(f, "no wanted capability"),
            Self::NpcDerelict => write!(f, "unmanned npc ship"),
            Self::FloatingObject => write!(f, "free-floating object"),
            Self::PlayerAbandoned { dead, factionless } => {
                write!(f, "owns nothing")?;
                if *dead {
                    write!(f, ", dead")?;
                }
                if *factionless {
                    write!(f, ", no faction")?;
                }
                Ok(())
            }
            Self::FactionEmpty => write!(f, "no members"),
        }
    }
}

/// Addresses a block by its position in the owning grid's block sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockRef {
    /// Grid entity that owns the block.
    pub entity: EntityId,
    /// Index of the block inside the grid's block sequence.
    pub index: usize,
}

impl BlockRef {
    /// Creates a new block reference.
    #[must_use]
    pub const fn new(entity: EntityId, index: usize) -> Self {
        Self { entity, index }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.index)
    }
}

/// Commands that express all permissible store mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Removes an entity from the world store.
    RemoveEntity {
        /// Entity selected for removal.
        entity: EntityId,
        /// Reason the entity was selected.
        reason: RemovalReason,
    },
    /// Clears the linear and angular velocity of an entity.
    ZeroVelocity {
        /// Entity whose motion is stopped.
        entity: EntityId,
    },
    /// Switches a block on or off.
    SetBlockEnabled {
        /// Block being toggled.
        block: BlockRef,
        /// Desired enabled state.
        enabled: bool,
    },
    /// Drops the pending production queue of a block.
    ClearProductionQueue {
        /// Block whose queue is discarded.
        block: BlockRef,
    },
    /// Removes a player from the flat player roster.
    RemovePlayerFromRoster {
        /// Player selected for removal.
        player: PlayerId,
        /// Reason the player was selected.
        reason: RemovalReason,
    },
    /// Removes a player from the keyed player directory.
    RemovePlayerFromDirectory {
        /// Player being removed.
        player: PlayerId,
    },
    /// Removes a player from a faction's member set.
    RemoveFactionMember {
        /// Faction losing the member.
        faction: FactionId,
        /// Member being removed.
        player: PlayerId,
    },
    /// Removes a player's pending join request from a faction.
    RemoveJoinRequest {
        /// Faction holding the request.
        faction: FactionId,
        /// Requesting player.
        player: PlayerId,
    },
    /// Removes a player's entry from the faction-to-player map.
    RemoveFactionPlayerEntry {
        /// Player whose mapping is removed.
        player: PlayerId,
    },
    /// Removes a faction record.
    RemoveFaction {
        /// Faction selected for removal.
        faction: FactionId,
        /// Reason the faction was selected.
        reason: RemovalReason,
    },
    /// Removes every relation between the two factions.
    RemoveRelation {
        /// First faction of the pair.
        first: FactionId,
        /// Second faction of the pair.
        second: FactionId,
    },
    /// Removes the request entry owned by a faction, including all sub-requests.
    RemoveRequestEntry {
        /// Faction owning the entry.
        owner: FactionId,
    },
    /// Removes a single sub-request target from a kept faction's request entry.
    RemoveRequestTarget {
        /// Faction owning the entry.
        owner: FactionId,
        /// Target faction referenced by the sub-request.
        target: FactionId,
    },
}

impl Command {
    /// Reports whether the command mutates the world store.
    #[must_use]
    pub const fn targets_world(&self) -> bool {
        matches!(
            self,
            Self::RemoveEntity { .. }
                | Self::ZeroVelocity { .. }
                | Self::SetBlockEnabled { .. }
                | Self::ClearProductionQueue { .. }
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoveEntity { entity, reason } => {
                write!(f, "remove entity {entity} ({reason})")
            }
            Self::ZeroVelocity { entity } => write!(f, "stop entity {entity}"),
            Self::SetBlockEnabled { block, enabled } => {
                let state = if *enabled { "enable" } else { "disable" };
                write!(f, "{state} block {block}")
            }
            Self::ClearProductionQueue { block } => write!(f, "clear queue of block {block}"),
            Self::RemovePlayerFromRoster { player, reason } => {
                write!(f, "remove player {player} from roster ({reason})")
            }
            Self::RemovePlayerFromDirectory { player } => {
                write!(f, "remove player {player} from directory")
            }
            Self::RemoveFactionMember { faction, player } => {
                write!(f, "remove player {player} from faction {faction}")
            }
            Self::RemoveJoinRequest { faction, player } => {
                write!(f, "remove join request of player {player} to faction {faction}")
            }
            Self::RemoveFactionPlayerEntry { player } => {
                write!(f, "remove player {player} from faction player map")
            }
            Self::RemoveFaction { faction, reason } => {
                write!(f, "remove faction {faction} ({reason})")
            }
            Self::RemoveRelation { first, second } => {
                write!(f, "remove relation {first} <-> {second}")
            }
            Self::RemoveRequestEntry { owner } => {
                write!(f, "remove request entry of faction {owner}")
            }
            Self::RemoveRequestTarget { owner, target } => {
                write!(f, "remove request {owner} -> {target}")
            }
        }
    }
}

/// Events broadcast by the stores after executing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// An entity was removed from the world store.
    EntityRemoved {
        /// Identifier of the removed entity.
        entity: EntityId,
        /// Reason supplied with the removal command.
        reason: RemovalReason,
    },
    /// An entity's velocity was cleared.
    EntityStopped {
        /// Identifier of the stopped entity.
        entity: EntityId,
    },
    /// A block changed its enabled state.
    BlockToggled {
        /// Block that changed.
        block: BlockRef,
        /// Enabled state after the change.
        enabled: bool,
    },
    /// A block's production queue was discarded.
    ProductionQueueCleared {
        /// Block whose queue was removed.
        block: BlockRef,
    },
    /// A player left the roster.
    PlayerRemoved {
        /// Identifier of the removed player.
        player: PlayerId,
    },
    /// A player left the keyed directory.
    PlayerDirectoryEntryRemoved {
        /// Identifier of the removed player.
        player: PlayerId,
    },
    /// A player left a faction's member set.
    FactionMemberRemoved {
        /// Faction that lost the member.
        faction: FactionId,
        /// Player that was removed.
        player: PlayerId,
    },
    /// A join request was withdrawn.
    JoinRequestRemoved {
        /// Faction that held the request.
        faction: FactionId,
        /// Player that requested to join.
        player: PlayerId,
    },
    /// A faction-to-player mapping was removed.
    FactionPlayerEntryRemoved {
        /// Player whose mapping was removed.
        player: PlayerId,
    },
    /// A faction was removed.
    FactionRemoved {
        /// Identifier of the removed faction.
        faction: FactionId,
    },
    /// Relation entries between two factions were removed.
    RelationRemoved {
        /// First faction of the pair.
        first: FactionId,
        /// Second faction of the pair.
        second: FactionId,
    },
    /// A faction's request entry was removed.
    RequestEntryRemoved {
        /// Faction that owned the entry.
        owner: FactionId,
    },
    /// A sub-request target was removed from a request entry.
    RequestTargetRemoved {
        /// Faction that owns the entry.
        owner: FactionId,
        /// Target that was removed.
        target: FactionId,
    },
}
