//! Builders producing save documents shaped like the ones the game writes.
//!
//! Only compiled with the `fixtures` feature; system crates enable it for
//! their tests.

use se_maintenance_core::{FactionId, PlayerId, Vector3};

use crate::{
    xml::{Element, TYPE_ATTRIBUTE},
    Checkpoint, Document, DocumentError, Sector, World,
};

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Builder for a single cube block.
#[derive(Clone, Debug)]
pub struct BlockBuilder {
    element: Element,
}

impl BlockBuilder {
    /// Starts a block of the provided builder type, e.g. `Reactor`.
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self {
            element: Element::new("MyObjectBuilder_CubeBlock")
                .with_attribute(TYPE_ATTRIBUTE, format!("MyObjectBuilder_{type_name}")),
        }
    }

    /// Reactor holding the provided number of fuel stacks.
    #[must_use]
    pub fn reactor(fuel_stacks: usize) -> Self {
        Self::new("Reactor").enabled(true).inventory("Inventory", fuel_stacks)
    }

    /// Battery holding the provided stored charge.
    #[must_use]
    pub fn battery(stored_power: f64) -> Self {
        Self::new("BatteryBlock").enabled(true).stored_power(stored_power)
    }

    /// Generic armor block.
    #[must_use]
    pub fn armor() -> Self {
        Self {
            element: Element::new("MyObjectBuilder_CubeBlock")
                .with_child(Element::new("SubtypeName").with_text("LargeBlockArmorBlock")),
        }
    }

    /// Sets the subtype name.
    #[must_use]
    pub fn subtype(self, subtype: &str) -> Self {
        self.child(Element::new("SubtypeName").with_text(subtype))
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn enabled(self, enabled: bool) -> Self {
        self.child(Element::new("Enabled").with_text(enabled.to_string()))
    }

    /// Sets the stored charge.
    #[must_use]
    pub fn stored_power(self, stored_power: f64) -> Self {
        self.child(Element::new("CurrentStoredPower").with_text(stored_power.to_string()))
    }

    /// Sets the owning player.
    #[must_use]
    pub fn owner(self, owner: i64) -> Self {
        self.child(Element::new("Owner").with_text(owner.to_string()))
    }

    /// Sets the custom display name.
    #[must_use]
    pub fn custom_name(self, name: &str) -> Self {
        self.child(Element::new("CustomName").with_text(name))
    }

    /// Adds an inventory container (`Inventory` or `InputInventory`) with item stacks.
    #[must_use]
    pub fn inventory(self, container: &str, stacks: usize) -> Self {
        let items = (0..stacks).fold(Element::new("Items"), |items, index| {
            items.with_child(
                Element::new("MyObjectBuilder_InventoryItem")
                    .with_child(Element::new("Amount").with_text("1"))
                    .with_child(Element::new("ItemId").with_text(index.to_string())),
            )
        });
        self.child(Element::new(container).with_child(items))
    }

    /// Adds a production queue with the provided number of entries.
    #[must_use]
    pub fn queue(self, entries: usize) -> Self {
        let queue = (0..entries).fold(Element::new("Queue"), |queue, _| {
            queue.with_child(
                Element::new("MyObjectBuilder_ProductionBlock.QueueItem")
                    .with_child(Element::new("Amount").with_text("1")),
            )
        });
        self.child(queue)
    }

    fn child(mut self, child: Element) -> Self {
        self.element = self.element.with_child(child);
        self
    }
}

/// Builder for a cube grid entity.
#[derive(Clone, Debug)]
pub struct GridBuilder {
    id: i64,
    position: Vector3,
    is_static: bool,
    dampeners: Option<bool>,
    linear_velocity: Option<Vector3>,
    angular_velocity: Option<Vector3>,
    blocks: Vec<Element>,
}

impl GridBuilder {
    /// Starts a dynamic grid at the origin without blocks.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            position: Vector3::ZERO,
            is_static: false,
            dampeners: Some(true),
            linear_velocity: None,
            angular_velocity: None,
            blocks: Vec::new(),
        }
    }

    /// Places the grid.
    #[must_use]
    pub fn at(mut self, position: Vector3) -> Self {
        self.position = position;
        self
    }

    /// Marks the grid as a static station.
    #[must_use]
    pub fn stationary(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Sets or clears the persisted dampener flag.
    #[must_use]
    pub fn dampeners(mut self, dampeners: Option<bool>) -> Self {
        self.dampeners = dampeners;
        self
    }

    /// Sets the persisted velocities.
    #[must_use]
    pub fn moving(mut self, linear: Vector3, angular: Vector3) -> Self {
        self.linear_velocity = Some(linear);
        self.angular_velocity = Some(angular);
        self
    }

    /// Appends a block.
    #[must_use]
    pub fn block(mut self, block: BlockBuilder) -> Self {
        self.blocks.push(block.element);
        self
    }

    fn into_element(self) -> Element {
        let mut element = entity_element("MyObjectBuilder_CubeGrid", self.id, self.position)
            .with_child(Element::new("GridSizeEnum").with_text("Large"))
            .with_child(Element::new("CubeBlocks"))
            .with_child(Element::new("IsStatic").with_text(self.is_static.to_string()));
        if let Some(container) = element.child_mut("CubeBlocks") {
            container.replace_children(self.blocks);
        }
        if let Some(velocity) = self.linear_velocity {
            element.push_child(vector_element("LinearVelocity", velocity));
        }
        if let Some(velocity) = self.angular_velocity {
            element.push_child(vector_element("AngularVelocity", velocity));
        }
        if let Some(dampeners) = self.dampeners {
            element.push_child(Element::new("DampenersEnabled").with_text(dampeners.to_string()));
        }
        element.with_child(Element::new("DisplayName").with_text(format!("Grid {}", self.id)))
    }
}

/// Builder for the world store.
#[derive(Clone, Debug, Default)]
pub struct SectorBuilder {
    objects: Vec<Element>,
}

impl SectorBuilder {
    /// Starts an empty sector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cube grid.
    #[must_use]
    pub fn grid(mut self, grid: GridBuilder) -> Self {
        self.objects.push(grid.into_element());
        self
    }

    /// Appends a free-floating item.
    #[must_use]
    pub fn floating_object(mut self, id: i64, position: Vector3) -> Self {
        self.objects
            .push(entity_element("MyObjectBuilder_FloatingObject", id, position));
        self
    }

    /// Appends a character body.
    #[must_use]
    pub fn character(mut self, id: i64, position: Vector3) -> Self {
        self.objects
            .push(entity_element("MyObjectBuilder_Character", id, position));
        self
    }

    /// Appends a terrain volume backed by the named storage file.
    #[must_use]
    pub fn voxel_map(mut self, id: i64, storage_name: &str, position: Vector3) -> Self {
        self.objects.push(
            entity_element("MyObjectBuilder_VoxelMap", id, position)
                .with_child(Element::new("StorageName").with_text(storage_name)),
        );
        self
    }

    /// Produces the world store document.
    #[must_use]
    pub fn document(self) -> Document {
        let objects = self
            .objects
            .into_iter()
            .fold(Element::new("SectorObjects"), Element::with_child);
        Document::new(
            namespaced_root("MyObjectBuilder_Sector")
                .with_child(Element::new("Position").with_attribute("x", "0").with_attribute("y", "0").with_attribute("z", "0"))
                .with_child(objects),
        )
    }

    /// Produces the typed world store.
    pub fn build(self) -> Result<Sector, DocumentError> {
        Sector::from_document(self.document())
    }
}

/// Builder for the social store.
#[derive(Clone, Debug, Default)]
pub struct CheckpointBuilder {
    players: Vec<Element>,
    directory: Vec<Element>,
    factions: Vec<Element>,
    faction_players: Vec<Element>,
    relations: Vec<Element>,
    requests: Vec<Element>,
}

impl CheckpointBuilder {
    /// Starts an empty checkpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player to both the roster and the directory.
    #[must_use]
    pub fn player(mut self, id: i64, name: &str, dead: bool) -> Self {
        self.players.push(
            Element::new("PlayerItem")
                .with_child(Element::new("PlayerId").with_text(id.to_string()))
                .with_child(Element::new("IsDead").with_text(dead.to_string()))
                .with_child(Element::new("Model").with_text("Default_Astronaut"))
                .with_child(Element::new("Name").with_text(name)),
        );
        let serial = self.directory.len();
        self.directory.push(
            Element::new("item")
                .with_child(
                    Element::new("Key")
                        .with_child(Element::new("ClientId").with_text((76_561_198_000_000_000_i64 + id).to_string()))
                        .with_child(Element::new("SerialId").with_text(serial.to_string())),
                )
                .with_child(
                    Element::new("Value")
                        .with_child(Element::new("PlayerId").with_text(id.to_string()))
                        .with_child(Element::new("DisplayName").with_text(name)),
                ),
        );
        self
    }

    /// Adds a faction; members are also mapped in the faction-to-player table.
    #[must_use]
    pub fn faction(mut self, id: i64, tag: &str, members: &[i64], join_requests: &[i64]) -> Self {
        for member in members {
            self.faction_players.push(
                Element::new("item")
                    .with_child(Element::new("Key").with_text(member.to_string()))
                    .with_child(Element::new("Value").with_text(id.to_string())),
            );
        }
        self.factions.push(
            Element::new("MyObjectBuilder_Faction")
                .with_child(Element::new("FactionId").with_text(id.to_string()))
                .with_child(Element::new("Tag").with_text(tag))
                .with_child(Element::new("Name").with_text(format!("{tag} faction")))
                .with_child(member_list("Members", members))
                .with_child(member_list("JoinRequests", join_requests)),
        );
        self
    }

    /// Adds a relation between two factions.
    #[must_use]
    pub fn relation(mut self, first: i64, second: i64) -> Self {
        self.relations.push(
            Element::new("MyObjectBuilder_FactionRelation")
                .with_child(Element::new("FactionId1").with_text(first.to_string()))
                .with_child(Element::new("FactionId2").with_text(second.to_string()))
                .with_child(Element::new("Relation").with_text("Enemies")),
        );
        self
    }

    /// Adds a request entry sent by `owner` to every faction in `targets`.
    #[must_use]
    pub fn request(mut self, owner: i64, targets: &[i64]) -> Self {
        let list = targets.iter().fold(Element::new("FactionRequests"), |list, target| {
            list.with_child(Element::new("long").with_text(target.to_string()))
        });
        self.requests.push(
            Element::new("MyObjectBuilder_FactionRequests")
                .with_child(Element::new("FactionId").with_text(owner.to_string()))
                .with_child(list),
        );
        self
    }

    /// Produces the social store document.
    #[must_use]
    pub fn document(self) -> Document {
        let all_players = self
            .players
            .into_iter()
            .fold(Element::new("AllPlayers"), Element::with_child);
        let directory = self
            .directory
            .into_iter()
            .fold(Element::new("dictionary"), Element::with_child);
        let factions = self
            .factions
            .into_iter()
            .fold(Element::new("Factions"), Element::with_child);
        let faction_players = self
            .faction_players
            .into_iter()
            .fold(Element::new("dictionary"), Element::with_child);
        let relations = self
            .relations
            .into_iter()
            .fold(Element::new("Relations"), Element::with_child);
        let requests = self
            .requests
            .into_iter()
            .fold(Element::new("Requests"), Element::with_child);

        Document::new(
            namespaced_root("MyObjectBuilder_Checkpoint")
                .with_child(Element::new("SessionName").with_text("Fixture"))
                .with_child(all_players)
                .with_child(Element::new("Players").with_child(directory))
                .with_child(
                    Element::new("Factions")
                        .with_child(factions)
                        .with_child(Element::new("Players").with_child(faction_players))
                        .with_child(relations)
                        .with_child(requests),
                ),
        )
    }

    /// Produces the typed social store.
    pub fn build(self) -> Result<Checkpoint, DocumentError> {
        Checkpoint::from_document(self.document())
    }
}

/// Builds a world from both builders.
pub fn world(sector: SectorBuilder, checkpoint: CheckpointBuilder) -> Result<World, DocumentError> {
    Ok(World::new(sector.build()?, checkpoint.build()?))
}

/// Convenience conversion for identifiers used in assertions.
#[must_use]
pub fn player(id: i64) -> PlayerId {
    PlayerId::new(id)
}

/// Convenience conversion for identifiers used in assertions.
#[must_use]
pub fn faction(id: i64) -> FactionId {
    FactionId::new(id)
}

fn namespaced_root(name: &str) -> Element {
    Element::new(name)
        .with_attribute("xmlns:xsd", XSD_NAMESPACE)
        .with_attribute("xmlns:xsi", XSI_NAMESPACE)
}

fn entity_element(type_id: &str, id: i64, position: Vector3) -> Element {
    Element::new("MyObjectBuilder_EntityBase")
        .with_attribute(TYPE_ATTRIBUTE, type_id)
        .with_child(Element::new("EntityId").with_text(id.to_string()))
        .with_child(Element::new("PersistentFlags").with_text("CastShadows InScene"))
        .with_child(
            Element::new("PositionAndOrientation")
                .with_child(vector_element("Position", position))
                .with_child(vector_element("Forward", Vector3::new(0.0, 0.0, -1.0)))
                .with_child(vector_element("Up", Vector3::new(0.0, 1.0, 0.0))),
        )
}

fn vector_element(name: &str, vector: Vector3) -> Element {
    Element::new(name)
        .with_attribute("x", vector.x.to_string())
        .with_attribute("y", vector.y.to_string())
        .with_attribute("z", vector.z.to_string())
}

fn member_list(name: &str, players: &[i64]) -> Element {
    players.iter().fold(Element::new(name), |list, player| {
        list.with_child(
            Element::new("MyObjectBuilder_FactionMember")
                .with_child(Element::new("PlayerId").with_text(player.to_string()))
                .with_child(Element::new("IsLeader").with_text("false"))
                .with_child(Element::new("IsFounder").with_text("false")),
        )
    })
}
