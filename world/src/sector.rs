//! Typed view of the world store (`SANDBOX_0_0_0_.sbs`).

use std::collections::HashMap;

use se_maintenance_core::{BlockKind, EntityId, PlayerId, Vector3};

use crate::{
    xml::{Document, Element},
    DocumentError,
};

const SECTOR_OBJECTS: &str = "SectorObjects";
const CUBE_BLOCKS: &str = "CubeBlocks";
const LINEAR_VELOCITY: &str = "LinearVelocity";
const ANGULAR_VELOCITY: &str = "AngularVelocity";
const ENABLED: &str = "Enabled";
const QUEUE: &str = "Queue";
const POSITION_PATH: [&str; 2] = ["PositionAndOrientation", "Position"];

/// Coarse classification of a world store entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Ship or station built from blocks.
    CubeGrid,
    /// Free-floating item such as ore or components.
    FloatingObject,
    /// Terrain volume (asteroid).
    VoxelMap,
    /// Player or NPC character body.
    Character,
    /// Anything the maintenance engine does not interpret.
    Other,
}

impl EntityKind {
    fn from_type_id(type_id: Option<&str>) -> Self {
        match type_id {
            Some("MyObjectBuilder_CubeGrid") => Self::CubeGrid,
            Some("MyObjectBuilder_FloatingObject") => Self::FloatingObject,
            Some("MyObjectBuilder_VoxelMap") => Self::VoxelMap,
            Some("MyObjectBuilder_Character") => Self::Character,
            _ => Self::Other,
        }
    }
}

/// Block placed on a cube grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    kind: BlockKind,
    subtype: Option<String>,
    enabled: Option<bool>,
    owner: Option<PlayerId>,
    custom_name: Option<String>,
    inventory_items: Option<usize>,
    input_items: Option<usize>,
    queue: Option<usize>,
    stored_power: Option<f64>,
    element: Element,
}

impl Block {
    /// Builds a typed block from its persisted element.
    #[must_use]
    pub fn from_element(element: Element) -> Self {
        let kind = element
            .type_id()
            .map_or(BlockKind::Generic, BlockKind::from_type_id);
        let subtype = element
            .child_text("SubtypeName")
            .filter(|subtype| !subtype.is_empty())
            .map(str::to_owned);
        let enabled = element.child_text(ENABLED).and_then(parse_bool);
        let owner = element
            .child_text("Owner")
            .and_then(|owner| owner.parse::<PlayerId>().ok())
            .filter(|owner| owner.get() != 0);
        let custom_name = element.child_text("CustomName").map(str::to_owned);
        let inventory_items = element
            .descendant(&["Inventory", "Items"])
            .map(|items| items.children().len());
        let input_items = element
            .descendant(&["InputInventory", "Items"])
            .map(|items| items.children().len());
        let queue = element.child(QUEUE).map(|queue| queue.children().len());
        let stored_power = element
            .child_text("CurrentStoredPower")
            .and_then(|power| power.parse::<f64>().ok());

        Self {
            kind,
            subtype,
            enabled,
            owner,
            custom_name,
            inventory_items,
            input_items,
            queue,
            stored_power,
            element,
        }
    }

    /// Maintenance classification of the block.
    #[must_use]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Persisted builder type of the block.
    #[must_use]
    pub fn type_id(&self) -> Option<&str> {
        self.element.type_id()
    }

    /// Subtype name distinguishing variants of the same kind.
    #[must_use]
    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// Raw enabled flag, `None` when the block does not persist one.
    #[must_use]
    pub fn enabled_flag(&self) -> Option<bool> {
        self.enabled
    }

    /// Whether the block is switched on. Blocks without a persisted flag are on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Player holding ownership of the block.
    #[must_use]
    pub fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    /// Player-assigned display name.
    #[must_use]
    pub fn custom_name(&self) -> Option<&str> {
        self.custom_name.as_deref()
    }

    /// Number of item stacks in the main inventory (reactor fuel).
    #[must_use]
    pub fn inventory_items(&self) -> usize {
        self.inventory_items.unwrap_or(0)
    }

    /// Number of item stacks waiting in the input inventory.
    #[must_use]
    pub fn input_items(&self) -> usize {
        self.input_items.unwrap_or(0)
    }

    /// Number of entries in the production queue, `None` when no queue is stored.
    #[must_use]
    pub fn queue_len(&self) -> Option<usize> {
        self.queue
    }

    /// Stored charge, zero when not persisted.
    #[must_use]
    pub fn stored_power(&self) -> f64 {
        self.stored_power.unwrap_or(0.0)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.enabled == Some(enabled) {
            return false;
        }
        self.enabled = Some(enabled);
        true
    }

    pub(crate) fn clear_queue(&mut self) -> bool {
        self.queue.take().is_some()
    }

    fn into_element(mut self) -> Element {
        if let Some(enabled) = self.enabled {
            self.element.set_child_text(ENABLED, format_bool(enabled));
        }
        if self.queue.is_none() {
            let _ = self.element.remove_children_named(QUEUE);
        }
        self.element
    }
}

/// Payload specific to cube grid entities.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    display_name: Option<String>,
    is_static: bool,
    dampeners_enabled: Option<bool>,
    linear_velocity: Option<Vector3>,
    angular_velocity: Option<Vector3>,
    blocks: Vec<Block>,
}

impl Grid {
    fn from_element(element: &mut Element) -> Self {
        let blocks = element
            .child_mut(CUBE_BLOCKS)
            .map(Element::take_children)
            .unwrap_or_default()
            .into_iter()
            .map(Block::from_element)
            .collect();

        Self {
            display_name: element.child_text("DisplayName").map(str::to_owned),
            is_static: element
                .child_text("IsStatic")
                .and_then(parse_bool)
                .unwrap_or(false),
            dampeners_enabled: element.child_text("DampenersEnabled").and_then(parse_bool),
            linear_velocity: element.child(LINEAR_VELOCITY).and_then(parse_vector),
            angular_velocity: element.child(ANGULAR_VELOCITY).and_then(parse_vector),
            blocks,
        }
    }

    /// Name shown for the grid in game.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Whether the grid is a static station.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Inertial dampener flag, `None` when the save does not record it.
    #[must_use]
    pub fn dampeners_enabled(&self) -> Option<bool> {
        self.dampeners_enabled
    }

    /// Linear velocity, zero when not persisted.
    #[must_use]
    pub fn linear_velocity(&self) -> Vector3 {
        self.linear_velocity.unwrap_or(Vector3::ZERO)
    }

    /// Angular velocity, zero when not persisted.
    #[must_use]
    pub fn angular_velocity(&self) -> Vector3 {
        self.angular_velocity.unwrap_or(Vector3::ZERO)
    }

    /// Whether the grid is moving or spinning.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        !self.linear_velocity().is_zero() || !self.angular_velocity().is_zero()
    }

    /// Blocks of the grid in persisted order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    pub(crate) fn stop(&mut self) -> bool {
        if !self.is_moving() {
            return false;
        }
        for velocity in [&mut self.linear_velocity, &mut self.angular_velocity] {
            if velocity.is_some() {
                *velocity = Some(Vector3::ZERO);
            }
        }
        true
    }

    fn lower_into(self, element: &mut Element) {
        if let Some(velocity) = self.linear_velocity {
            write_vector(element, LINEAR_VELOCITY, velocity);
        }
        if let Some(velocity) = self.angular_velocity {
            write_vector(element, ANGULAR_VELOCITY, velocity);
        }
        let blocks = self.blocks.into_iter().map(Block::into_element).collect();
        if let Some(container) = element.child_mut(CUBE_BLOCKS) {
            container.replace_children(blocks);
        }
    }
}

/// Entity stored in the world store.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    position: Option<Vector3>,
    storage_name: Option<String>,
    grid: Option<Grid>,
    element: Element,
}

impl Entity {
    /// Builds a typed entity from its persisted element.
    pub fn from_element(mut element: Element) -> Result<Self, DocumentError> {
        let raw_id = element.child_text("EntityId").unwrap_or_default();
        let id = raw_id
            .parse::<EntityId>()
            .map_err(|_| DocumentError::invalid_field("entity", "EntityId", raw_id))?;
        let kind = EntityKind::from_type_id(element.type_id());
        let position = element.descendant(&POSITION_PATH).and_then(parse_vector);
        let storage_name = element
            .child_text("StorageName")
            .filter(|name| !name.is_empty())
            .map(str::to_owned);
        let grid = (kind == EntityKind::CubeGrid).then(|| Grid::from_element(&mut element));

        Ok(Self {
            id,
            kind,
            position,
            storage_name,
            grid,
            element,
        })
    }

    /// Identifier of the entity.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Coarse classification of the entity.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// World position, when persisted.
    #[must_use]
    pub fn position(&self) -> Option<Vector3> {
        self.position
    }

    /// Storage file name of a voxel map.
    #[must_use]
    pub fn storage_name(&self) -> Option<&str> {
        self.storage_name.as_deref()
    }

    /// Grid payload of cube grid entities.
    #[must_use]
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    /// Blocks of the entity, empty for anything but cube grids.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        self.grid.as_ref().map(Grid::blocks).unwrap_or_default()
    }

    pub(crate) fn grid_mut(&mut self) -> Option<&mut Grid> {
        self.grid.as_mut()
    }

    fn into_element(self) -> Element {
        let mut element = self.element;
        if let Some(grid) = self.grid {
            grid.lower_into(&mut element);
        }
        element
    }
}

/// World store: every entity of the sector in persisted order.
#[derive(Clone, Debug, PartialEq)]
pub struct Sector {
    root: Element,
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl Sector {
    /// Builds the typed world store from a loaded document.
    pub fn from_document(document: Document) -> Result<Self, DocumentError> {
        let mut root = document.into_root();
        let objects = root
            .child_mut(SECTOR_OBJECTS)
            .ok_or(DocumentError::MissingCollection(SECTOR_OBJECTS))?
            .take_children();
        let entities = objects
            .into_iter()
            .map(Entity::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        let index = index_entities(&entities);
        Ok(Self {
            root,
            entities,
            index,
        })
    }

    /// Lowers the typed store back into a document.
    #[must_use]
    pub fn into_document(self) -> Document {
        let mut root = self.root;
        let objects = self.entities.into_iter().map(Entity::into_element).collect();
        if let Some(container) = root.child_mut(SECTOR_OBJECTS) {
            container.replace_children(objects);
        }
        Document::new(root)
    }

    /// Entities in persisted order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Looks up an entity by identifier.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.index
            .get(&id)
            .and_then(|&position| self.entities.get(position))
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let position = *self.index.get(&id)?;
        self.entities.get_mut(position)
    }

    pub(crate) fn remove_entity(&mut self, id: EntityId) -> bool {
        if !self.index.contains_key(&id) {
            return false;
        }
        self.entities.retain(|entity| entity.id != id);
        self.index = index_entities(&self.entities);
        true
    }
}

/// Maps every identifier to its first entity in store order.
fn index_entities(entities: &[Entity]) -> HashMap<EntityId, usize> {
    let mut index = HashMap::with_capacity(entities.len());
    for (position, entity) in entities.iter().enumerate() {
        let _ = index.entry(entity.id).or_insert(position);
    }
    index
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn parse_vector(element: &Element) -> Option<Vector3> {
    let axis = |name: &str| {
        element
            .attribute(name)
            .and_then(|value| value.trim().parse::<f64>().ok())
    };
    Some(Vector3::new(axis("x")?, axis("y")?, axis("z")?))
}

fn write_vector(element: &mut Element, name: &str, vector: Vector3) {
    if element.child(name).is_none() {
        element.push_child(Element::new(name));
    }
    if let Some(target) = element.child_mut(name) {
        target.set_attribute("x", vector.x.to_string());
        target.set_attribute("y", vector.y.to_string());
        target.set_attribute("z", vector.z.to_string());
    }
}
