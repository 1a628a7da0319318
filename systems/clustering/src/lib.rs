#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Groups world store entities into clusters that are evaluated as one unit.
//!
//! A cluster is the set of grids mechanically joined by rotors and pistons.
//! Joint partners cannot yet be reconstructed from the save data, so the
//! maintenance run resolves every grid as a singleton and relies on
//! [`JointGuard`] to keep any grid that carries a joint block.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use se_maintenance_core::EntityId;
use se_maintenance_world::{Block, Entity, EntityKind, Sector};

/// Non-empty set of entities evaluated together, in first-visit order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    members: Vec<EntityId>,
}

impl Cluster {
    /// Creates a cluster holding only the seed entity.
    #[must_use]
    pub fn singleton(seed: EntityId) -> Self {
        Self {
            members: vec![seed],
        }
    }

    /// Entity the cluster was resolved from.
    #[must_use]
    pub fn seed(&self) -> EntityId {
        self.members[0]
    }

    /// Every member, seed first.
    #[must_use]
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Reports whether the entity belongs to the cluster.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    /// Member entities still present in the sector.
    pub fn entities<'a>(&'a self, sector: &'a Sector) -> impl Iterator<Item = &'a Entity> + 'a {
        self.members.iter().filter_map(|id| sector.entity(*id))
    }

    /// Every block of every member, in member then persisted order.
    pub fn blocks<'a>(&'a self, sector: &'a Sector) -> impl Iterator<Item = &'a Block> + 'a {
        self.entities(sector).flat_map(Entity::blocks)
    }
}

/// Resolves the cluster an entity belongs to.
pub trait ClusterResolver {
    /// Returns the cluster containing `seed`.
    fn resolve(&self, seed: EntityId, sector: &Sector) -> Cluster;
}

/// Resolver treating every entity as its own cluster.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingletonResolver;

impl ClusterResolver for SingletonResolver {
    fn resolve(&self, seed: EntityId, _sector: &Sector) -> Cluster {
        Cluster::singleton(seed)
    }
}

/// Undirected adjacency between entities joined by a rotor or piston.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JointLinks {
    adjacency: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl JointLinks {
    /// Creates an empty adjacency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the two entities are joined.
    pub fn link(&mut self, first: EntityId, second: EntityId) {
        let _ = self.adjacency.entry(first).or_default().insert(second);
        let _ = self.adjacency.entry(second).or_default().insert(first);
    }

    /// Entities joined to the provided one, in ascending identifier order.
    pub fn neighbours(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.adjacency
            .get(&entity)
            .into_iter()
            .flat_map(|neighbours| neighbours.iter().copied())
    }
}

/// Resolver closing the seed under the joint relation with a breadth-first walk.
#[derive(Clone, Debug, Default)]
pub struct JointGraphResolver {
    links: JointLinks,
}

impl JointGraphResolver {
    /// Creates a resolver over the provided adjacency.
    #[must_use]
    pub fn new(links: JointLinks) -> Self {
        Self { links }
    }
}

impl ClusterResolver for JointGraphResolver {
    fn resolve(&self, seed: EntityId, sector: &Sector) -> Cluster {
        let mut visited = BTreeSet::from([seed]);
        let mut members = Vec::new();
        let mut frontier = VecDeque::from([seed]);

        while let Some(current) = frontier.pop_front() {
            members.push(current);
            for neighbour in self.links.neighbours(current) {
                if sector.entity(neighbour).is_none() {
                    continue;
                }
                if visited.insert(neighbour) {
                    frontier.push_back(neighbour);
                }
            }
        }

        Cluster { members }
    }
}

/// Walks the cube grids of a sector and yields every cluster exactly once.
#[derive(Debug)]
pub struct ClusterScan<'a, R> {
    sector: &'a Sector,
    resolver: &'a R,
    next: usize,
    covered: BTreeSet<EntityId>,
}

impl<'a, R: ClusterResolver> ClusterScan<'a, R> {
    /// Starts a scan over the sector in persisted order.
    #[must_use]
    pub fn new(sector: &'a Sector, resolver: &'a R) -> Self {
        Self {
            sector,
            resolver,
            next: 0,
            covered: BTreeSet::new(),
        }
    }
}

impl<R: ClusterResolver> Iterator for ClusterScan<'_, R> {
    type Item = Cluster;

    fn next(&mut self) -> Option<Self::Item> {
        let entities = self.sector.entities();
        while let Some(entity) = entities.get(self.next) {
            self.next += 1;
            if entity.kind() != EntityKind::CubeGrid || self.covered.contains(&entity.id()) {
                continue;
            }
            let cluster = self.resolver.resolve(entity.id(), self.sector);
            self.covered.extend(cluster.members().iter().copied());
            return Some(cluster);
        }
        None
    }
}

/// Reports whether any member of the cluster carries a rotor or piston part.
#[must_use]
pub fn has_joint(cluster: &Cluster, sector: &Sector) -> bool {
    cluster.blocks(sector).any(|block| block.kind().is_joint())
}

/// Safety rule keeping clusters with joints out of every removal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JointGuard {
    override_active: bool,
}

impl JointGuard {
    /// Creates a guard; `override_active` lifts the protection.
    #[must_use]
    pub const fn new(override_active: bool) -> Self {
        Self { override_active }
    }

    /// Reports whether the guard forbids removing the cluster.
    #[must_use]
    pub fn vetoes(&self, cluster: &Cluster, sector: &Sector) -> bool {
        !self.override_active && has_joint(cluster, sector)
    }
}
