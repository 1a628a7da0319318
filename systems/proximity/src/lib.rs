#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Decides whether a terrain volume can be restored without burying anything.
//!
//! Restoring an asteroid rewrites its voxel storage from a snapshot. Any grid
//! or character inside the restored volume would end up embedded in rock, so
//! restoration is only allowed when every such obstacle sits at least a safe
//! radius away. Distances are Manhattan distances.

use std::collections::BTreeSet;

use se_maintenance_core::{EntityId, Vector3};
use se_maintenance_world::{EntityKind, Sector};
use serde::Deserialize;
use tracing::debug;

/// Safe radius around a primary terrain volume.
pub const PRIMARY_SAFE_RADIUS: f64 = 600.0;
/// Safe radius around a minor terrain volume attached to a primary one.
pub const MINOR_SAFE_RADIUS: f64 = 300.0;
/// Storage name fragment identifying minor volumes by default.
pub const DEFAULT_MINOR_MARKER: &str = "moon";

/// Positions that must stay clear of restored terrain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Obstacles {
    positions: Vec<Vector3>,
}

impl Obstacles {
    /// Creates an obstacle set from raw positions.
    #[must_use]
    pub fn from_positions(positions: impl IntoIterator<Item = Vector3>) -> Self {
        Self {
            positions: positions.into_iter().collect(),
        }
    }

    /// Collects cube grids and characters of the sector, skipping `excluded` entities.
    #[must_use]
    pub fn from_sector(sector: &Sector, excluded: &BTreeSet<EntityId>) -> Self {
        Self::from_positions(
            sector
                .entities()
                .iter()
                .filter(|entity| matches!(entity.kind(), EntityKind::CubeGrid | EntityKind::Character))
                .filter(|entity| !excluded.contains(&entity.id()))
                .filter_map(|entity| entity.position()),
        )
    }

    /// Obstacle positions.
    #[must_use]
    pub fn positions(&self) -> &[Vector3] {
        &self.positions
    }
}

/// Reports whether every obstacle lies at least `safe_radius` away from `target`.
#[must_use]
pub fn can_restore(obstacles: &Obstacles, target: Vector3, safe_radius: f64) -> bool {
    obstacles
        .positions
        .iter()
        .all(|position| position.manhattan_distance(&target) >= safe_radius)
}

/// Size class of a terrain volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VolumeClass {
    /// Standalone asteroid.
    Primary,
    /// Small volume attached to a primary one.
    Minor,
}

/// Classifies terrain volumes and assigns their safe radius.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeClassifier {
    /// Storage name fragments marking a minor volume, matched case-insensitively.
    pub minor_markers: Vec<String>,
    /// Safe radius of primary volumes.
    pub primary_radius: f64,
    /// Safe radius of minor volumes.
    pub minor_radius: f64,
}

impl Default for VolumeClassifier {
    fn default() -> Self {
        Self {
            minor_markers: vec![DEFAULT_MINOR_MARKER.to_owned()],
            primary_radius: PRIMARY_SAFE_RADIUS,
            minor_radius: MINOR_SAFE_RADIUS,
        }
    }
}

impl VolumeClassifier {
    /// Classifies a volume by its storage name.
    #[must_use]
    pub fn classify(&self, storage_name: &str) -> VolumeClass {
        let name = storage_name.to_ascii_lowercase();
        if self
            .minor_markers
            .iter()
            .any(|marker| name.contains(&marker.to_ascii_lowercase()))
        {
            VolumeClass::Minor
        } else {
            VolumeClass::Primary
        }
    }

    /// Safe radius for the provided class.
    #[must_use]
    pub fn safe_radius(&self, class: VolumeClass) -> f64 {
        match class {
            VolumeClass::Primary => self.primary_radius,
            VolumeClass::Minor => self.minor_radius,
        }
    }
}

/// Outcome of checking a single terrain volume.
#[derive(Clone, Debug, PartialEq)]
pub struct RestoreDecision {
    /// Terrain entity.
    pub entity: EntityId,
    /// Voxel storage name.
    pub storage_name: String,
    /// Size class of the volume.
    pub class: VolumeClass,
    /// Whether restoring is safe.
    pub allowed: bool,
}

/// Plans restoration of every terrain volume in a sector.
#[derive(Clone, Debug, Default)]
pub struct RestorePlanner {
    classifier: VolumeClassifier,
}

impl RestorePlanner {
    /// Creates a planner with the provided classifier.
    #[must_use]
    pub fn new(classifier: VolumeClassifier) -> Self {
        Self { classifier }
    }

    /// Checks every terrain volume against the entities that will survive.
    ///
    /// `excluded` lists entities about to be removed; they are not obstacles.
    /// Volumes without a storage name are skipped, volumes without a position refused.
    #[must_use]
    pub fn plan(&self, sector: &Sector, excluded: &BTreeSet<EntityId>) -> Vec<RestoreDecision> {
        let obstacles = Obstacles::from_sector(sector, excluded);
        sector
            .entities()
            .iter()
            .filter(|entity| entity.kind() == EntityKind::VoxelMap)
            .filter_map(|entity| {
                let storage_name = entity.storage_name()?;
                let class = self.classifier.classify(storage_name);
                let radius = self.classifier.safe_radius(class);
                let allowed = entity
                    .position()
                    .is_some_and(|position| can_restore(&obstacles, position, radius));
                debug!(entity = %entity.id(), storage_name, ?class, radius, allowed, "terrain restore checked");
                Some(RestoreDecision {
                    entity: entity.id(),
                    storage_name: storage_name.to_owned(),
                    class,
                    allowed,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_must_be_strictly_below_radius_to_block() {
        let obstacles = Obstacles::from_positions([Vector3::new(300.0, 200.0, 100.0)]);
        assert!(can_restore(&obstacles, Vector3::ZERO, 600.0), "exactly on the radius is safe");
        assert!(!can_restore(&obstacles, Vector3::ZERO, 600.5));
        assert!(can_restore(&Obstacles::default(), Vector3::ZERO, 600.0));
    }

    #[test]
    fn moons_are_minor_volumes() {
        let classifier = VolumeClassifier::default();
        assert_eq!(classifier.classify("Asteroid_Moon_12"), VolumeClass::Minor);
        assert_eq!(classifier.classify("asteroid_large_3"), VolumeClass::Primary);
        assert_eq!(classifier.safe_radius(VolumeClass::Minor), MINOR_SAFE_RADIUS);
    }
}
