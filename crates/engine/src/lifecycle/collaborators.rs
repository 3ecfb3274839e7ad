use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{Category, Entity, EntityId, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub u32);

impl MapId {
    pub fn next(self) -> MapId {
        MapId(self.0.saturating_add(1))
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnEntry {
    pub position: Vec2,
    pub entity_type: String,
}

impl SpawnEntry {
    pub fn new(entity_type: impl Into<String>, position: Vec2) -> Self {
        Self {
            position,
            entity_type: entity_type.into(),
        }
    }
}

/// Where and what to create for one category of one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub map: MapId,
    pub category: Category,
    pub entries: Vec<SpawnEntry>,
}

impl SpawnSpec {
    pub fn empty(map: MapId, category: Category) -> Self {
        Self {
            map,
            category,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapLoadError {
    #[error("map {map} is not known to the loader")]
    MapNotFound { map: MapId },
    #[error("map data for {map} is unavailable: {reason}")]
    Unavailable { map: MapId, reason: String },
}

/// Source of spawn data. Repeated queries for the same `(map, category)`
/// must return the same spec within one session.
pub trait MapLoader {
    /// Unknown maps fail; a known map without a section for `category`
    /// yields an empty spec.
    fn spawn_spec(&self, map: MapId, category: Category) -> Result<SpawnSpec, MapLoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("unknown entity type '{entity_type}'")]
    UnknownType { entity_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TeardownError {
    #[error("entity {id} has no live handle in the factory")]
    UnknownHandle { id: EntityId },
    #[error("failed to release entity {id}: {reason}")]
    Backend { id: EntityId, reason: String },
}

/// Creates entities by type name and releases whatever the host attached to
/// them once they leave the registry.
pub trait EntityFactory {
    fn create(&mut self, entity_type: &str, position: Vec2) -> Result<Entity, FactoryError>;

    fn teardown(&mut self, entity: Entity) -> Result<(), TeardownError> {
        drop(entity);
        Ok(())
    }
}

/// In-memory loader for hosts that build maps in code, and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticMapLoader {
    maps: BTreeSet<MapId>,
    sections: BTreeMap<(MapId, Category), Vec<SpawnEntry>>,
    unavailable: Option<String>,
}

impl StaticMapLoader {
    pub fn add_map(&mut self, map: MapId) -> &mut Self {
        self.maps.insert(map);
        self
    }

    pub fn set_section(
        &mut self,
        map: MapId,
        category: Category,
        entries: Vec<SpawnEntry>,
    ) -> &mut Self {
        self.maps.insert(map);
        self.sections.insert((map, category), entries);
        self
    }

    pub fn push_entry(&mut self, map: MapId, category: Category, entry: SpawnEntry) -> &mut Self {
        self.maps.insert(map);
        self.sections.entry((map, category)).or_default().push(entry);
        self
    }

    /// Simulates losing the data source: every query fails until cleared.
    pub fn set_unavailable(&mut self, reason: Option<String>) {
        self.unavailable = reason;
    }

    pub fn map_ids(&self) -> impl Iterator<Item = MapId> + '_ {
        self.maps.iter().copied()
    }
}

impl MapLoader for StaticMapLoader {
    fn spawn_spec(&self, map: MapId, category: Category) -> Result<SpawnSpec, MapLoadError> {
        if let Some(reason) = &self.unavailable {
            return Err(MapLoadError::Unavailable {
                map,
                reason: reason.clone(),
            });
        }
        if !self.maps.contains(&map) {
            return Err(MapLoadError::MapNotFound { map });
        }
        Ok(SpawnSpec {
            map,
            category,
            entries: self
                .sections
                .get(&(map, category))
                .cloned()
                .unwrap_or_default(),
        })
    }
}
