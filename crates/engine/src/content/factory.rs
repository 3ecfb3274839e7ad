use std::collections::HashSet;

use tracing::debug;

use crate::lifecycle::{EntityFactory, FactoryError, TeardownError};
use crate::world::{Entity, EntityId, EntityIdAllocator, Vec2};

use super::database::DefDatabase;

/// Builds entities from compiled defs and tracks which ids it handed out.
#[derive(Debug)]
pub struct DefEntityFactory {
    defs: DefDatabase,
    allocator: EntityIdAllocator,
    live: HashSet<EntityId>,
}

impl DefEntityFactory {
    pub fn new(defs: DefDatabase) -> Self {
        Self {
            defs,
            allocator: EntityIdAllocator::default(),
            live: HashSet::new(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }
}

impl EntityFactory for DefEntityFactory {
    fn create(&mut self, entity_type: &str, position: Vec2) -> Result<Entity, FactoryError> {
        let archetype =
            self.defs
                .archetype(entity_type)
                .ok_or_else(|| FactoryError::UnknownType {
                    entity_type: entity_type.to_string(),
                })?;
        let id = self.allocator.allocate();
        let entity = archetype.instantiate(id, position);
        self.live.insert(id);
        debug!(entity_id = id.0, label = %archetype.label, "entity_created");
        Ok(entity)
    }

    fn teardown(&mut self, entity: Entity) -> Result<(), TeardownError> {
        let id = entity.id();
        if !self.live.remove(&id) {
            return Err(TeardownError::UnknownHandle { id });
        }
        debug!(entity_id = id.0, def_name = entity.def_name(), "entity_released");
        Ok(())
    }
}
