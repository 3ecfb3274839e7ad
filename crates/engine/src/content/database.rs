use std::collections::HashMap;

use crate::world::{Category, Entity, EntityId, Interactable, InteractableKind, Vec2};

pub const DEFAULT_INTERACTION_RADIUS: f32 = 48.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityDefId(pub u32);

#[derive(Debug, Clone)]
pub struct EntityArchetype {
    pub id: EntityDefId,
    pub def_name: String,
    pub label: String,
    pub category: Category,
    pub move_speed: f32,
    pub health_max: Option<u32>,
    pub interactable: Option<InteractableKind>,
    pub interaction_radius: f32,
}

impl EntityArchetype {
    pub fn new(def_name: impl Into<String>, category: Category) -> Self {
        let def_name = def_name.into();
        Self {
            id: EntityDefId(0),
            label: def_name.clone(),
            def_name,
            category,
            move_speed: 0.0,
            health_max: None,
            interactable: None,
            interaction_radius: DEFAULT_INTERACTION_RADIUS,
        }
    }

    pub fn with_health(mut self, max: u32) -> Self {
        self.health_max = Some(max);
        self
    }

    pub fn with_move_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }

    pub fn with_interactable(mut self, kind: InteractableKind) -> Self {
        self.interactable = Some(kind);
        self
    }

    pub fn instantiate(&self, id: EntityId, position: Vec2) -> Entity {
        let mut entity = Entity::new(id, self.category, self.def_name.clone(), position)
            .with_move_speed(self.move_speed);
        if let Some(max) = self.health_max {
            entity = entity.with_health(max);
        }
        if let Some(kind) = self.interactable {
            entity = entity.with_interactable(Interactable {
                kind,
                interaction_radius: self.interaction_radius,
            });
        }
        entity
    }
}

#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    entity_defs: Vec<EntityArchetype>,
    entity_ids_by_name: HashMap<String, EntityDefId>,
}

impl DefDatabase {
    /// Ids follow the order of `entity_defs`.
    pub fn from_entity_defs(mut entity_defs: Vec<EntityArchetype>) -> Self {
        let mut entity_ids_by_name = HashMap::with_capacity(entity_defs.len());
        for (idx, def) in entity_defs.iter_mut().enumerate() {
            let id = EntityDefId(idx as u32);
            def.id = id;
            entity_ids_by_name.insert(def.def_name.clone(), id);
        }
        Self {
            entity_defs,
            entity_ids_by_name,
        }
    }

    pub fn entity_def_id_by_name(&self, name: &str) -> Option<EntityDefId> {
        self.entity_ids_by_name.get(name).copied()
    }

    pub fn entity_def(&self, id: EntityDefId) -> Option<&EntityArchetype> {
        self.entity_defs.get(id.0 as usize)
    }

    pub fn archetype(&self, name: &str) -> Option<&EntityArchetype> {
        self.entity_def_id_by_name(name)
            .and_then(|id| self.entity_def(id))
    }

    pub fn entity_defs(&self) -> &[EntityArchetype] {
        &self.entity_defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiate_applies_health_and_interactable() {
        let chest = EntityArchetype::new("chest.part", Category::Chest).with_interactable(
            InteractableKind::Chest {
                holds_part: true,
                opened: false,
            },
        );
        let entity = chest.instantiate(EntityId(3), Vec2::new(4.0, 5.0));
        assert_eq!(entity.category(), Category::Chest);
        assert_eq!(entity.def_name(), "chest.part");
        assert_eq!(entity.spawn_position, Vec2::new(4.0, 5.0));
        assert!(entity.health.is_none());
        assert_eq!(
            entity.interactable.map(|interactable| interactable.interaction_radius),
            Some(DEFAULT_INTERACTION_RADIUS)
        );

        let zombie = EntityArchetype::new("zombie", Category::Enemy).with_health(30);
        let entity = zombie.instantiate(EntityId(4), Vec2::ZERO);
        assert_eq!(entity.health.map(|health| health.max), Some(30));
        assert_eq!(entity.move_speed, 0.0);

        let bullet = EntityArchetype::new("bullet", Category::Projectile).with_move_speed(800.0);
        let entity = bullet.instantiate(EntityId(5), Vec2::ZERO);
        assert_eq!(entity.move_speed, 800.0);
    }

    #[test]
    fn lookup_by_name_uses_assigned_ids() {
        let db = DefDatabase::from_entity_defs(vec![
            EntityArchetype::new("player", Category::Player),
            EntityArchetype::new("zombie", Category::Enemy),
        ]);
        assert_eq!(db.entity_def_id_by_name("zombie"), Some(EntityDefId(1)));
        assert_eq!(
            db.archetype("player").map(|def| def.id),
            Some(EntityDefId(0))
        );
        assert!(db.archetype("ghoul").is_none());
    }
}
