mod entity;
mod registry;

pub use entity::{
    Category, Entity, EntityId, EntityIdAllocator, Health, Interactable, InteractableKind, Scope,
    Vec2,
};
pub use registry::{CategoryCounts, EntitiesOf, EntityRegistry, RegistryError};
