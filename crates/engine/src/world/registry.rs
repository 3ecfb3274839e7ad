use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entity::{Category, Entity, EntityId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("entity {id} is already registered (category {category})")]
    DuplicateId { id: EntityId, category: Category },
    #[error("entity {id} is not registered")]
    NotFound { id: EntityId },
    #[error("no live entities in category {category}")]
    NoEntities { category: Category },
}

/// Live entity count per category; every category is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts(BTreeMap<Category, usize>);

impl Default for CategoryCounts {
    fn default() -> Self {
        Self(Category::ALL.into_iter().map(|category| (category, 0)).collect())
    }
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        self.0.iter().map(|(category, count)| (*category, *count))
    }

    fn set(&mut self, category: Category, count: usize) {
        self.0.insert(category, count);
    }
}

/// Insertion-ordered view over one category. Clone it to walk the same
/// category again.
#[derive(Debug, Clone)]
pub struct EntitiesOf<'a> {
    inner: std::slice::Iter<'a, Entity>,
}

impl<'a> Iterator for EntitiesOf<'a> {
    type Item = &'a Entity;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for EntitiesOf<'_> {}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    collections: BTreeMap<Category, Vec<Entity>>,
    index: HashMap<EntityId, Category>,
}

impl EntityRegistry {
    pub fn register(&mut self, entity: Entity) -> Result<EntityId, RegistryError> {
        let id = entity.id();
        if let Some(existing) = self.index.get(&id) {
            return Err(RegistryError::DuplicateId {
                id,
                category: *existing,
            });
        }
        let category = entity.category();
        self.index.insert(id, category);
        self.collections.entry(category).or_default().push(entity);
        Ok(id)
    }

    pub fn unregister(&mut self, id: EntityId) -> Result<Entity, RegistryError> {
        let category = self
            .index
            .remove(&id)
            .ok_or(RegistryError::NotFound { id })?;
        let collection = self
            .collections
            .get_mut(&category)
            .ok_or(RegistryError::NotFound { id })?;
        let position = collection
            .iter()
            .position(|entity| entity.id() == id)
            .ok_or(RegistryError::NotFound { id })?;
        Ok(collection.remove(position))
    }

    pub fn entities_of(&self, category: Category) -> EntitiesOf<'_> {
        let slice = self
            .collections
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default();
        EntitiesOf {
            inner: slice.iter(),
        }
    }

    pub fn entities_of_mut(&mut self, category: Category) -> std::slice::IterMut<'_, Entity> {
        self.collections
            .get_mut(&category)
            .map(|collection| collection.iter_mut())
            .unwrap_or_default()
    }

    /// Empties one category, handing back its entities in insertion order.
    pub fn clear(&mut self, category: Category) -> Vec<Entity> {
        let removed = self
            .collections
            .get_mut(&category)
            .map(std::mem::take)
            .unwrap_or_default();
        for entity in &removed {
            self.index.remove(&entity.id());
        }
        removed
    }

    pub fn get(&self, id: EntityId) -> Result<&Entity, RegistryError> {
        let category = self
            .index
            .get(&id)
            .copied()
            .ok_or(RegistryError::NotFound { id })?;
        self.entities_of(category)
            .find(|entity| entity.id() == id)
            .ok_or(RegistryError::NotFound { id })
    }

    pub fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity, RegistryError> {
        let category = self
            .index
            .get(&id)
            .copied()
            .ok_or(RegistryError::NotFound { id })?;
        self.entities_of_mut(category)
            .find(|entity| entity.id() == id)
            .ok_or(RegistryError::NotFound { id })
    }

    pub fn first_of(&self, category: Category) -> Result<&Entity, RegistryError> {
        self.entities_of(category)
            .next()
            .ok_or(RegistryError::NoEntities { category })
    }

    pub fn first_of_mut(&mut self, category: Category) -> Result<&mut Entity, RegistryError> {
        self.entities_of_mut(category)
            .next()
            .ok_or(RegistryError::NoEntities { category })
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn count(&self, category: Category) -> usize {
        self.collections.get(&category).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn counts(&self) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for category in Category::ALL {
            counts.set(category, self.count(category));
        }
        counts
    }
}
