use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn length(self) -> f32 {
        self.distance(Vec2::ZERO)
    }

    /// Same direction with length `length`; zero stays zero.
    pub fn with_length(self, length: f32) -> Vec2 {
        let current = self.length();
        if current <= f32::EPSILON {
            return Vec2::ZERO;
        }
        let factor = length / current;
        Vec2::new(self.x * factor, self.y * factor)
    }
}

/// How long an entity is expected to live relative to a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Persistent,
    MapScoped,
    Transient,
}

/// Registry collection an entity lives in. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Player,
    Camera,
    Hud,
    Enemy,
    Car,
    Chest,
    Projectile,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Player,
        Category::Camera,
        Category::Hud,
        Category::Enemy,
        Category::Car,
        Category::Chest,
        Category::Projectile,
    ];

    pub fn scope(self) -> Scope {
        match self {
            Category::Player | Category::Camera | Category::Hud => Scope::Persistent,
            Category::Enemy | Category::Car | Category::Chest => Scope::MapScoped,
            Category::Projectile => Scope::Transient,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Player => "player",
            Category::Camera => "camera",
            Category::Hud => "hud",
            Category::Enemy => "enemy",
            Category::Car => "car",
            Category::Chest => "chest",
            Category::Projectile => "projectile",
        }
    }

    pub fn parse(raw: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|category| category.name().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Health {
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn apply_damage(&mut self, amount: u32) -> bool {
        self.current = self.current.saturating_sub(amount);
        self.current == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractableKind {
    Chest { holds_part: bool, opened: bool },
    StartingCar,
    RepairCar { parts_collected: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interactable {
    pub kind: InteractableKind,
    pub interaction_radius: f32,
}

impl Interactable {
    fn reset_state(&mut self) {
        self.kind = match self.kind {
            InteractableKind::Chest { holds_part, .. } => InteractableKind::Chest {
                holds_part,
                opened: false,
            },
            InteractableKind::StartingCar => InteractableKind::StartingCar,
            InteractableKind::RepairCar { .. } => {
                InteractableKind::RepairCar { parts_collected: 0 }
            }
        };
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    category: Category,
    def_name: String,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Units per second; 0 for things that never move on their own.
    pub move_speed: f32,
    pub spawn_position: Vec2,
    pub health: Option<Health>,
    pub active: bool,
    pub interactable: Option<Interactable>,
}

impl Entity {
    pub fn new(
        id: EntityId,
        category: Category,
        def_name: impl Into<String>,
        position: Vec2,
    ) -> Self {
        Self {
            id,
            category,
            def_name: def_name.into(),
            position,
            velocity: Vec2::ZERO,
            move_speed: 0.0,
            spawn_position: position,
            health: None,
            active: true,
            interactable: None,
        }
    }

    pub fn with_health(mut self, max: u32) -> Self {
        self.health = Some(Health::full(max));
        self
    }

    pub fn with_move_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }

    pub fn with_interactable(mut self, interactable: Interactable) -> Self {
        self.interactable = Some(interactable);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn def_name(&self) -> &str {
        &self.def_name
    }

    /// Restores default state without recreating the entity. A spawn point,
    /// when given, also becomes the remembered spawn position.
    pub fn reset_in_place(&mut self, spawn: Option<Vec2>) {
        if let Some(spawn) = spawn {
            self.spawn_position = spawn;
        }
        self.position = self.spawn_position;
        self.velocity = Vec2::ZERO;
        self.active = true;
        if let Some(health) = self.health.as_mut() {
            health.current = health.max;
        }
        if let Some(interactable) = self.interactable.as_mut() {
            interactable.reset_state();
        }
    }
}
