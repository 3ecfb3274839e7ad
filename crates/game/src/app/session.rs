use scrapyard_engine::{
    Category, DiagnosticsHandle, Entity, EntityFactory, EntityId, EntityRegistry, FactoryError,
    InteractableKind, MapId, MapLoader, RegistryError, ResetAborted, ResetCoordinator,
    ResetSession, Vec2, CAMERA_TYPE,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub(crate) const PLAYER_TYPE: &str = "player";
pub(crate) const HUD_TYPE: &str = "hud";
pub(crate) const PROJECTILE_TYPE: &str = "bullet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionConfig {
    pub(crate) start_map: MapId,
    pub(crate) last_map: MapId,
    pub(crate) required_parts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Advanced { from: MapId, to: MapId },
    Restarted { map: MapId },
    NewGame { map: MapId },
    Escaped { from: MapId },
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("factory: {0}")]
    Factory(#[from] FactoryError),
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Reset(#[from] ResetAborted),
    #[error("session has not loaded a map yet")]
    NotStarted,
    #[error("entity {id} is not a chest")]
    NotAChest { id: EntityId },
    #[error("chest {id} is already open")]
    ChestAlreadyOpened { id: EntityId },
    #[error("entity {id} is out of reach ({distance:.1} units away)")]
    OutOfReach { id: EntityId, distance: f32 },
    #[error("car needs {required} parts, only {collected} collected")]
    NotEnoughParts { collected: u32, required: u32 },
}

/// One playthrough: the live world plus everything needed to move between
/// maps.
pub(crate) struct GameSession {
    registry: EntityRegistry,
    coordinator: ResetCoordinator,
    loader: Box<dyn MapLoader>,
    factory: Box<dyn EntityFactory>,
    config: SessionConfig,
    current_map: Option<MapId>,
    player_id: EntityId,
    history: Vec<ResetSession>,
}

impl GameSession {
    /// Creates the persistent player, camera and HUD. No map is loaded until
    /// `start`.
    pub(crate) fn new(
        coordinator: ResetCoordinator,
        loader: Box<dyn MapLoader>,
        mut factory: Box<dyn EntityFactory>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut registry = EntityRegistry::default();
        let player_id = registry.register(factory.create(PLAYER_TYPE, Vec2::ZERO)?)?;
        registry.register(factory.create(CAMERA_TYPE, Vec2::ZERO)?)?;
        registry.register(factory.create(HUD_TYPE, Vec2::ZERO)?)?;
        Ok(Self {
            registry,
            coordinator,
            loader,
            factory,
            config,
            current_map: None,
            player_id,
            history: Vec::new(),
        })
    }

    pub(crate) fn start(&mut self) -> Result<&ResetSession, SessionError> {
        self.new_game()?;
        self.history.last().ok_or(SessionError::NotStarted)
    }

    /// Back to the first map with a fresh world. Persistent entities are
    /// reset in place, so their ids survive; repair progress does not.
    pub(crate) fn new_game(&mut self) -> Result<Transition, SessionError> {
        let map = self.config.start_map;
        info!(from = ?self.current_map, to = %map, "new_game");
        self.reset_to(map)?;
        Ok(Transition::NewGame { map })
    }

    pub(crate) fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub(crate) fn current_map(&self) -> Option<MapId> {
        self.current_map
    }

    pub(crate) fn history(&self) -> &[ResetSession] {
        &self.history
    }

    pub(crate) fn diagnostics(&self) -> DiagnosticsHandle {
        self.coordinator.diagnostics()
    }

    pub(crate) fn player(&self) -> Result<&Entity, SessionError> {
        Ok(self.registry.get(self.player_id)?)
    }

    pub(crate) fn move_player_to(&mut self, position: Vec2) -> Result<(), SessionError> {
        self.registry.get_mut(self.player_id)?.position = position;
        Ok(())
    }

    /// Fires along `direction` at the projectile's own speed.
    pub(crate) fn fire_projectile(&mut self, direction: Vec2) -> Result<EntityId, SessionError> {
        let origin = self.player()?.position;
        let mut projectile = self.factory.create(PROJECTILE_TYPE, origin)?;
        projectile.velocity = direction.with_length(projectile.move_speed);
        let id = self.registry.register(projectile)?;
        debug!(entity_id = id.0, "projectile_fired");
        Ok(id)
    }

    /// Returns whether the player is now dead.
    pub(crate) fn damage_player(&mut self, amount: u32) -> Result<bool, SessionError> {
        let player = self.registry.get_mut(self.player_id)?;
        let dead = player
            .health
            .as_mut()
            .is_some_and(|health| health.apply_damage(amount));
        if dead {
            info!(map = ?self.current_map, "player_died");
        }
        Ok(dead)
    }

    /// Opens a chest in reach. Returns whether a part went into the car.
    pub(crate) fn open_chest(&mut self, id: EntityId) -> Result<bool, SessionError> {
        let player_position = self.player()?.position;
        let chest = self.registry.get_mut(id)?;
        let Some(interactable) = chest.interactable.as_mut() else {
            return Err(SessionError::NotAChest { id });
        };
        let InteractableKind::Chest { holds_part, opened } = interactable.kind else {
            return Err(SessionError::NotAChest { id });
        };
        if opened {
            return Err(SessionError::ChestAlreadyOpened { id });
        }
        let distance = player_position.distance(chest.position);
        if distance > interactable.interaction_radius {
            return Err(SessionError::OutOfReach { id, distance });
        }
        interactable.kind = InteractableKind::Chest {
            holds_part,
            opened: true,
        };
        if !holds_part {
            debug!(entity_id = id.0, "chest_empty");
            return Ok(false);
        }

        let required = self.config.required_parts;
        let added = self
            .registry
            .entities_of_mut(Category::Car)
            .filter_map(|car| car.interactable.as_mut())
            .find_map(|interactable| match &mut interactable.kind {
                InteractableKind::RepairCar { parts_collected } => Some(parts_collected),
                _ => None,
            })
            .is_some_and(|parts_collected| {
                if *parts_collected >= required {
                    return false;
                }
                *parts_collected += 1;
                true
            });
        info!(
            entity_id = id.0,
            added,
            parts = self.parts_collected(),
            required,
            "chest_opened"
        );
        Ok(added)
    }

    pub(crate) fn parts_collected(&self) -> u32 {
        self.registry
            .entities_of(Category::Car)
            .filter_map(|car| car.interactable)
            .find_map(|interactable| match interactable.kind {
                InteractableKind::RepairCar { parts_collected } => Some(parts_collected),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub(crate) fn try_escape(&mut self) -> Result<Transition, SessionError> {
        let from = self.current_map.ok_or(SessionError::NotStarted)?;
        let collected = self.parts_collected();
        let required = self.config.required_parts;
        if collected < required {
            return Err(SessionError::NotEnoughParts {
                collected,
                required,
            });
        }
        if from >= self.config.last_map {
            info!(map = %from, "escaped");
            return Ok(Transition::Escaped { from });
        }
        let to = from.next();
        self.reset_to(to)?;
        Ok(Transition::Advanced { from, to })
    }

    /// Reloads the current map from scratch.
    pub(crate) fn restart_map(&mut self) -> Result<Transition, SessionError> {
        let map = self.current_map.ok_or(SessionError::NotStarted)?;
        self.reset_to(map)?;
        Ok(Transition::Restarted { map })
    }

    fn reset_to(&mut self, map: MapId) -> Result<(), SessionError> {
        let result = self.coordinator.perform_reset(
            map,
            &mut self.registry,
            self.loader.as_ref(),
            self.factory.as_mut(),
        );
        match result {
            Ok(session) => {
                self.history.push(session);
                self.current_map = Some(map);
                Ok(())
            }
            Err(aborted) => {
                if let Some(session) = self.coordinator.last_session() {
                    self.history.push(session.clone());
                }
                warn!(
                    map = %map,
                    current = ?self.current_map,
                    error = %aborted,
                    "map_transition_aborted"
                );
                Err(SessionError::Reset(aborted))
            }
        }
    }
}
