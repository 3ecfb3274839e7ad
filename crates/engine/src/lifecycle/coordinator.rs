use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::world::{Category, EntityRegistry, RegistryError, Vec2};

use super::collaborators::{EntityFactory, MapId, MapLoadError, MapLoader, SpawnSpec};
use super::policy::{LifecyclePolicy, ResetOptions};
use super::session::{DiagnosticsHandle, ResetPhase, ResetSession, SkipReason, SkippedSpawn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reset {sequence} to {map} aborted: {source}")]
pub struct ResetAborted {
    pub map: MapId,
    pub sequence: u64,
    #[source]
    pub source: MapLoadError,
}

/// Every spawn spec one pass needs, fetched before anything is mutated.
struct SpawnPlan {
    specs: BTreeMap<Category, SpawnSpec>,
}

impl SpawnPlan {
    fn fetch(
        map: MapId,
        categories: impl IntoIterator<Item = Category>,
        loader: &dyn MapLoader,
    ) -> Result<Self, MapLoadError> {
        let mut specs = BTreeMap::new();
        for category in categories {
            let spec = loader.spawn_spec(map, category)?;
            specs.insert(category, spec);
        }
        Ok(Self { specs })
    }

    fn take(&mut self, map: MapId, category: Category) -> SpawnSpec {
        self.specs
            .remove(&category)
            .unwrap_or_else(|| SpawnSpec::empty(map, category))
    }
}

/// Runs reset passes. Holds no entities between calls.
#[derive(Debug)]
pub struct ResetCoordinator {
    policy: LifecyclePolicy,
    options: ResetOptions,
    next_sequence: u64,
    last_session: Option<ResetSession>,
    diagnostics: DiagnosticsHandle,
}

impl ResetCoordinator {
    pub fn new(policy: LifecyclePolicy, options: ResetOptions) -> Self {
        Self {
            policy,
            options,
            next_sequence: 0,
            last_session: None,
            diagnostics: DiagnosticsHandle::default(),
        }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn last_session(&self) -> Option<&ResetSession> {
        self.last_session.as_ref()
    }

    pub fn diagnostics(&self) -> DiagnosticsHandle {
        self.diagnostics.clone()
    }

    /// Brings the world to a fresh load of `target`. On `Err` the registry
    /// has not been touched.
    pub fn perform_reset(
        &mut self,
        target: MapId,
        registry: &mut EntityRegistry,
        loader: &dyn MapLoader,
        factory: &mut dyn EntityFactory,
    ) -> Result<ResetSession, ResetAborted> {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        let mut session = ResetSession::begin(target, sequence);
        info!(map = %target, sequence, "reset_started");

        session.enter(ResetPhase::Snapshotting);
        session.before = registry.counts();
        let needed = self
            .policy
            .position_reset_order()
            .into_iter()
            .chain(self.policy.reload_order());
        let mut plan = match SpawnPlan::fetch(target, needed, loader) {
            Ok(plan) => plan,
            Err(source) => {
                session.enter(ResetPhase::Aborted);
                session.after = session.before.clone();
                warn!(map = %target, sequence, error = %source, "reset_aborted");
                self.record(session);
                return Err(ResetAborted {
                    map: target,
                    sequence,
                    source,
                });
            }
        };

        session.enter(ResetPhase::ResettingPersistent);
        for category in self.policy.position_reset_order() {
            let spec = plan.take(target, category);
            self.reset_persistent(category, &spec, registry, &mut session);
        }

        session.enter(ResetPhase::Clearing);
        for category in self.policy.clear_order() {
            let removed = registry.clear(category);
            let count = removed.len();
            for entity in removed {
                let id = entity.id();
                if let Err(error) = factory.teardown(entity) {
                    session.teardown_failures += 1;
                    warn!(
                        map = %target,
                        %category,
                        entity_id = id.0,
                        error = %error,
                        "teardown_failed"
                    );
                }
            }
            session.cleared += count;
            debug!(map = %target, %category, cleared = count, "category_cleared");
        }

        session.enter(ResetPhase::Reloading);
        let anchors = self.exclusion_anchors(registry);
        for category in self.policy.reload_order() {
            let spec = plan.take(target, category);
            self.reload_category(category, &spec, &anchors, registry, factory, &mut session);
        }

        session.after = registry.counts();
        session.enter(ResetPhase::Finalized);
        info!(
            map = %target,
            sequence,
            repositioned = session.repositioned,
            cleared = session.cleared,
            created = session.created,
            skipped = session.skipped.len(),
            excluded = session.excluded,
            teardown_failures = session.teardown_failures,
            entity_count = registry.len(),
            "reset_finalized"
        );
        self.record(session.clone());
        Ok(session)
    }

    fn reset_persistent(
        &self,
        category: Category,
        spec: &SpawnSpec,
        registry: &mut EntityRegistry,
        session: &mut ResetSession,
    ) {
        if let Err(RegistryError::NoEntities { .. }) = registry.first_of(category) {
            warn!(map = %session.map, %category, "persistent_entity_missing");
            session.missing_persistent.push(category);
            return;
        }

        let mut spawns = spec.entries.iter().map(|entry| entry.position);
        for entity in registry.entities_of_mut(category) {
            let spawn = spawns.next();
            if spawn.is_none() {
                debug!(
                    map = %session.map,
                    %category,
                    entity_id = entity.id().0,
                    "persistent_entity_without_spawn"
                );
            }
            entity.reset_in_place(spawn);
            session.repositioned += 1;
        }
    }

    /// Settled player positions that enemy spawns must keep away from.
    fn exclusion_anchors(&self, registry: &EntityRegistry) -> Vec<Vec2> {
        if self.options.spawn_exclusion_radius().is_none() {
            return Vec::new();
        }
        registry
            .entities_of(Category::Player)
            .map(|player| player.position)
            .collect()
    }

    fn reload_category(
        &self,
        category: Category,
        spec: &SpawnSpec,
        anchors: &[Vec2],
        registry: &mut EntityRegistry,
        factory: &mut dyn EntityFactory,
        session: &mut ResetSession,
    ) {
        if spec.is_empty() {
            if self.policy.expects_populated(category) {
                warn!(map = %session.map, %category, "spawn_section_empty");
                session.empty_sections.push(category);
            }
            return;
        }

        for (entry_index, entry) in spec.entries.iter().enumerate() {
            if let (Category::Enemy, Some(radius)) =
                (category, self.options.spawn_exclusion_radius())
            {
                if anchors
                    .iter()
                    .any(|anchor| anchor.distance(entry.position) < radius)
                {
                    session.excluded += 1;
                    debug!(
                        map = %session.map,
                        %category,
                        entry_index,
                        "spawn_entry_excluded"
                    );
                    continue;
                }
            }

            let reason = match factory.create(&entry.entity_type, entry.position) {
                Err(error) => {
                    debug!(map = %session.map, %category, error = %error, "factory_rejected");
                    SkipReason::UnknownType
                }
                Ok(entity) if entity.category() != category => {
                    let actual = entity.category();
                    if let Err(error) = factory.teardown(entity) {
                        session.teardown_failures += 1;
                        warn!(
                            map = %session.map,
                            %category,
                            error = %error,
                            "teardown_failed"
                        );
                    }
                    SkipReason::CategoryMismatch { actual }
                }
                // A reissued id shares its factory handle with the entity
                // already registered, so the copy is dropped, not torn down.
                Ok(entity) => match registry.register(entity) {
                    Ok(_) => {
                        session.created += 1;
                        continue;
                    }
                    Err(error) => {
                        warn!(
                            map = %session.map,
                            %category,
                            error = %error,
                            "register_failed"
                        );
                        SkipReason::DuplicateId
                    }
                },
            };

            warn!(
                map = %session.map,
                %category,
                entry_index,
                entity_type = %entry.entity_type,
                reason = ?reason,
                "spawn_entry_skipped"
            );
            session.skipped.push(SkippedSpawn {
                category,
                entry_index,
                entity_type: entry.entity_type.clone(),
                reason,
            });
        }
    }

    fn record(&mut self, session: ResetSession) {
        self.diagnostics.publish(session.clone());
        self.last_session = Some(session);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::lifecycle::collaborators::{
        FactoryError, SpawnEntry, StaticMapLoader, TeardownError,
    };
    use crate::lifecycle::policy::{LifecycleConfig, PolicyEntry, ResetStrategy};
    use crate::world::{Entity, EntityId, EntityIdAllocator};

    struct TestFactory {
        allocator: EntityIdAllocator,
        types: HashMap<&'static str, Category>,
        fail_teardown_for: HashSet<EntityId>,
        torn_down: Vec<EntityId>,
        reissue_next: Option<EntityId>,
    }

    impl TestFactory {
        fn new() -> Self {
            let types = HashMap::from([
                ("player", Category::Player),
                ("camera", Category::Camera),
                ("zombie", Category::Enemy),
                ("car.old", Category::Car),
                ("car.new", Category::Car),
                ("chest.part", Category::Chest),
                ("bullet", Category::Projectile),
            ]);
            Self {
                allocator: EntityIdAllocator::default(),
                types,
                fail_teardown_for: HashSet::new(),
                torn_down: Vec::new(),
                reissue_next: None,
            }
        }
    }

    impl EntityFactory for TestFactory {
        fn create(&mut self, entity_type: &str, position: Vec2) -> Result<Entity, FactoryError> {
            let category =
                self.types
                    .get(entity_type)
                    .copied()
                    .ok_or_else(|| FactoryError::UnknownType {
                        entity_type: entity_type.to_string(),
                    })?;
            let id = match self.reissue_next.take() {
                Some(id) => id,
                None => self.allocator.allocate(),
            };
            let entity = Entity::new(id, category, entity_type, position);
            Ok(match category {
                Category::Player | Category::Enemy => entity.with_health(100),
                _ => entity,
            })
        }

        fn teardown(&mut self, entity: Entity) -> Result<(), TeardownError> {
            if self.fail_teardown_for.contains(&entity.id()) {
                return Err(TeardownError::Backend {
                    id: entity.id(),
                    reason: "sprite already released".to_string(),
                });
            }
            self.torn_down.push(entity.id());
            Ok(())
        }
    }

    fn coordinator() -> ResetCoordinator {
        let (policy, options) = LifecycleConfig::default().validate().expect("policy");
        ResetCoordinator::new(policy, options)
    }

    fn grid_positions(count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|i| Vec2::new((i % 5) as f32 * 32.0 + 100.0, (i / 5) as f32 * 32.0 + 100.0))
            .collect()
    }

    fn map_two_loader(enemy_positions: &[Vec2]) -> StaticMapLoader {
        let mut loader = StaticMapLoader::default();
        loader.set_section(
            MapId(2),
            Category::Player,
            vec![SpawnEntry::new("player", Vec2::new(10.0, 10.0))],
        );
        loader.set_section(
            MapId(2),
            Category::Enemy,
            enemy_positions
                .iter()
                .map(|position| SpawnEntry::new("zombie", *position))
                .collect(),
        );
        loader.set_section(
            MapId(2),
            Category::Car,
            vec![
                SpawnEntry::new("car.old", Vec2::new(10.0, 10.0)),
                SpawnEntry::new("car.new", Vec2::new(400.0, 300.0)),
            ],
        );
        loader
    }

    /// Map 1 state: a damaged player at (50,50), ten zombies, a chest and
    /// two bullets in flight.
    fn populated_map_one(factory: &mut TestFactory) -> (EntityRegistry, EntityId) {
        let mut registry = EntityRegistry::default();
        let mut player = factory
            .create("player", Vec2::new(50.0, 50.0))
            .expect("player");
        player.velocity = Vec2::new(2.0, 0.0);
        player.health.as_mut().expect("health").apply_damage(40);
        let player_id = registry.register(player).expect("register player");
        for i in 0..10 {
            let zombie = factory
                .create("zombie", Vec2::new(i as f32, 900.0))
                .expect("zombie");
            registry.register(zombie).expect("register zombie");
        }
        let chest = factory
            .create("chest.part", Vec2::new(5.0, 5.0))
            .expect("chest");
        registry.register(chest).expect("register chest");
        for _ in 0..2 {
            let bullet = factory.create("bullet", Vec2::new(60.0, 50.0)).expect("bullet");
            registry.register(bullet).expect("register bullet");
        }
        (registry, player_id)
    }

    fn snapshot(registry: &EntityRegistry) -> Vec<(Category, u64, String, Vec2)> {
        Category::ALL
            .into_iter()
            .flat_map(move |category| {
                registry.entities_of(category).map(move |entity| {
                    (
                        category,
                        entity.id().0,
                        entity.def_name().to_string(),
                        entity.position,
                    )
                })
            })
            .collect()
    }

    #[test]
    fn transition_replaces_enemies_and_respawns_player() {
        let mut factory = TestFactory::new();
        let (mut registry, player_id) = populated_map_one(&mut factory);
        let positions = grid_positions(25);
        let loader = map_two_loader(&positions);
        let mut coordinator = coordinator();

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        let player = registry.get(player_id).expect("player survives");
        assert_eq!(player.position, Vec2::new(10.0, 10.0));
        assert_eq!(player.velocity, Vec2::ZERO);
        assert_eq!(player.health.map(|health| health.current), Some(100));

        let enemies: Vec<Vec2> = registry
            .entities_of(Category::Enemy)
            .map(|enemy| enemy.position)
            .collect();
        assert_eq!(enemies, positions);
        assert!(registry
            .entities_of(Category::Enemy)
            .all(|enemy| enemy.def_name() == "zombie" && enemy.position.y < 900.0));

        assert_eq!(session.phase, ResetPhase::Finalized);
        assert_eq!(session.before.get(Category::Enemy), 10);
        assert_eq!(session.after.get(Category::Enemy), 25);
        assert_eq!(session.cleared, 13);
        assert_eq!(session.created, 27);
        assert!(session.skipped.is_empty());

        // Bullets go first, then zombies, then the chest.
        let expected_teardown: Vec<EntityId> = [12, 13]
            .into_iter()
            .chain(1..=10)
            .chain([11])
            .map(EntityId)
            .collect();
        assert_eq!(factory.torn_down, expected_teardown);
    }

    #[test]
    fn clear_only_categories_end_empty_and_stay_empty() {
        let mut factory = TestFactory::new();
        let (mut registry, _) = populated_map_one(&mut factory);
        let loader = map_two_loader(&grid_positions(3));
        let mut coordinator = coordinator();

        coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(registry.count(Category::Projectile), 0);
        assert_eq!(registry.count(Category::Chest), 0);
    }

    #[test]
    fn unknown_map_aborts_without_touching_the_world() {
        let mut factory = TestFactory::new();
        let (mut registry, _) = populated_map_one(&mut factory);
        let before = snapshot(&registry);
        let loader = map_two_loader(&grid_positions(25));
        let mut coordinator = coordinator();

        let aborted = coordinator
            .perform_reset(MapId(99), &mut registry, &loader, &mut factory)
            .expect_err("map 99 is unknown");

        assert_eq!(aborted.map, MapId(99));
        assert_eq!(
            aborted.source,
            MapLoadError::MapNotFound { map: MapId(99) }
        );
        assert_eq!(snapshot(&registry), before);
        assert!(factory.torn_down.is_empty());

        let last = coordinator.last_session().expect("recorded");
        assert_eq!(last.phase, ResetPhase::Aborted);
        assert_eq!(last.before, last.after);
    }

    #[test]
    fn lost_data_source_keeps_player_in_place() {
        let mut factory = TestFactory::new();
        let (mut registry, player_id) = populated_map_one(&mut factory);
        let mut loader = map_two_loader(&grid_positions(5));
        loader.set_unavailable(Some("maps directory unmounted".to_string()));
        let mut coordinator = coordinator();

        let aborted = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect_err("unavailable");
        assert!(matches!(aborted.source, MapLoadError::Unavailable { .. }));
        assert_eq!(
            registry.get(player_id).expect("player").position,
            Vec2::new(50.0, 50.0)
        );
    }

    #[test]
    fn unknown_spawn_type_is_skipped_and_recorded() {
        let mut factory = TestFactory::new();
        let (mut registry, _) = populated_map_one(&mut factory);
        let positions = grid_positions(25);
        let mut loader = map_two_loader(&positions);
        let mut entries: Vec<SpawnEntry> = positions
            .iter()
            .map(|position| SpawnEntry::new("zombie", *position))
            .collect();
        entries[7].entity_type = "ghoul".to_string();
        loader.set_section(MapId(2), Category::Enemy, entries);
        let mut coordinator = coordinator();

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset still completes");

        assert_eq!(registry.count(Category::Enemy), 24);
        assert_eq!(
            session.skipped,
            vec![SkippedSpawn {
                category: Category::Enemy,
                entry_index: 7,
                entity_type: "ghoul".to_string(),
                reason: SkipReason::UnknownType,
            }]
        );
    }

    #[test]
    fn repeated_resets_to_same_map_are_identical() {
        let mut factory = TestFactory::new();
        let (mut registry, player_id) = populated_map_one(&mut factory);
        let loader = map_two_loader(&grid_positions(25));
        let mut coordinator = coordinator();

        let _first = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("first");
        let layout = |registry: &EntityRegistry| -> Vec<(Category, String, Vec2)> {
            snapshot(registry)
                .into_iter()
                .map(|(category, _, def_name, position)| (category, def_name, position))
                .collect()
        };
        let after_first = layout(&registry);
        let second = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("second");
        let third = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("third");

        assert_eq!(layout(&registry), after_first);
        assert_eq!(second.counts(), third.counts());
        assert_eq!(second.before, second.after);
        assert_eq!(second.sequence + 1, third.sequence);
        assert_eq!(
            registry.get(player_id).expect("player").category(),
            Category::Player
        );
    }

    #[test]
    fn teardown_failures_are_counted_and_do_not_stop_the_pass() {
        let mut factory = TestFactory::new();
        let (mut registry, _) = populated_map_one(&mut factory);
        let doomed: Vec<EntityId> = registry
            .entities_of(Category::Enemy)
            .take(2)
            .map(|enemy| enemy.id())
            .collect();
        factory.fail_teardown_for.extend(doomed.iter().copied());
        let loader = map_two_loader(&grid_positions(4));
        let mut coordinator = coordinator();

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(session.teardown_failures, 2);
        assert_eq!(registry.count(Category::Enemy), 4);
        assert!(doomed.iter().all(|id| !registry.contains(*id)));
    }

    #[test]
    fn missing_persistent_entities_are_not_fatal() {
        let mut factory = TestFactory::new();
        let mut registry = EntityRegistry::default();
        let loader = map_two_loader(&grid_positions(2));
        let mut coordinator = coordinator();

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(
            session.missing_persistent,
            vec![Category::Player, Category::Camera, Category::Hud]
        );
        assert_eq!(registry.count(Category::Enemy), 2);
        assert_eq!(session.repositioned, 0);
    }

    #[test]
    fn persistent_entities_without_spawn_entries_return_to_previous_spawn() {
        let mut factory = TestFactory::new();
        let mut registry = EntityRegistry::default();
        let mut camera = factory.create("camera", Vec2::new(3.0, 4.0)).expect("camera");
        camera.position = Vec2::new(80.0, 80.0);
        let camera_id = registry.register(camera).expect("camera");
        let loader = map_two_loader(&[]);
        let mut coordinator = coordinator();

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(
            registry.get(camera_id).expect("camera").position,
            Vec2::new(3.0, 4.0)
        );
        assert_eq!(session.repositioned, 1);
        assert_eq!(session.empty_sections, vec![Category::Enemy]);
    }

    #[test]
    fn spawns_near_the_settled_player_are_excluded_when_configured() {
        let config = LifecycleConfig {
            spawn_exclusion_radius: Some(50.0),
            ..LifecycleConfig::default()
        };
        let (policy, options) = config.validate().expect("policy");
        let mut coordinator = ResetCoordinator::new(policy, options);
        let mut factory = TestFactory::new();
        let (mut registry, _) = populated_map_one(&mut factory);
        // The player moves from (50,50) to the map 2 spawn at (10,10) before
        // enemies are placed; distances count from (10,10).
        let loader = map_two_loader(&[
            Vec2::new(20.0, 20.0),
            Vec2::new(90.0, 60.0),
            Vec2::new(300.0, 300.0),
            Vec2::new(0.0, 0.0),
        ]);

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(session.excluded, 2);
        let enemies: Vec<Vec2> = registry
            .entities_of(Category::Enemy)
            .map(|enemy| enemy.position)
            .collect();
        assert_eq!(
            enemies,
            vec![Vec2::new(90.0, 60.0), Vec2::new(300.0, 300.0)]
        );
    }

    #[test]
    fn reissued_id_is_skipped_without_releasing_the_live_entity() {
        let mut factory = TestFactory::new();
        let (mut registry, player_id) = populated_map_one(&mut factory);
        let loader = map_two_loader(&[Vec2::new(200.0, 200.0), Vec2::new(300.0, 300.0)]);
        factory.reissue_next = Some(player_id);
        let mut coordinator = coordinator();

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(session.skipped.len(), 1);
        assert_eq!(session.skipped[0].entry_index, 0);
        assert_eq!(session.skipped[0].reason, SkipReason::DuplicateId);
        assert_eq!(session.teardown_failures, 0);
        assert!(!factory.torn_down.contains(&player_id));
        assert_eq!(
            registry.get(player_id).map(|player| player.category()),
            Ok(Category::Player)
        );
        assert_eq!(registry.count(Category::Enemy), 1);
    }

    #[test]
    fn factory_output_in_wrong_category_is_skipped_and_released() {
        let mut factory = TestFactory::new();
        let mut registry = EntityRegistry::default();
        let mut loader = map_two_loader(&[]);
        loader.set_section(
            MapId(2),
            Category::Chest,
            vec![
                SpawnEntry::new("chest.part", Vec2::new(1.0, 1.0)),
                SpawnEntry::new("zombie", Vec2::new(2.0, 2.0)),
            ],
        );
        let mut coordinator = coordinator();

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(registry.count(Category::Chest), 1);
        assert_eq!(registry.count(Category::Enemy), 0);
        assert_eq!(
            session.skipped[0].reason,
            SkipReason::CategoryMismatch {
                actual: Category::Enemy
            }
        );
        assert_eq!(factory.torn_down.len(), 1);
    }

    #[test]
    fn clear_only_policy_for_map_scoped_category_is_honoured() {
        let entries = LifecycleConfig::default().policies.into_iter().map(|entry| {
            if entry.category == Category::Chest {
                PolicyEntry::new(Category::Chest, ResetStrategy::ClearOnly)
            } else {
                entry
            }
        });
        let policy = LifecyclePolicy::from_entries(entries).expect("policy");
        let mut coordinator = ResetCoordinator::new(policy, ResetOptions::default());
        let mut factory = TestFactory::new();
        let (mut registry, _) = populated_map_one(&mut factory);
        let mut loader = map_two_loader(&grid_positions(1));
        loader.set_section(
            MapId(2),
            Category::Chest,
            vec![SpawnEntry::new("chest.part", Vec2::new(9.0, 9.0))],
        );

        coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");

        assert_eq!(registry.count(Category::Chest), 0);
    }

    #[test]
    fn diagnostics_handle_tracks_latest_session() {
        let mut factory = TestFactory::new();
        let (mut registry, _) = populated_map_one(&mut factory);
        let loader = map_two_loader(&grid_positions(6));
        let mut coordinator = coordinator();
        let diagnostics = coordinator.diagnostics();
        assert!(diagnostics.snapshot().is_none());

        let session = coordinator
            .perform_reset(MapId(2), &mut registry, &loader, &mut factory)
            .expect("reset");
        assert_eq!(diagnostics.snapshot().as_ref(), Some(&session));
        assert_eq!(coordinator.last_session(), Some(&session));

        let _ = coordinator.perform_reset(MapId(7), &mut registry, &loader, &mut factory);
        let latest = diagnostics.snapshot().expect("aborted session");
        assert_eq!(latest.phase, ResetPhase::Aborted);
        assert_eq!(latest.sequence, 1);
    }
}
