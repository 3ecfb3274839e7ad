use scrapyard_engine::{
    compile_def_database, resolve_app_paths, AppPaths, ConfigError, ContentCompileError,
    DefEntityFactory, LifecycleConfig, MapId, MapParseError, ResetCoordinator, StartupError,
    TiledMapLoader,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::session::{GameSession, SessionConfig, SessionError};

const START_MAP_ENV_VAR: &str = "SCRAPYARD_START_MAP";
const REQUIRED_PARTS_ENV_VAR: &str = "SCRAPYARD_REQUIRED_PARTS";
const DEFAULT_START_MAP: MapId = MapId(1);
const DEFAULT_REQUIRED_PARTS: u32 = 3;

pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) session: GameSession,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Paths(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("entity defs: {0}")]
    Defs(#[from] ContentCompileError),
    #[error("maps: {0}")]
    Maps(#[from] MapParseError),
    #[error("session: {0}")]
    Session(#[from] SessionError),
    #[error("{var}='{value}' is invalid; expected {expected}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("start map {map} has no {map}.tmx in the maps directory")]
    StartMapMissing { map: MapId },
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Scrapyard Startup ===");

    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), "paths_resolved");

    let config_path = paths.lifecycle_config();
    let (policy, options) =
        LifecycleConfig::load_or_default(&config_path).and_then(LifecycleConfig::validate)?;
    info!(
        config = %config_path.display(),
        spawn_exclusion_radius = ?options.spawn_exclusion_radius(),
        "lifecycle_policy_loaded"
    );

    let defs = compile_def_database(&paths.defs_dir)?;
    info!(def_count = defs.entity_defs().len(), "defs_compiled");

    let loader = TiledMapLoader::load_dir(&paths.maps_dir)?;
    let start_map = parse_start_map(std::env::var(START_MAP_ENV_VAR).ok().as_deref())?;
    let required_parts =
        parse_required_parts(std::env::var(REQUIRED_PARTS_ENV_VAR).ok().as_deref())?;
    let last_map = loader.map_ids().max().unwrap_or(start_map);
    if loader.map(start_map).is_none() {
        return Err(BootstrapError::StartMapMissing { map: start_map });
    }
    info!(
        start_map = %start_map,
        last_map = %last_map,
        required_parts,
        "session_configured"
    );

    let session = GameSession::new(
        ResetCoordinator::new(policy, options),
        Box::new(loader),
        Box::new(DefEntityFactory::new(defs)),
        SessionConfig {
            start_map,
            last_map,
            required_parts,
        },
    )?;

    Ok(AppWiring { paths, session })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_start_map(raw: Option<&str>) -> Result<MapId, BootstrapError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_START_MAP),
        Some(value) => value
            .parse::<u32>()
            .ok()
            .filter(|number| *number > 0)
            .map(MapId)
            .ok_or_else(|| BootstrapError::InvalidEnv {
                var: START_MAP_ENV_VAR,
                value: value.to_string(),
                expected: "a map number >= 1",
            }),
    }
}

fn parse_required_parts(raw: Option<&str>) -> Result<u32, BootstrapError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_REQUIRED_PARTS),
        Some(value) => value.parse::<u32>().map_err(|_| BootstrapError::InvalidEnv {
            var: REQUIRED_PARTS_ENV_VAR,
            value: value.to_string(),
            expected: "a non-negative integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_map_defaults_and_validates() {
        assert_eq!(parse_start_map(None).expect("default"), MapId(1));
        assert_eq!(parse_start_map(Some("  ")).expect("blank"), MapId(1));
        assert_eq!(parse_start_map(Some(" 3 ")).expect("three"), MapId(3));
        assert!(matches!(
            parse_start_map(Some("0")),
            Err(BootstrapError::InvalidEnv {
                var: START_MAP_ENV_VAR,
                ..
            })
        ));
        assert!(parse_start_map(Some("map2")).is_err());
    }

    #[test]
    fn required_parts_defaults_to_three() {
        assert_eq!(parse_required_parts(None).expect("default"), 3);
        assert_eq!(parse_required_parts(Some("0")).expect("zero"), 0);
        let err = parse_required_parts(Some("-1")).expect_err("negative");
        assert!(err.to_string().contains(REQUIRED_PARTS_ENV_VAR));
    }

    #[test]
    fn wrapped_errors_keep_their_source() {
        use std::error::Error as _;

        use scrapyard_engine::FactoryError;

        let session = SessionError::from(FactoryError::UnknownType {
            entity_type: "player".to_string(),
        });
        assert_eq!(session.to_string(), "factory: unknown entity type 'player'");

        let err = BootstrapError::from(session);
        assert_eq!(
            err.to_string(),
            "session: factory: unknown entity type 'player'"
        );
        let source = err.source().expect("session source");
        assert!(source.source().is_some());
    }
}
