use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod content;
pub mod lifecycle;
pub mod world;

pub use content::{
    compile_def_database, parse_tmx, ContentCompileError, ContentErrorCode, DefDatabase,
    DefEntityFactory, EntityArchetype, EntityDefId, MapParseError, SourceLocation, TiledMap,
    TiledMapLoader, WallGrid, WallGridError, CAMERA_TYPE, TILE_SCALING,
};
pub use lifecycle::{
    ConfigError, DiagnosticsHandle, EntityFactory, FactoryError, LifecycleConfig,
    LifecyclePolicy, MapId, MapLoadError, MapLoader, PolicyEntry, ResetAborted,
    ResetCoordinator, ResetCounts, ResetOptions, ResetPhase, ResetSession, ResetStrategy,
    SkipReason, SkippedSpawn, SpawnEntry, SpawnSpec, StaticMapLoader, TeardownError,
};
pub use world::{
    Category, CategoryCounts, Entity, EntityId, EntityIdAllocator, EntityRegistry, Health,
    Interactable, InteractableKind, RegistryError, Scope, Vec2,
};

pub const ROOT_ENV_VAR: &str = "SCRAPYARD_ROOT";
pub const LIFECYCLE_CONFIG_FILE: &str = "lifecycle.json";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub defs_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub config_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    pub fn lifecycle_config(&self) -> PathBuf {
        self.config_dir.join(LIFECYCLE_CONFIG_FILE)
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{var} is not valid unicode: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("executable {0} has no parent directory")]
    ExeHasNoParent(PathBuf),
    #[error("cannot create cache directory {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "{var}={path} is not a project root (needs Cargo.toml plus crates/ or assets/)"
    )]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error(
        "no project root above {start_dir} (needs Cargo.toml plus crates/ or assets/); \
set {var} to the checkout, e.g. export {var}=\"/path/to/scrapyard\""
    )]
    RootNotFound { start_dir: PathBuf, var: &'static str },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match root_from_env()? {
        Some(root) => root,
        None => root_above_executable()?,
    };
    app_paths_for_root(root)
}

/// Derives the asset and cache layout under `root`, creating the cache dir.
pub fn app_paths_for_root(root: PathBuf) -> Result<AppPaths, StartupError> {
    let assets = root.join("assets");
    let cache_dir = root.join("cache");
    fs::create_dir_all(&cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: cache_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        defs_dir: assets.join("defs"),
        maps_dir: assets.join("maps"),
        config_dir: assets.join("config"),
        cache_dir,
        root,
    })
}

/// `Ok(None)` when the override is unset.
fn root_from_env() -> Result<Option<PathBuf>, StartupError> {
    let raw = match env::var(ROOT_ENV_VAR) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return Ok(None),
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };
    let root = canonical_or_raw(Path::new(&raw));
    if !is_repo_marker(&root) {
        return Err(StartupError::InvalidEnvRoot {
            var: ROOT_ENV_VAR,
            path: root,
        });
    }
    Ok(Some(root))
}

fn root_above_executable() -> Result<PathBuf, StartupError> {
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let Some(exe_dir) = exe.parent() else {
        return Err(StartupError::ExeHasNoParent(exe.clone()));
    };
    exe_dir
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(canonical_or_raw)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: canonical_or_raw(exe_dir),
            var: ROOT_ENV_VAR,
        })
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file()
        && (path.join("crates").is_dir() || path.join("assets").is_dir())
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir_all(temp.path().join("assets")).expect("assets");
        assert!(!is_repo_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("toml");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn app_paths_follow_asset_layout_and_create_cache() {
        let temp = TempDir::new().expect("temp");
        let paths = app_paths_for_root(temp.path().to_path_buf()).expect("paths");
        assert!(paths.defs_dir.ends_with(Path::new("assets").join("defs")));
        assert!(paths.maps_dir.ends_with(Path::new("assets").join("maps")));
        assert_eq!(
            paths.lifecycle_config(),
            temp.path().join("assets").join("config").join("lifecycle.json")
        );
        assert!(paths.cache_dir.is_dir());
    }
}
