mod collaborators;
mod coordinator;
mod policy;
mod session;

pub use collaborators::{
    EntityFactory, FactoryError, MapId, MapLoadError, MapLoader, SpawnEntry, SpawnSpec,
    StaticMapLoader, TeardownError,
};
pub use coordinator::{ResetAborted, ResetCoordinator};
pub use policy::{
    ConfigError, LifecycleConfig, LifecyclePolicy, PolicyEntry, ResetOptions, ResetStrategy,
};
pub use session::{
    DiagnosticsHandle, ResetCounts, ResetPhase, ResetSession, SkipReason, SkippedSpawn,
};
