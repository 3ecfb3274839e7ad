mod compiler;
mod database;
mod factory;
mod tiled;
mod walls;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{DefDatabase, EntityArchetype, EntityDefId, DEFAULT_INTERACTION_RADIUS};
pub use factory::DefEntityFactory;
pub use tiled::{
    parse_tmx, MapParseError, TiledMap, TiledMapLoader, CAMERA_TYPE, TILE_SCALING, WALL_LAYER,
};
pub use walls::{WallGrid, WallGridError};
