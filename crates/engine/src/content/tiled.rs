use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::lifecycle::{MapId, MapLoadError, MapLoader, SpawnEntry, SpawnSpec};
use crate::world::{Category, Vec2};

use super::walls::{WallGrid, WallGridError};

/// World units per Tiled pixel.
pub const TILE_SCALING: f32 = 2.0;
pub const WALL_LAYER: &str = "Walls";
pub const CAMERA_TYPE: &str = "camera";

const OLD_CAR_LAYER: &str = "Old-car";
const ZOMBIE_LAYER: &str = "Zombie-spawns";

/// Object layer name -> (category, default entity type).
const OBJECT_LAYERS: [(&str, Category, &str); 6] = [
    ("Player-spawn", Category::Player, "player"),
    (ZOMBIE_LAYER, Category::Enemy, "zombie"),
    (OLD_CAR_LAYER, Category::Car, "car.old"),
    ("New-car", Category::Car, "car.new"),
    ("Chest-parts", Category::Chest, "chest.part"),
    ("Chest-noparts", Category::Chest, "chest.empty"),
];

// Tiled stores flip/rotation flags in the top bits of each gid.
const GID_MASK: u32 = 0x1FFF_FFFF;

#[derive(Debug, Error)]
pub enum MapParseError {
    #[error("failed to read map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed TMX in {path} at line {line}, column {column}: {message}")]
    Xml {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
    #[error("{path}: root element must be <map>")]
    InvalidRoot { path: PathBuf },
    #[error("{path}:{line}: <{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        path: PathBuf,
        line: u32,
        element: String,
        attribute: &'static str,
    },
    #[error("{path}:{line}: attribute '{attribute}' on <{element}> has invalid value '{value}'")]
    InvalidAttribute {
        path: PathBuf,
        line: u32,
        element: String,
        attribute: &'static str,
        value: String,
    },
    #[error("{path}: layer '{layer}' uses encoding '{encoding}'; only csv is supported")]
    UnsupportedEncoding {
        path: PathBuf,
        layer: String,
        encoding: String,
    },
    #[error("{path}: layer '{layer}' has no <data> element")]
    MissingData { path: PathBuf, layer: String },
    #[error("{path}: layer '{layer}' contains invalid tile id '{value}'")]
    InvalidTile {
        path: PathBuf,
        layer: String,
        value: String,
    },
    #[error("{path}: layer '{layer}' is not a valid wall grid: {source}")]
    Walls {
        path: PathBuf,
        layer: String,
        #[source]
        source: WallGridError,
    },
    #[error("no map files named map<N>.tmx in {dir}")]
    NoMaps { dir: PathBuf },
}

/// Spawn data extracted from one `.tmx` file, already in world units.
#[derive(Debug, Clone)]
pub struct TiledMap {
    pub map: MapId,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub walls: Option<WallGrid>,
    pub rejected_spawns: usize,
    pixel_width: u32,
    pixel_height: u32,
    sections: BTreeMap<Category, Vec<SpawnEntry>>,
}

impl TiledMap {
    pub fn section(&self, category: Category) -> &[SpawnEntry] {
        self.sections
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn pixel_height(&self) -> f32 {
        self.pixel_height as f32
    }

    pub fn pixel_to_world(&self, px: f32, py: f32) -> Vec2 {
        Vec2::new(px * TILE_SCALING, (self.pixel_height() - py) * TILE_SCALING)
    }

    fn contains_pixel(&self, px: f32, py: f32) -> bool {
        (0.0..self.pixel_width as f32).contains(&px) && (0.0..self.pixel_height()).contains(&py)
    }

    /// Spawn points must land on open floor inside the map.
    fn spawn_point_is_open(&self, px: f32, py: f32) -> bool {
        match &self.walls {
            Some(walls) => walls.is_solid_at_pixel(px, py) == Some(false),
            None => self.contains_pixel(px, py),
        }
    }
}

pub fn parse_tmx(map: MapId, path: &Path, raw: &str) -> Result<TiledMap, MapParseError> {
    let doc = Document::parse(raw).map_err(|error| MapParseError::Xml {
        path: path.to_path_buf(),
        line: error.pos().row,
        column: error.pos().col,
        message: error.to_string(),
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(MapParseError::InvalidRoot {
            path: path.to_path_buf(),
        });
    }

    let width = attr_parsed(path, &doc, root, "width")?;
    let height = attr_parsed(path, &doc, root, "height")?;
    let tile_width = attr_parsed(path, &doc, root, "tilewidth")?;
    let tile_height = attr_parsed(path, &doc, root, "tileheight")?;
    let mut parsed = TiledMap {
        map,
        width,
        height,
        tile_width,
        tile_height,
        walls: None,
        rejected_spawns: 0,
        pixel_width: pixel_extent(path, &doc, root, "width", width, tile_width)?,
        pixel_height: pixel_extent(path, &doc, root, "height", height, tile_height)?,
        sections: BTreeMap::new(),
    };

    for layer in root.children().filter(|node| node.has_tag_name("layer")) {
        if layer.attribute("name") == Some(WALL_LAYER) {
            parsed.walls = Some(parse_wall_layer(path, &doc, layer, &parsed)?);
        }
    }

    let mut old_car_pixels = Vec::<(f32, f32)>::new();
    for group in root.children().filter(|node| node.has_tag_name("objectgroup")) {
        let layer_name = group.attribute("name").unwrap_or_default();
        let Some((_, category, default_type)) = OBJECT_LAYERS
            .iter()
            .find(|(name, _, _)| *name == layer_name)
        else {
            debug!(map = %map, layer = layer_name, "object_layer_ignored");
            continue;
        };

        for object in group.children().filter(|node| node.has_tag_name("object")) {
            let (px, py) = object_center(path, &doc, object)?;
            if layer_name == ZOMBIE_LAYER && !parsed.spawn_point_is_open(px, py) {
                parsed.rejected_spawns += 1;
                warn!(map = %map, x = px, y = py, "zombie_spawn_rejected");
                continue;
            }
            if layer_name == OLD_CAR_LAYER {
                old_car_pixels.push((px, py));
            }
            let entity_type = object
                .attribute("type")
                .or_else(|| object.attribute("class"))
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(*default_type);
            let entry = SpawnEntry::new(entity_type, parsed.pixel_to_world(px, py));
            parsed.sections.entry(*category).or_default().push(entry);
        }
    }

    if parsed.section(Category::Player).is_empty() {
        if let Some((px, py)) = old_car_pixels.first().copied() {
            let entry = SpawnEntry::new("player", parsed.pixel_to_world(px, py));
            parsed.sections.insert(Category::Player, vec![entry]);
        }
    }
    let player_spawn = parsed
        .section(Category::Player)
        .first()
        .map(|entry| entry.position);
    if let Some(position) = player_spawn {
        let camera = SpawnEntry::new(CAMERA_TYPE, position);
        parsed.sections.insert(Category::Camera, vec![camera]);
    }

    Ok(parsed)
}

fn parse_wall_layer(
    path: &Path,
    doc: &Document<'_>,
    layer: Node<'_, '_>,
    map: &TiledMap,
) -> Result<WallGrid, MapParseError> {
    let layer_name = WALL_LAYER.to_string();
    let data = layer
        .children()
        .find(|node| node.has_tag_name("data"))
        .ok_or_else(|| MapParseError::MissingData {
            path: path.to_path_buf(),
            layer: layer_name.clone(),
        })?;
    let encoding = data.attribute("encoding").unwrap_or("xml");
    if encoding != "csv" {
        return Err(MapParseError::UnsupportedEncoding {
            path: path.to_path_buf(),
            layer: layer_name,
            encoding: encoding.to_string(),
        });
    }

    let width = match layer.attribute("width") {
        Some(_) => attr_parsed(path, doc, layer, "width")?,
        None => map.width,
    };
    let height = match layer.attribute("height") {
        Some(_) => attr_parsed(path, doc, layer, "height")?,
        None => map.height,
    };

    let mut tiles = Vec::new();
    for raw in data
        .text()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        let gid = raw.parse::<u32>().map_err(|_| MapParseError::InvalidTile {
            path: path.to_path_buf(),
            layer: layer_name.clone(),
            value: raw.to_string(),
        })?;
        tiles.push(gid & GID_MASK);
    }

    WallGrid::new(width, height, map.tile_width, map.tile_height, tiles).map_err(|source| {
        MapParseError::Walls {
            path: path.to_path_buf(),
            layer: layer_name,
            source,
        }
    })
}

/// Point objects use their position; rectangles use their centre.
fn object_center(
    path: &Path,
    doc: &Document<'_>,
    object: Node<'_, '_>,
) -> Result<(f32, f32), MapParseError> {
    let x: f32 = attr_parsed(path, doc, object, "x")?;
    let y: f32 = attr_parsed(path, doc, object, "y")?;
    let width: f32 = optional_attr(path, doc, object, "width")?.unwrap_or(0.0);
    let height: f32 = optional_attr(path, doc, object, "height")?.unwrap_or(0.0);
    Ok((x + width / 2.0, y + height / 2.0))
}

fn attr_parsed<T: std::str::FromStr>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &'static str,
) -> Result<T, MapParseError> {
    optional_attr(path, doc, node, attribute)?.ok_or_else(|| MapParseError::MissingAttribute {
        path: path.to_path_buf(),
        line: line_of(doc, node),
        element: node.tag_name().name().to_string(),
        attribute,
    })
}

fn optional_attr<T: std::str::FromStr>(
    path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    attribute: &'static str,
) -> Result<Option<T>, MapParseError> {
    let Some(raw) = node.attribute(attribute) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| MapParseError::InvalidAttribute {
            path: path.to_path_buf(),
            line: line_of(doc, node),
            element: node.tag_name().name().to_string(),
            attribute,
            value: raw.to_string(),
        })
}

/// Map size in pixels along one axis; rejects sizes that overflow `u32`.
fn pixel_extent(
    path: &Path,
    doc: &Document<'_>,
    root: Node<'_, '_>,
    attribute: &'static str,
    tiles: u32,
    tile_size: u32,
) -> Result<u32, MapParseError> {
    tiles
        .checked_mul(tile_size)
        .ok_or_else(|| MapParseError::InvalidAttribute {
            path: path.to_path_buf(),
            line: line_of(doc, root),
            element: root.tag_name().name().to_string(),
            attribute,
            value: tiles.to_string(),
        })
}

fn line_of(doc: &Document<'_>, node: Node<'_, '_>) -> u32 {
    doc.text_pos_at(node.range().start).row
}

/// `map3.tmx` -> `MapId(3)`.
fn map_id_from_path(path: &Path) -> Option<MapId> {
    let is_tmx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tmx"));
    if !is_tmx {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let number = stem.strip_prefix("map")?;
    if number.is_empty() || !number.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    number.parse::<u32>().ok().map(MapId)
}

/// Every map of the game, parsed once at startup.
#[derive(Debug, Clone, Default)]
pub struct TiledMapLoader {
    maps: BTreeMap<MapId, TiledMap>,
}

impl TiledMapLoader {
    pub fn load_dir(dir: &Path) -> Result<Self, MapParseError> {
        let entries = fs::read_dir(dir).map_err(|source| MapParseError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files = BTreeMap::<MapId, PathBuf>::new();
        for entry in entries {
            let entry = entry.map_err(|source| MapParseError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            match map_id_from_path(&path) {
                Some(map) => {
                    files.insert(map, path);
                }
                None => debug!(path = %path.display(), "map_file_ignored"),
            }
        }
        if files.is_empty() {
            return Err(MapParseError::NoMaps {
                dir: dir.to_path_buf(),
            });
        }

        let mut loader = Self::default();
        for (map, path) in files {
            let raw = fs::read_to_string(&path).map_err(|source| MapParseError::Read {
                path: path.clone(),
                source,
            })?;
            let parsed = parse_tmx(map, &path, &raw)?;
            info!(
                map = %map,
                enemies = parsed.section(Category::Enemy).len(),
                cars = parsed.section(Category::Car).len(),
                chests = parsed.section(Category::Chest).len(),
                rejected_spawns = parsed.rejected_spawns,
                walls = parsed.walls.as_ref().map_or(0, WallGrid::solid_count),
                "map_loaded"
            );
            loader.insert(parsed);
        }
        Ok(loader)
    }

    pub fn insert(&mut self, map: TiledMap) {
        self.maps.insert(map.map, map);
    }

    pub fn map(&self, id: MapId) -> Option<&TiledMap> {
        self.maps.get(&id)
    }

    pub fn map_ids(&self) -> impl Iterator<Item = MapId> + '_ {
        self.maps.keys().copied()
    }
}

impl MapLoader for TiledMapLoader {
    fn spawn_spec(&self, map: MapId, category: Category) -> Result<SpawnSpec, MapLoadError> {
        let parsed = self
            .maps
            .get(&map)
            .ok_or(MapLoadError::MapNotFound { map })?;
        Ok(SpawnSpec {
            map,
            category,
            entries: parsed.section(category).to_vec(),
        })
    }
}
