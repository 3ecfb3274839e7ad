use thiserror::Error;

/// Collision layer of a Tiled map, in Tiled pixel space.
///
/// Row 0 is the top row, matching the TMX data order. A tile id of 0 is
/// empty; any other id is solid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    tiles: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WallGridError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("tile size must be non-zero, got {tile_width}x{tile_height}")]
    ZeroTileSize { tile_width: u32, tile_height: u32 },
}

impl WallGrid {
    pub fn new(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        tiles: Vec<u32>,
    ) -> Result<Self, WallGridError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(WallGridError::ZeroTileSize {
                tile_width,
                tile_height,
            });
        }
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(WallGridError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles,
        })
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u32> {
        self.index_of(x, y)
            .and_then(|index| self.tiles.get(index).copied())
    }

    /// `None` when the pixel lies outside the map.
    pub fn is_solid_at_pixel(&self, px: f32, py: f32) -> Option<bool> {
        if !px.is_finite() || !py.is_finite() || px < 0.0 || py < 0.0 {
            return None;
        }
        let column = (px / self.tile_width as f32).floor() as u32;
        let row = (py / self.tile_height as f32).floor() as u32;
        self.tile_at(column, row).map(|tile| tile != 0)
    }

    pub fn solid_count(&self) -> usize {
        self.tiles.iter().filter(|tile| **tile != 0).count()
    }
}
