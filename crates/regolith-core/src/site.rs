//! Site map data: the base terrain a colony is founded on.
//!
//! A [`SiteMap`] is bitmap-derived content produced outside the simulation
//! core. It names the landing site and tileset, and carries one terrain index
//! layer per depth level plus the mine deposits seeded into the surface.
//! Snapshots reference a site by id and store only per-tile overrides, so the
//! same `SiteMap` must be supplied again when loading.

use crate::tile::{MineYield, Terrain};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while constructing or loading a site map.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("layer {layer} has {got} terrain indices, expected {expected}")]
    LayerSize {
        layer: usize,
        got: usize,
        expected: usize,
    },
    #[error("expected {expected} terrain layers, got {got}")]
    LayerCount { got: usize, expected: usize },
    #[error("unknown terrain index {0}")]
    UnknownTerrain(u8),
    #[error("mine at ({x}, {y}) is outside the {width}x{height} map")]
    MineOutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[cfg(feature = "data-loader")]
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// SiteMap
// ---------------------------------------------------------------------------

/// A mine deposit seeded into the site's surface layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineSeed {
    pub x: i32,
    pub y: i32,
    pub grade: MineYield,
}

/// Base terrain data for a landing site.
///
/// `layers[0]` is the surface; `layers[d]` is underground level `d`. Each
/// layer holds `width * height` terrain indices in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMap {
    pub id: String,
    pub tileset: String,
    pub width: i32,
    pub height: i32,
    pub max_depth: i32,
    layers: Vec<Vec<u8>>,
    mines: Vec<MineSeed>,
}

impl SiteMap {
    /// Build a site map, validating layer dimensions, terrain indices, and
    /// mine positions.
    pub fn new(
        id: impl Into<String>,
        tileset: impl Into<String>,
        width: i32,
        height: i32,
        max_depth: i32,
        layers: Vec<Vec<u8>>,
        mines: Vec<MineSeed>,
    ) -> Result<Self, SiteError> {
        let expected_layers = (max_depth + 1) as usize;
        if layers.len() != expected_layers {
            return Err(SiteError::LayerCount {
                got: layers.len(),
                expected: expected_layers,
            });
        }
        let expected = (width * height) as usize;
        for (i, layer) in layers.iter().enumerate() {
            if layer.len() != expected {
                return Err(SiteError::LayerSize {
                    layer: i,
                    got: layer.len(),
                    expected,
                });
            }
            for &index in layer {
                Terrain::from_index(index).ok_or(SiteError::UnknownTerrain(index))?;
            }
        }
        for mine in &mines {
            if mine.x < 0 || mine.x >= width || mine.y < 0 || mine.y >= height {
                return Err(SiteError::MineOutOfBounds {
                    x: mine.x,
                    y: mine.y,
                    width,
                    height,
                });
            }
        }
        Ok(Self {
            id: id.into(),
            tileset: tileset.into(),
            width,
            height,
            max_depth,
            layers,
            mines,
        })
    }

    /// Uniform-terrain site, useful for tests and generated maps.
    pub fn flat(
        id: impl Into<String>,
        width: i32,
        height: i32,
        max_depth: i32,
        surface: Terrain,
        underground: Terrain,
    ) -> Self {
        let cells = (width * height) as usize;
        let mut layers = vec![vec![surface.index(); cells]];
        for _ in 0..max_depth {
            layers.push(vec![underground.index(); cells]);
        }
        // Validation cannot fail for uniform layers.
        Self::new(id, "default", width, height, max_depth, layers, Vec::new())
            .expect("uniform site map is always valid")
    }

    /// Seed a mine deposit into the surface layer.
    pub fn with_mine(mut self, x: i32, y: i32, grade: MineYield) -> Self {
        self.mines.push(MineSeed { x, y, grade });
        self
    }

    /// Base terrain at a position, or `None` out of bounds.
    pub fn terrain(&self, x: i32, y: i32, depth: i32) -> Option<Terrain> {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return None;
        }
        let layer = self.layers.get(depth as usize)?;
        let index = layer[(y * self.width + x) as usize];
        Terrain::from_index(index)
    }

    /// Mine deposits seeded into the surface.
    pub fn mines(&self) -> &[MineSeed] {
        &self.mines
    }
}

// ---------------------------------------------------------------------------
// JSON loading (data-loader feature)
// ---------------------------------------------------------------------------

/// Parse a site map from JSON site data.
#[cfg(feature = "data-loader")]
pub fn site_from_json(json: &str) -> Result<SiteMap, SiteError> {
    #[derive(serde::Deserialize)]
    struct SiteData {
        id: String,
        tileset: String,
        width: i32,
        height: i32,
        max_depth: i32,
        layers: Vec<Vec<u8>>,
        #[serde(default)]
        mines: Vec<MineSeed>,
    }

    let data: SiteData = serde_json::from_str(json)?;
    SiteMap::new(
        data.id,
        data.tileset,
        data.width,
        data.height,
        data.max_depth,
        data.layers,
        data.mines,
    )
}
