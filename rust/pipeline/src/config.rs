// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration
//!
//! Every tunable lives in [`PipelineConfig`]. Defaults reproduce the
//! reference dimensions (4.0 walls, 0.25 thickness, 0.2 slabs, 2.2 doors,
//! 1.2 windows sitting at 1.0). Values can come from a JSON file, from
//! `PLAN3D_*` environment variables, or be set in code.

use crate::error::{Error, Result, Stage};
use crate::layers::{has_marker, strings, KeywordTable};
use crate::material::MaterialAssets;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Layer keyword lists
    pub keywords: KeywordTable,
    /// Layer markers used by thickness, height and material rules
    pub markers: MarkerConfig,
    /// Floor polygons must be strictly larger than this
    pub min_floor_area: f64,
    /// Inferred rooms must be strictly larger than this
    pub min_room_area: f64,
    /// Distance under which wall endpoints are merged when detecting rooms
    pub snap_tolerance: f64,
    pub thickness: ThicknessTable,
    /// Door cutters are this factor times the thickest wall
    pub door_clearance: f64,
    /// Walls thinner than this are gypsum partitions
    pub partition_threshold: f64,
    pub heights: HeightTable,
    pub slab: SlabConfig,
    pub openings: OpeningConfig,
    /// Elevation of the storey
    pub z_offset: f64,
    /// Classify walls on the rayon pool
    pub parallel: bool,
    pub materials: MaterialAssets,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keywords: KeywordTable::default(),
            markers: MarkerConfig::default(),
            min_floor_area: 5.0,
            min_room_area: 5.0,
            snap_tolerance: 1e-3,
            thickness: ThicknessTable::default(),
            door_clearance: 1.2,
            partition_threshold: 0.15,
            heights: HeightTable::default(),
            slab: SlabConfig::default(),
            openings: OpeningConfig::default(),
            z_offset: 0.0,
            parallel: true,
            materials: MaterialAssets::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(Error::io(Stage::Setup, path))?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `PLAN3D_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    ///
    /// Unparseable values are ignored and the default is kept; parsed values
    /// are validated like a configuration file.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let num = |key: &str, default: f64| -> f64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let config = Self {
            min_floor_area: num("PLAN3D_MIN_FLOOR_AREA", defaults.min_floor_area),
            min_room_area: num("PLAN3D_MIN_ROOM_AREA", defaults.min_room_area),
            snap_tolerance: num("PLAN3D_SNAP_TOLERANCE", defaults.snap_tolerance),
            thickness: ThicknessTable {
                default: num("PLAN3D_WALL_THICKNESS", defaults.thickness.default),
                ..defaults.thickness.clone()
            },
            door_clearance: num("PLAN3D_DOOR_CLEARANCE", defaults.door_clearance),
            partition_threshold: num("PLAN3D_PARTITION_THRESHOLD", defaults.partition_threshold),
            heights: HeightTable {
                default: num("PLAN3D_WALL_HEIGHT", defaults.heights.default),
                ..defaults.heights.clone()
            },
            z_offset: num("PLAN3D_Z_OFFSET", defaults.z_offset),
            parallel: lookup("PLAN3D_PARALLEL")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.parallel),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no floor plan can be built with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("snap_tolerance", self.snap_tolerance),
            ("thickness.default", self.thickness.default),
            ("thickness.partition", self.thickness.partition),
            ("thickness.exterior", self.thickness.exterior),
            ("door_clearance", self.door_clearance),
            ("heights.default", self.heights.default),
            ("slab.thickness", self.slab.thickness),
            ("openings.door_height", self.openings.door_height),
            ("openings.window_height", self.openings.window_height),
            ("openings.panel_thickness", self.openings.panel_thickness),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(Error::Config(format!("{name} must be positive, got {value}")));
            }
        }

        let non_negative = [
            ("min_floor_area", self.min_floor_area),
            ("min_room_area", self.min_room_area),
            ("partition_threshold", self.partition_threshold),
            ("slab.offset", self.slab.offset),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(Error::Config(format!(
                    "{name} must be zero or positive, got {value}"
                )));
            }
        }

        if let Some(rule) = self.heights.rules.iter().find(|r| !(r.height > 0.0)) {
            return Err(Error::Config(format!(
                "height for marker '{}' must be positive",
                rule.marker
            )));
        }
        if !self.z_offset.is_finite() {
            return Err(Error::Config("z_offset must be finite".to_string()));
        }
        Ok(())
    }
}

/// Layer-name markers (matched case-insensitively by substring)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarkerConfig {
    pub glazing: Vec<String>,
    pub exterior: Vec<String>,
    pub partition: Vec<String>,
    pub bathroom: Vec<String>,
    pub kitchen: Vec<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            glazing: strings(&["glaz", "glass", "window", "a-win"]),
            exterior: strings(&["-ext", "_ext", "exterior", "facade"]),
            partition: strings(&["partition", "a-part"]),
            bathroom: strings(&["bath", "wc", "toilet", "shower"]),
            kitchen: strings(&["kitchen", "kit", "galley"]),
        }
    }
}

/// Wall thickness by layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThicknessTable {
    pub default: f64,
    pub partition: f64,
    pub exterior: f64,
}

impl Default for ThicknessTable {
    fn default() -> Self {
        Self {
            default: 0.25,
            partition: 0.10,
            exterior: 0.30,
        }
    }
}

impl ThicknessTable {
    /// Exterior markers win over partition markers
    pub fn resolve(&self, layer: &str, markers: &MarkerConfig) -> f64 {
        if has_marker(layer, &markers.exterior) {
            self.exterior
        } else if has_marker(layer, &markers.partition) {
            self.partition
        } else {
            self.default
        }
    }

    /// Largest thickness any wall can get
    pub fn max(&self) -> f64 {
        self.default.max(self.partition).max(self.exterior)
    }
}

/// One marker to height entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeightRule {
    pub marker: String,
    pub height: f64,
}

/// Wall height by layer marker, first matching rule wins
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeightTable {
    pub rules: Vec<HeightRule>,
    pub default: f64,
}

impl Default for HeightTable {
    fn default() -> Self {
        let rule = |marker: &str, height| HeightRule {
            marker: marker.to_string(),
            height,
        };
        Self {
            rules: vec![
                rule("full", 4.0),
                rule("half", 1.2),
                rule("partition", 3.0),
                rule("head", 2.2),
            ],
            default: 4.0,
        }
    }
}

impl HeightTable {
    pub fn resolve(&self, layer: &str) -> f64 {
        let layer = layer.to_lowercase();
        self.rules
            .iter()
            .find(|r| !r.marker.is_empty() && layer.contains(&r.marker.to_lowercase()))
            .map(|r| r.height)
            .unwrap_or(self.default)
    }
}

/// Floor and room slabs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlabConfig {
    pub thickness: f64,
    /// Lift above the storey elevation; rooms sit one more step higher
    pub offset: f64,
}

impl Default for SlabConfig {
    fn default() -> Self {
        Self {
            thickness: 0.2,
            offset: 0.001,
        }
    }
}

/// Decorative door and window panels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpeningConfig {
    pub door_base: f64,
    pub door_height: f64,
    pub window_base: f64,
    pub window_height: f64,
    /// Panel depth across the opening
    pub panel_thickness: f64,
}

impl Default for OpeningConfig {
    fn default() -> Self {
        Self {
            door_base: 0.0,
            door_height: 2.2,
            window_base: 1.0,
            window_height: 1.2,
            panel_thickness: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_floor_area, 5.0);
        assert_eq!(config.thickness.default, 0.25);
    }

    #[test]
    fn test_height_table() {
        let heights = HeightTable::default();
        assert_eq!(heights.resolve("A-WALL-HALF"), 1.2);
        assert_eq!(heights.resolve("A-WALL-Partition"), 3.0);
        assert_eq!(heights.resolve("A-WALL-HEAD"), 2.2);
        assert_eq!(heights.resolve("A-WALL"), 4.0);
    }

    #[test]
    fn test_thickness_table() {
        let table = ThicknessTable::default();
        let markers = MarkerConfig::default();
        assert_eq!(table.resolve("A-WALL-EXT", &markers), 0.30);
        assert_eq!(table.resolve("A-PART", &markers), 0.10);
        assert_eq!(table.resolve("A-WALL", &markers), 0.25);
        assert_eq!(table.max(), 0.30);
    }

    #[test]
    fn test_exterior_marker_needs_a_delimiter() {
        let table = ThicknessTable::default();
        let markers = MarkerConfig::default();
        assert_eq!(table.resolve("A-WALL-EXT", &markers), 0.30);
        assert_eq!(table.resolve("WALL_EXT", &markers), 0.30);
        assert_eq!(table.resolve("Exterior Wall", &markers), 0.30);
        assert_eq!(table.resolve("A-WALL-TEXT", &markers), 0.25);
        assert_eq!(table.resolve("NEXT-WALL", &markers), 0.25);
        assert!(!has_marker("A-WALL-TEXT", &markers.exterior));
    }

    #[test]
    fn test_from_vars_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PLAN3D_MIN_FLOOR_AREA", "2.5"),
            ("PLAN3D_WALL_HEIGHT", "3.1"),
            ("PLAN3D_PARALLEL", "false"),
            ("PLAN3D_SNAP_TOLERANCE", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let config = PipelineConfig::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.min_floor_area, 2.5);
        assert_eq!(config.heights.default, 3.1);
        assert!(!config.parallel);
        assert_eq!(config.snap_tolerance, 1e-3);
        // Untouched sections keep defaults
        assert_eq!(config.heights.rules.len(), 4);
    }

    #[test]
    fn test_from_vars_rejects_zero_wall_height() {
        let err = PipelineConfig::from_vars(|k| {
            (k == "PLAN3D_WALL_HEIGHT").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.stage(), Stage::Setup);
        assert!(err.to_string().contains("heights.default"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"min_floor_area": 1.0, "slab": {"thickness": 0.3}}"#)
                .unwrap();
        assert_eq!(config.min_floor_area, 1.0);
        assert_eq!(config.slab.thickness, 0.3);
        assert_eq!(config.slab.offset, 0.001);
        assert_eq!(config.door_clearance, 1.2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = PipelineConfig {
            door_clearance: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = PipelineConfig {
            min_room_area: f64::NAN,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
