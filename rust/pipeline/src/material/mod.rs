// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Material classification
//!
//! A fixed rule pass decides most elements from architectural facts (glazing
//! layers, exterior walls, wet rooms, thin partitions). Whatever the rules
//! leave open goes to a learned gradient-boosted tree model. The model sees
//! only the fixed-width numeric [`FeatureVector`] block and can only answer
//! with one of the closed [`MaterialLabel`] set.

mod classifier;
mod features;
mod library;
mod model;
mod rules;

pub use classifier::{ClassifierContext, DecisionSource, MaterialClassifier, MaterialDecision};
pub use features::{Adjacency, FeatureExtractor, FeatureVector, Orientation};
pub use library::{MaterialLibrary, RenderMaterial, Texture};
pub use model::{
    ClassifierArtifact, GradientBoostedTrees, LabelEncoder, MaterialModel, ModelError, Tree,
    TreeNode, FEATURE_COUNT, FEATURE_NAMES, FEATURE_SCHEMA_VERSION,
};
pub use rules::apply_rules;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Version of the closed label set; bump when a label is added or removed
pub const LABEL_SET_VERSION: u32 = 1;

/// Construction material
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MaterialLabel {
    /// Also the safe fallback when no rule or model decides
    #[default]
    Concrete,
    Gypsum,
    Tile,
    Glass,
    Wood,
    Marble,
}

impl MaterialLabel {
    pub const ALL: [MaterialLabel; 6] = [
        MaterialLabel::Concrete,
        MaterialLabel::Gypsum,
        MaterialLabel::Tile,
        MaterialLabel::Glass,
        MaterialLabel::Wood,
        MaterialLabel::Marble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialLabel::Concrete => "concrete",
            MaterialLabel::Gypsum => "gypsum",
            MaterialLabel::Tile => "tile",
            MaterialLabel::Glass => "glass",
            MaterialLabel::Wood => "wood",
            MaterialLabel::Marble => "marble",
        }
    }
}

impl fmt::Display for MaterialLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaterialLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        MaterialLabel::ALL
            .into_iter()
            .find(|l| l.as_str() == needle)
            .ok_or_else(|| format!("unknown material label '{s}'"))
    }
}

/// Texture and colour for one label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialAsset {
    pub label: MaterialLabel,
    /// Relative to [`MaterialAssets::texture_dir`] unless absolute
    pub texture: PathBuf,
    /// Linear RGBA
    pub base_color: [f32; 4],
}

/// Mapping from label to render assets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaterialAssets {
    pub texture_dir: PathBuf,
    pub entries: Vec<MaterialAsset>,
}

impl Default for MaterialAssets {
    fn default() -> Self {
        let entry = |label, file: &str, base_color| MaterialAsset {
            label,
            texture: PathBuf::from(file),
            base_color,
        };
        Self {
            texture_dir: PathBuf::from("assets/textures"),
            entries: vec![
                entry(MaterialLabel::Concrete, "concrete.jpg", [0.62, 0.62, 0.60, 1.0]),
                entry(MaterialLabel::Gypsum, "gypsum.jpg", [0.92, 0.91, 0.88, 1.0]),
                entry(MaterialLabel::Tile, "tile.jpg", [0.80, 0.84, 0.86, 1.0]),
                entry(MaterialLabel::Glass, "glass.png", [0.55, 0.75, 0.90, 0.35]),
                entry(MaterialLabel::Wood, "wood.jpg", [0.55, 0.38, 0.22, 1.0]),
                entry(MaterialLabel::Marble, "marble.jpg", [0.90, 0.89, 0.86, 1.0]),
            ],
        }
    }
}

impl MaterialAssets {
    pub fn get(&self, label: MaterialLabel) -> Option<&MaterialAsset> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Resolved texture path for a label
    pub fn texture_path(&self, label: MaterialLabel) -> Option<PathBuf> {
        self.get(label).map(|e| resolve(&self.texture_dir, &e.texture))
    }
}

fn resolve(dir: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        dir.join(file)
    }
}
