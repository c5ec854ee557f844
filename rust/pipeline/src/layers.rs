// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layer name classification
//!
//! Layer names are the only semantic signal a CAD drawing carries. A layer
//! is matched case-insensitively by substring against one keyword list per
//! category, checked in the order Wall, Floor, Door, Window; the first list
//! with a hit decides, and a name matching nothing is `Ignore`.

use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Keyword lists per category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeywordTable {
    pub wall: Vec<String>,
    pub floor: Vec<String>,
    pub door: Vec<String>,
    pub window: Vec<String>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            wall: strings(&["wall", "a-wall", "partition", "a-part"]),
            floor: strings(&["floor", "slab", "a-flor"]),
            door: strings(&["door", "a-door", "opening"]),
            window: strings(&["window", "a-win", "glaz"]),
        }
    }
}

impl KeywordTable {
    /// Classify a raw layer name
    pub fn classify(&self, layer: &str) -> Category {
        let layer = layer.to_lowercase();
        let ordered = [
            (Category::Wall, &self.wall),
            (Category::Floor, &self.floor),
            (Category::Door, &self.door),
            (Category::Window, &self.window),
        ];
        ordered
            .into_iter()
            .find(|(_, keywords)| matches_lowered(&layer, keywords))
            .map(|(category, _)| category)
            .unwrap_or(Category::Ignore)
    }
}

/// Classify a layer name with the built-in keyword table
pub fn classify_layer(layer: &str) -> Category {
    static DEFAULT_TABLE: OnceLock<KeywordTable> = OnceLock::new();
    DEFAULT_TABLE.get_or_init(KeywordTable::default).classify(layer)
}

/// Whether a layer name contains any of the markers, ignoring case
pub fn has_marker(layer: &str, markers: &[String]) -> bool {
    matches_lowered(&layer.to_lowercase(), markers)
}

fn matches_lowered(layer: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| layer.contains(&k.to_lowercase()))
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
