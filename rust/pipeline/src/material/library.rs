// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memoized render materials
//!
//! Textures are read from disk once per label and shared as
//! `Arc<RenderMaterial>` for the lifetime of the library, across runs.

use super::{MaterialAssets, MaterialLabel};
use crate::error::{Error, Result, Stage};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Encoded image bytes, embedded as-is in exported models
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub path: PathBuf,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Everything an exporter needs to render one material
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMaterial {
    pub label: MaterialLabel,
    pub base_color: [f32; 4],
    pub texture: Option<Texture>,
}

/// Thread-safe material cache keyed by label
#[derive(Debug)]
pub struct MaterialLibrary {
    assets: MaterialAssets,
    textured: bool,
    cache: RwLock<FxHashMap<MaterialLabel, Arc<RenderMaterial>>>,
    loads: AtomicUsize,
}

impl MaterialLibrary {
    /// Library that embeds textures from the asset table
    pub fn new(assets: MaterialAssets) -> Self {
        Self {
            assets,
            textured: true,
            cache: RwLock::new(FxHashMap::default()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Colour-only library; never touches the filesystem
    pub fn untextured(assets: MaterialAssets) -> Self {
        Self {
            textured: false,
            ..Self::new(assets)
        }
    }

    pub fn is_textured(&self) -> bool {
        self.textured
    }

    /// Cached material for a label, loading it on first use
    pub fn get(&self, label: MaterialLabel) -> Result<Arc<RenderMaterial>> {
        // Check cache first
        if let Ok(cache) = self.cache.read() {
            if let Some(cached) = cache.get(&label) {
                return Ok(Arc::clone(cached));
            }
        }

        let material = Arc::new(self.load(label)?);
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another thread may have loaded it meanwhile; keep the first
        Ok(Arc::clone(cache.entry(label).or_insert(material)))
    }

    /// Load every label now, so missing assets surface before any geometry work
    pub fn preload(&self) -> Result<()> {
        for label in MaterialLabel::ALL {
            self.get(label)?;
        }
        Ok(())
    }

    /// Number of materials actually loaded (cache misses)
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    fn load(&self, label: MaterialLabel) -> Result<RenderMaterial> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let asset = self.assets.get(label);
        let base_color = asset.map(|a| a.base_color).unwrap_or([0.8, 0.8, 0.8, 1.0]);

        let texture = if self.textured {
            let path = self
                .assets
                .texture_path(label)
                .ok_or_else(|| Error::Config(format!("no texture configured for {label}")))?;
            Some(read_texture(label, path)?)
        } else {
            None
        };

        tracing::debug!(%label, textured = texture.is_some(), "loaded material");
        Ok(RenderMaterial {
            label,
            base_color,
            texture,
        })
    }
}

fn read_texture(label: MaterialLabel, path: PathBuf) -> Result<Texture> {
    let mime_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => {
            return Err(Error::Config(format!(
                "texture {} for {label} must be PNG or JPEG",
                path.display()
            )))
        }
    };

    if !path.is_file() {
        return Err(Error::MissingAsset { label, path });
    }
    let bytes = std::fs::read(&path).map_err(Error::io(Stage::Setup, &path))?;

    Ok(Texture {
        path,
        mime_type,
        bytes,
    })
}
