// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline-fatal and configuration errors
//!
//! Per-item geometry problems are not errors; they are reported as
//! [`crate::extract::SkipReason`] values and counted. Everything here aborts
//! the whole file, and its message always names the failing stage.

use crate::material::MaterialLabel;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage, used in errors and observer reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Configuration, classifier artifact and asset loading
    Setup,
    Extraction,
    RoomDetection,
    WallNetwork,
    MaterialClassification,
    Assembly,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Extraction => "geometry extraction",
            Stage::RoomDetection => "room detection",
            Stage::WallNetwork => "wall network",
            Stage::MaterialClassification => "material classification",
            Stage::Assembly => "mesh assembly",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Errors that abort processing of a file
#[derive(Error, Debug)]
pub enum Error {
    #[error("geometry extraction: no valid wall geometry ({skipped} wall items skipped)")]
    NoWallGeometry { skipped: usize },

    #[error("wall network: no wall footprint left ({degenerate} of {total} walls degenerate)")]
    EmptyWallShell { total: usize, degenerate: usize },

    #[error("mesh assembly: model is empty, no wall, floor or room solids were produced")]
    EmptyModel,

    #[error("{stage}: {source}")]
    Geometry {
        stage: Stage,
        #[source]
        source: plan3d_geometry::Error,
    },

    #[error("setup: invalid classifier artifact: {0}")]
    Artifact(String),

    #[error("setup: texture for {label} not found at {}", path.display())]
    MissingAsset { label: MaterialLabel, path: PathBuf },

    #[error("setup: invalid configuration: {0}")]
    Config(String),

    #[error("{stage}: cannot access {}: {source}", path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("setup: malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export: {0}")]
    Export(String),
}

impl Error {
    /// Stage the failure belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Error::NoWallGeometry { .. } => Stage::Extraction,
            Error::EmptyWallShell { .. } => Stage::WallNetwork,
            Error::EmptyModel => Stage::Assembly,
            Error::Export(_) => Stage::Export,
            Error::Geometry { stage, .. } | Error::Io { stage, .. } => *stage,
            Error::Artifact(_)
            | Error::MissingAsset { .. }
            | Error::Config(_)
            | Error::Json(_) => Stage::Setup,
        }
    }

    pub(crate) fn geometry(stage: Stage) -> impl FnOnce(plan3d_geometry::Error) -> Error {
        move |source| Error::Geometry { stage, source }
    }

    pub(crate) fn io(
        stage: Stage,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Io {
            stage,
            path,
            source,
        }
    }
}
