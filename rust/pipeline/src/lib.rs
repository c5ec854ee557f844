// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CAD floor plan classification and 3D building reconstruction
//!
//! Pipeline, run strictly in sequence for one storey:
//! 1. Layer classification of every primitive
//! 2. Geometry extraction into walls, openings and floor candidates
//! 3. Room detection from the wall centreline topology
//! 4. Wall network: buffered, merged, door-cut footprint
//! 5. Material classification per wall and opening (rules, then a learned model)
//! 6. Mesh assembly into one re-centred model, exportable as GLB
//!
//! # Usage
//!
//! ```rust,ignore
//! use plan3d_pipeline::{ClassifierContext, Pipeline, PipelineConfig, Primitive};
//!
//! let primitives: Vec<Primitive> = serde_json::from_str(&dump)?;
//! let pipeline = Pipeline::new(PipelineConfig::from_env()?)
//!     .with_classifier(ClassifierContext::load("material_model.json")?);
//!
//! let output = pipeline.run(&primitives)?;
//! plan3d_pipeline::export::write_glb(&output.model, "model.glb")?;
//! ```

pub mod assembler;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod layers;
pub mod material;
pub mod observer;
pub mod room_detector;
pub mod types;
pub mod wall_network;

// Re-export commonly used types and functions
pub use assembler::{AssemblyInput, BuildingModel, MeshAssembler, SolidInfo, Surface};
pub use config::PipelineConfig;
pub use error::{Error, Result, Stage};
pub use export::{to_glb, write_glb};
pub use extract::{extract, ExtractionReport, GeometryExtractor, SkipReason};
pub use layers::{classify_layer, KeywordTable};
pub use material::{
    ClassifierContext, FeatureExtractor, FeatureVector, MaterialClassifier, MaterialDecision,
    MaterialLabel, MaterialLibrary,
};
pub use observer::{
    NoopObserver, PipelineObserver, RecordingObserver, StageReport, TracingObserver,
};
pub use room_detector::{detect_rooms, RoomDetector};
pub use types::{
    Category, ElementKind, FloorPolygon, Opening, OpeningKind, Point2D, Primitive, RoomKind,
    RoomPolygon, WallSegment,
};
pub use wall_network::{build_wall_shell, build_wall_shell_with, WallShell};

use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Everything one run produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub model: BuildingModel,
    pub rooms: Vec<RoomPolygon>,
    /// One decision per extracted wall, in extraction order
    pub wall_materials: Vec<MaterialDecision>,
    /// Doors then windows, in extraction order
    pub opening_materials: Vec<MaterialDecision>,
    pub extraction: ExtractionReport,
}

/// The configured pipeline. Cheap to share; holds no per-run state.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    classifier: MaterialClassifier,
    library: Arc<MaterialLibrary>,
    observer: Arc<dyn PipelineObserver>,
}

impl Pipeline {
    /// Rules-only classification, untextured materials, tracing observer
    pub fn new(config: PipelineConfig) -> Self {
        let classifier = MaterialClassifier::from_config(ClassifierContext::rules_only(), &config);
        let library = Arc::new(MaterialLibrary::untextured(config.materials.clone()));
        Self {
            config,
            classifier,
            library,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_classifier(mut self, context: ClassifierContext) -> Self {
        self.classifier = MaterialClassifier::from_config(context, &self.config);
        self
    }

    /// Share a material cache, e.g. across files
    pub fn with_library(mut self, library: Arc<MaterialLibrary>) -> Self {
        self.library = library;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<MaterialLibrary> {
        &self.library
    }

    /// Run every stage on one storey's primitives.
    ///
    /// Either a complete model or a single stage-tagged error; nothing
    /// partial is ever returned.
    pub fn run(&self, primitives: &[Primitive]) -> Result<PipelineOutput> {
        let config = &self.config;

        // Geometry extraction
        let started = Instant::now();
        let extraction = GeometryExtractor::from_config(config).extract(primitives);
        let mut report = StageReport::new(Stage::Extraction).counts(
            primitives.len(),
            extraction.kept(),
            extraction.skipped.len(),
        );
        report = report
            .detail("walls", extraction.walls.len())
            .detail("doors", extraction.doors.len())
            .detail("windows", extraction.windows.len())
            .detail("floor", usize::from(extraction.floor.is_some()))
            .detail("room_candidates", extraction.room_candidates.len())
            .detail("ignored", extraction.ignored);
        for (reason, count) in extraction.skip_counts() {
            report = report.detail(reason.as_str(), count);
        }
        self.emit(report, started);

        if extraction.walls.is_empty() {
            return Err(Error::NoWallGeometry {
                skipped: extraction.skipped_in(Category::Wall),
            });
        }

        // Room detection
        let started = Instant::now();
        let detection = RoomDetector::from_config(config)
            .detect(&extraction.walls, &extraction.room_candidates);
        let stats = detection.stats;
        self.emit(
            StageReport::new(Stage::RoomDetection)
                .counts(extraction.walls.len(), detection.rooms.len(), stats.below_min_area)
                .detail("faces", stats.faces)
                .detail("dangles_removed", stats.dangles_removed)
                .detail("bridges_removed", stats.bridges_removed)
                .detail("tagged_added", stats.tagged_added),
            started,
        );
        let rooms = detection.rooms;

        // Wall network
        let started = Instant::now();
        let shell = build_wall_shell_with(
            &extraction.walls,
            &extraction.doors,
            |w| config.thickness.resolve(&w.layer, &config.markers),
            config.door_clearance,
        )?;
        let shell_report = shell.report;
        self.emit(
            StageReport::new(Stage::WallNetwork)
                .counts(
                    shell_report.walls + shell_report.doors,
                    shell_report.pieces,
                    shell_report.degenerate_walls + shell_report.degenerate_doors,
                )
                .detail("degenerate_walls", shell_report.degenerate_walls)
                .detail("degenerate_doors", shell_report.degenerate_doors),
            started,
        );

        // Material classification
        let started = Instant::now();
        let features = FeatureExtractor::new(&shell, &rooms, config);
        let openings: Vec<&Opening> = extraction
            .doors
            .iter()
            .chain(extraction.windows.iter())
            .collect();
        let (wall_materials, opening_materials) =
            self.classify(&features, &extraction.walls, &openings);
        let model_decided = wall_materials
            .iter()
            .chain(opening_materials.iter())
            .filter(|d| d.source == material::DecisionSource::Model)
            .count();
        let fallbacks = wall_materials
            .iter()
            .chain(opening_materials.iter())
            .filter(|d| d.source == material::DecisionSource::Fallback)
            .count();
        self.emit(
            StageReport::new(Stage::MaterialClassification)
                .counts(
                    extraction.walls.len() + openings.len(),
                    wall_materials.len() + opening_materials.len(),
                    0,
                )
                .detail("model", model_decided)
                .detail("fallback", fallbacks),
            started,
        );

        // Mesh assembly
        let started = Instant::now();
        let labels: Vec<MaterialLabel> = wall_materials.iter().map(|d| d.label).collect();
        let labelled_openings: Vec<(Opening, MaterialLabel)> = openings
            .iter()
            .zip(&opening_materials)
            .map(|(o, d)| ((*o).clone(), d.label))
            .collect();
        let input = AssemblyInput {
            shell: &shell,
            walls: &extraction.walls,
            wall_materials: &labels,
            floor: extraction.floor.as_ref(),
            rooms: &rooms,
            openings: &labelled_openings,
        };
        let model = MeshAssembler::new(config, &self.library).assemble(&input)?;
        self.emit(
            StageReport::new(Stage::Assembly)
                .counts(
                    shell_report.pieces + rooms.len() + labelled_openings.len(),
                    model.report.solids,
                    model.report.failed,
                )
                .detail("surfaces", model.surfaces.len())
                .detail("wall_groups", model.report.wall_groups)
                .detail("triangles", model.report.triangles),
            started,
        );

        Ok(PipelineOutput {
            model,
            rooms,
            wall_materials,
            opening_materials,
            extraction,
        })
    }

    /// Per-element feature extraction and classification, order preserved
    fn classify(
        &self,
        features: &FeatureExtractor<'_>,
        walls: &[WallSegment],
        openings: &[&Opening],
    ) -> (Vec<MaterialDecision>, Vec<MaterialDecision>) {
        let classifier = &self.classifier;
        if self.config.parallel {
            let walls = walls
                .par_iter()
                .enumerate()
                .map(|(i, w)| classifier.decide(&features.wall(i, w)))
                .collect();
            let openings = openings
                .par_iter()
                .map(|o| classifier.decide(&features.opening(o)))
                .collect();
            (walls, openings)
        } else {
            let walls = walls
                .iter()
                .enumerate()
                .map(|(i, w)| classifier.decide(&features.wall(i, w)))
                .collect();
            let openings = openings
                .iter()
                .map(|o| classifier.decide(&features.opening(o)))
                .collect();
            (walls, openings)
        }
    }

    fn emit(&self, mut report: StageReport, started: Instant) {
        report.elapsed = started.elapsed();
        self.observer.on_stage(&report);
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
