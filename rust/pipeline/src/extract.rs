// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry extraction: primitives to typed records
//!
//! Each primitive is classified by its layer and promoted to a wall
//! centreline, an opening, or a floor candidate. Items that cannot be
//! promoted are recorded as [`Skipped`] with a reason; extraction itself
//! never fails.

use crate::config::PipelineConfig;
use crate::layers::KeywordTable;
use crate::types::{Category, FloorPolygon, Opening, OpeningKind, Primitive, WallSegment};
use nalgebra::Point2;
use plan3d_geometry::polygon::{ensure_ccw, is_simple_ring, normalize_ring, signed_area, EPSILON_2D};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Why an item was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer than two distinct points (three for floors)
    TooFewPoints,
    /// Floor polyline not marked closed
    NotClosed,
    /// Floor ring crosses or touches itself
    SelfIntersecting,
    /// Floor area not strictly above the minimum
    BelowMinArea,
    NonFiniteCoordinate,
    /// Only polylines can describe floors
    UnsupportedFloorPrimitive,
}

impl SkipReason {
    /// Stable snake_case key, used as a report counter name
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TooFewPoints => "too_few_points",
            SkipReason::NotClosed => "not_closed",
            SkipReason::SelfIntersecting => "self_intersecting",
            SkipReason::BelowMinArea => "below_min_area",
            SkipReason::NonFiniteCoordinate => "non_finite_coordinate",
            SkipReason::UnsupportedFloorPrimitive => "unsupported_floor_primitive",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::TooFewPoints => "too few distinct points",
            SkipReason::NotClosed => "floor polyline is not closed",
            SkipReason::SelfIntersecting => "ring is self-intersecting",
            SkipReason::BelowMinArea => "area below minimum",
            SkipReason::NonFiniteCoordinate => "non-finite coordinate",
            SkipReason::UnsupportedFloorPrimitive => "floor must be a polyline",
        };
        f.write_str(text)
    }
}

/// A dropped input item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Skipped {
    /// Position in the input list
    pub index: usize,
    pub category: Category,
    pub reason: SkipReason,
}

/// Everything extracted from one primitive list
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub walls: Vec<WallSegment>,
    /// Largest valid closed floor polygon
    pub floor: Option<FloorPolygon>,
    /// Remaining valid closed floor polygons, in input order
    pub room_candidates: Vec<FloorPolygon>,
    pub doors: Vec<Opening>,
    pub windows: Vec<Opening>,
    /// Primitives whose layer matched no category
    pub ignored: usize,
    pub skipped: Vec<Skipped>,
}

impl ExtractionReport {
    /// Number of skipped items per reason
    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for skip in &self.skipped {
            *counts.entry(skip.reason).or_insert(0) += 1;
        }
        counts
    }

    /// Skipped items of one category
    pub fn skipped_in(&self, category: Category) -> usize {
        self.skipped.iter().filter(|s| s.category == category).count()
    }

    /// Records kept, over all categories
    pub fn kept(&self) -> usize {
        self.walls.len()
            + usize::from(self.floor.is_some())
            + self.room_candidates.len()
            + self.doors.len()
            + self.windows.len()
    }
}

/// Converts primitives into typed geometric records
#[derive(Debug, Clone)]
pub struct GeometryExtractor {
    keywords: KeywordTable,
    min_floor_area: f64,
}

impl Default for GeometryExtractor {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl GeometryExtractor {
    pub fn new(keywords: KeywordTable, min_floor_area: f64) -> Self {
        Self {
            keywords,
            min_floor_area,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.keywords.clone(), config.min_floor_area)
    }

    pub fn extract(&self, primitives: &[Primitive]) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        let mut floors: Vec<FloorPolygon> = Vec::new();

        for (index, primitive) in primitives.iter().enumerate() {
            let category = self.keywords.classify(primitive.layer());
            if category == Category::Ignore {
                report.ignored += 1;
                continue;
            }

            let outcome = match category {
                Category::Wall => to_segment(primitive).map(|s| report.walls.push(s)),
                Category::Door => to_segment(primitive).map(|segment| {
                    report.doors.push(Opening {
                        kind: OpeningKind::Door,
                        segment,
                    })
                }),
                Category::Window => to_segment(primitive).map(|segment| {
                    report.windows.push(Opening {
                        kind: OpeningKind::Window,
                        segment,
                    })
                }),
                Category::Floor => self.to_floor(primitive).map(|f| floors.push(f)),
                Category::Ignore => Ok(()),
            };

            if let Err(reason) = outcome {
                report.skipped.push(Skipped {
                    index,
                    category,
                    reason,
                });
            }
        }

        // Largest polygon is the floor; the first one wins a tie
        let mut largest: Option<usize> = None;
        for (i, floor) in floors.iter().enumerate() {
            if largest.map_or(true, |j| floor.area > floors[j].area) {
                largest = Some(i);
            }
        }
        if let Some(i) = largest {
            report.floor = Some(floors.remove(i));
        }
        report.room_candidates = floors;

        report
    }

    fn to_floor(&self, primitive: &Primitive) -> Result<FloorPolygon, SkipReason> {
        if !matches!(primitive, Primitive::Polyline { .. }) {
            return Err(SkipReason::UnsupportedFloorPrimitive);
        }
        let points = finite_points(primitive)?;
        if !primitive.is_closed() {
            return Err(SkipReason::NotClosed);
        }

        let ring = normalize_ring(&points, EPSILON_2D);
        if ring.len() < 3 {
            return Err(SkipReason::TooFewPoints);
        }
        if !is_simple_ring(&ring) {
            return Err(SkipReason::SelfIntersecting);
        }
        let area = signed_area(&ring).abs();
        if area <= self.min_floor_area {
            return Err(SkipReason::BelowMinArea);
        }

        Ok(FloorPolygon {
            ring: ensure_ccw(&ring),
            area,
            layer: primitive.layer().to_string(),
        })
    }
}

/// Extract with the default keyword table and minimum floor area
pub fn extract(primitives: &[Primitive]) -> ExtractionReport {
    GeometryExtractor::default().extract(primitives)
}

fn finite_points(primitive: &Primitive) -> Result<Vec<Point2<f64>>, SkipReason> {
    let raw = primitive.raw_points();
    if raw.iter().any(|p| !p.is_finite()) {
        return Err(SkipReason::NonFiniteCoordinate);
    }
    Ok(raw.iter().map(|p| p.to_nalgebra()).collect())
}

fn to_segment(primitive: &Primitive) -> Result<WallSegment, SkipReason> {
    let mut points = finite_points(primitive)?;
    // A closed polyline also runs back to its start
    if primitive.is_closed() {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if points.len() > 2 && (last - first).norm() > EPSILON_2D {
                points.push(first);
            }
        }
    }
    WallSegment::new(points, primitive.layer()).ok_or(SkipReason::TooFewPoints)
}
