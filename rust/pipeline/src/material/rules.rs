// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deterministic material rules, evaluated in fixed priority order

use super::classifier::DecisionSource;
use super::{FeatureVector, MaterialLabel};
use crate::config::MarkerConfig;
use crate::layers::has_marker;
use crate::types::ElementKind;

/// First matching rule, or `None` when the learned model must decide.
///
/// 1. glazing marker in the layer name: glass
/// 2. exterior: concrete
/// 3. borders a bathroom or kitchen: tile
/// 4. wall thinner than `partition_threshold`: gypsum
pub fn apply_rules(
    features: &FeatureVector,
    markers: &MarkerConfig,
    partition_threshold: f64,
) -> Option<(MaterialLabel, DecisionSource)> {
    if has_marker(&features.layer, &markers.glazing) {
        return Some((MaterialLabel::Glass, DecisionSource::GlazingRule));
    }
    if features.is_exterior {
        return Some((MaterialLabel::Concrete, DecisionSource::ExteriorRule));
    }
    if features.adjacency.is_wet() {
        return Some((MaterialLabel::Tile, DecisionSource::WetAreaRule));
    }
    // Door and window panels are thin by construction
    if features.element == ElementKind::Wall && features.thickness < partition_threshold {
        return Some((MaterialLabel::Gypsum, DecisionSource::PartitionRule));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Adjacency;

    fn decide(f: &FeatureVector) -> Option<MaterialLabel> {
        apply_rules(f, &MarkerConfig::default(), 0.15).map(|(label, _)| label)
    }

    #[test]
    fn test_exterior_outranks_wet_area() {
        let mut f = FeatureVector::wall("A-WALL", 0.30, 3.0);
        f.is_exterior = true;
        f.adjacency = Adjacency {
            bathroom: true,
            kitchen: false,
        };
        assert_eq!(decide(&f), Some(MaterialLabel::Concrete));
    }

    #[test]
    fn test_glazing_outranks_exterior() {
        let mut f = FeatureVector::wall("A-GLAZ-CURTAIN", 0.30, 3.0);
        f.is_exterior = true;
        assert_eq!(decide(&f), Some(MaterialLabel::Glass));
    }

    #[test]
    fn test_wet_area_outranks_partition() {
        let mut f = FeatureVector::wall("A-WALL", 0.10, 3.0);
        f.adjacency.kitchen = true;
        assert_eq!(decide(&f), Some(MaterialLabel::Tile));
    }

    #[test]
    fn test_thin_interior_wall_is_gypsum() {
        let f = FeatureVector::wall("A-WALL", 0.10, 3.0);
        assert_eq!(
            apply_rules(&f, &MarkerConfig::default(), 0.15),
            Some((MaterialLabel::Gypsum, DecisionSource::PartitionRule))
        );
        // Threshold is strict
        let f = FeatureVector::wall("A-WALL", 0.15, 3.0);
        assert_eq!(decide(&f), None);
    }

    #[test]
    fn test_openings_skip_partition_rule() {
        let mut f = FeatureVector::wall("A-DOOR", 0.05, 2.2);
        f.element = ElementKind::Door;
        assert_eq!(decide(&f), None);
    }
}
