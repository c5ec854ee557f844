// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rule pass plus learned fallback

use super::model::{ClassifierArtifact, LabelEncoder, MaterialModel};
use super::rules::apply_rules;
use super::{FeatureVector, MaterialLabel};
use crate::config::{MarkerConfig, PipelineConfig};
use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// What produced a material label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    GlazingRule,
    ExteriorRule,
    WetAreaRule,
    PartitionRule,
    Model,
    /// No model loaded, or the model failed
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaterialDecision {
    pub label: MaterialLabel,
    pub source: DecisionSource,
}

/// Immutable learned-classifier state: model plus both encoders.
///
/// Built once and shared; cloning only bumps reference counts.
#[derive(Debug, Clone)]
pub struct ClassifierContext {
    model: Option<Arc<dyn MaterialModel>>,
    orientation_encoder: Arc<LabelEncoder>,
    material_encoder: Arc<[MaterialLabel]>,
}

impl ClassifierContext {
    /// No learned model; every undecided element gets the fallback label
    pub fn rules_only() -> Self {
        Self {
            model: None,
            orientation_encoder: Arc::new(LabelEncoder::default()),
            material_encoder: Arc::from(Vec::new()),
        }
    }

    /// Wrap any model, e.g. a test double
    pub fn with_model(
        model: Arc<dyn MaterialModel>,
        orientation_encoder: LabelEncoder,
        material_encoder: Vec<MaterialLabel>,
    ) -> Self {
        Self {
            model: Some(model),
            orientation_encoder: Arc::new(orientation_encoder),
            material_encoder: Arc::from(material_encoder),
        }
    }

    /// Validate a frozen artifact and take ownership of it
    pub fn from_artifact(artifact: ClassifierArtifact) -> Result<Self> {
        let labels = artifact.validate()?;
        Ok(Self::with_model(
            Arc::new(artifact.model),
            artifact.orientation_encoder,
            labels,
        ))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_artifact(ClassifierArtifact::from_json_file(path)?)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Learned prediction, or `None` if there is no model or it failed
    fn predict(&self, features: &FeatureVector) -> Option<MaterialLabel> {
        let model = self.model.as_ref()?;
        let input = features.to_model_input(&self.orientation_encoder);
        match model.predict(&input) {
            Ok(class) => {
                let label = self.material_encoder.get(class).copied();
                if label.is_none() {
                    tracing::warn!(
                        class,
                        layer = %features.layer,
                        "model class outside material encoder"
                    );
                }
                label
            }
            Err(e) => {
                tracing::warn!(error = %e, layer = %features.layer, "material model failed");
                None
            }
        }
    }
}

impl Default for ClassifierContext {
    fn default() -> Self {
        Self::rules_only()
    }
}

/// Assigns one material per wall or opening.
///
/// Never fails: anything the rules and the model cannot decide is concrete.
#[derive(Debug, Clone)]
pub struct MaterialClassifier {
    context: ClassifierContext,
    markers: MarkerConfig,
    partition_threshold: f64,
}

impl MaterialClassifier {
    pub fn new(
        context: ClassifierContext,
        markers: MarkerConfig,
        partition_threshold: f64,
    ) -> Self {
        Self {
            context,
            markers,
            partition_threshold,
        }
    }

    pub fn from_config(context: ClassifierContext, config: &PipelineConfig) -> Self {
        Self::new(context, config.markers.clone(), config.partition_threshold)
    }

    pub fn context(&self) -> &ClassifierContext {
        &self.context
    }

    pub fn decide(&self, features: &FeatureVector) -> MaterialDecision {
        if let Some((label, source)) =
            apply_rules(features, &self.markers, self.partition_threshold)
        {
            return MaterialDecision { label, source };
        }
        match self.context.predict(features) {
            Some(label) => MaterialDecision {
                label,
                source: DecisionSource::Model,
            },
            None => MaterialDecision {
                label: MaterialLabel::default(),
                source: DecisionSource::Fallback,
            },
        }
    }

    pub fn classify_material(&self, features: &FeatureVector) -> MaterialLabel {
        self.decide(features).label
    }
}

impl Default for MaterialClassifier {
    fn default() -> Self {
        Self::from_config(ClassifierContext::rules_only(), &PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::model::tests::door_artifact;
    use crate::material::model::{ModelError, FEATURE_COUNT};
    use crate::material::{Adjacency, Orientation};
    use crate::types::ElementKind;

    #[derive(Debug)]
    struct FailingModel;

    impl MaterialModel for FailingModel {
        fn predict(&self, _: &[f64; FEATURE_COUNT]) -> std::result::Result<usize, ModelError> {
            Err(ModelError::NoClasses)
        }
    }

    /// Always answers the same class index
    #[derive(Debug)]
    struct FixedModel(usize);

    impl MaterialModel for FixedModel {
        fn predict(&self, _: &[f64; FEATURE_COUNT]) -> std::result::Result<usize, ModelError> {
            Ok(self.0)
        }
    }

    fn classifier(model: Arc<dyn MaterialModel>) -> MaterialClassifier {
        let context = ClassifierContext::with_model(
            model,
            LabelEncoder::new(["horizontal", "vertical"]),
            vec![MaterialLabel::Wood, MaterialLabel::Marble],
        );
        MaterialClassifier::from_config(context, &PipelineConfig::default())
    }

    fn door() -> FeatureVector {
        FeatureVector {
            length: 0.9,
            thickness: 0.05,
            height: 2.2,
            orientation: Orientation::Horizontal,
            is_exterior: false,
            adjacency: Adjacency::default(),
            layer: "A-DOOR".into(),
            element: ElementKind::Door,
        }
    }

    #[test]
    fn test_exterior_wall_ignores_model() {
        let mut f = FeatureVector::wall("A-WALL", 0.30, 3.0);
        f.is_exterior = true;

        for model in [
            Arc::new(FixedModel(0)) as Arc<dyn MaterialModel>,
            Arc::new(FixedModel(1)),
            Arc::new(FailingModel),
        ] {
            let decision = classifier(model).decide(&f);
            assert_eq!(decision.label, MaterialLabel::Concrete);
            assert_eq!(decision.source, DecisionSource::ExteriorRule);
        }
    }

    #[test]
    fn test_thin_partition_is_gypsum() {
        let f = FeatureVector::wall("A-WALL", 0.10, 3.0);
        assert_eq!(
            MaterialClassifier::default().classify_material(&f),
            MaterialLabel::Gypsum
        );
    }

    #[test]
    fn test_model_decides_when_rules_do_not() {
        let decision = classifier(Arc::new(FixedModel(1))).decide(&door());
        assert_eq!(decision.label, MaterialLabel::Marble);
        assert_eq!(decision.source, DecisionSource::Model);
    }

    #[test]
    fn test_model_failure_falls_back_to_concrete() {
        let decision = classifier(Arc::new(FailingModel)).decide(&door());
        assert_eq!(decision.label, MaterialLabel::Concrete);
        assert_eq!(decision.source, DecisionSource::Fallback);

        // Class index the encoder cannot map
        let decision = classifier(Arc::new(FixedModel(9))).decide(&door());
        assert_eq!(decision.label, MaterialLabel::Concrete);
    }

    #[test]
    fn test_unseen_orientation_still_classifies() {
        let context = ClassifierContext::from_artifact(door_artifact()).unwrap();
        let classifier = MaterialClassifier::from_config(context, &PipelineConfig::default());

        let mut f = door();
        f.orientation = Orientation::Diagonal;
        let decision = classifier.decide(&f);
        assert_eq!(decision.label, MaterialLabel::Wood);
        assert_eq!(decision.source, DecisionSource::Model);

        // Artifact trained without any orientation vocabulary
        let mut artifact = door_artifact();
        artifact.orientation_encoder = LabelEncoder::default();
        let context = ClassifierContext::from_artifact(artifact).unwrap();
        let classifier = MaterialClassifier::from_config(context, &PipelineConfig::default());
        assert!(MaterialLabel::ALL.contains(&classifier.classify_material(&f)));
    }

    #[test]
    fn test_rules_only_context() {
        let classifier = MaterialClassifier::default();
        assert!(!classifier.context().has_model());
        let decision = classifier.decide(&door());
        assert_eq!(decision.label, MaterialLabel::Concrete);
        assert_eq!(decision.source, DecisionSource::Fallback);
    }
}
