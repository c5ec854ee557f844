// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Learned material model and its frozen artifact
//!
//! The artifact is produced by the offline training job and holds the tree
//! ensemble plus two label encoders. Field order of the model input is a
//! contract with that job: changing [`FEATURE_NAMES`] means retraining.

use super::MaterialLabel;
use crate::error::{Error, Result, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Bumped whenever the order or meaning of model inputs changes
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

pub const FEATURE_COUNT: usize = 5;

/// Model input columns, in order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["length", "thickness", "height", "orientation", "is_exterior"];

/// Failure while evaluating a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("feature {index} ({name}) is not finite")]
    NonFiniteFeature { index: usize, name: &'static str },

    #[error("tree {tree}: node {node} out of range")]
    BadNode { tree: usize, node: usize },

    #[error("model has no classes")]
    NoClasses,
}

/// A classifier from the numeric feature block to a class index
pub trait MaterialModel: Send + Sync + fmt::Debug {
    fn predict(&self, input: &[f64; FEATURE_COUNT]) -> std::result::Result<usize, ModelError>;
}

/// Maps category strings to integer codes.
///
/// Unseen values encode to 0 instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<S: Into<String>>(classes: impl IntoIterator<Item = S>) -> Self {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn transform(&self, value: &str) -> usize {
        self.classes.iter().position(|c| c == value).unwrap_or(0)
    }
}

/// One node of a regression tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Leaf {
        leaf: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        /// Taken when `input[feature] < threshold`
        left: usize,
        right: usize,
    },
}

/// Regression tree contributing to one class score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub class: usize,
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn eval(
        &self,
        tree: usize,
        input: &[f64; FEATURE_COUNT],
    ) -> std::result::Result<f64, ModelError> {
        let mut index = 0;
        // A valid tree reaches a leaf in at most `nodes.len()` steps
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { leaf }) => return Ok(*leaf),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = input
                        .get(*feature)
                        .ok_or(ModelError::BadNode { tree, node: index })?;
                    index = if value < threshold { *left } else { *right };
                }
                None => return Err(ModelError::BadNode { tree, node: index }),
            }
        }
        Err(ModelError::BadNode { tree, node: index })
    }

    fn check(&self, tree: usize) -> std::result::Result<(), ModelError> {
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                // Children must point forward, which also rules out cycles
                let forward = |c: &usize| *c > i && *c < self.nodes.len();
                if *feature >= FEATURE_COUNT || !forward(left) || !forward(right) {
                    return Err(ModelError::BadNode { tree, node: i });
                }
            }
        }
        if self.nodes.is_empty() {
            return Err(ModelError::BadNode { tree, node: 0 });
        }
        Ok(())
    }
}

/// Multi-class gradient-boosted trees: each class score is the base score
/// plus the sum of its trees, and the highest score wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradientBoostedTrees {
    pub num_class: usize,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl GradientBoostedTrees {
    /// Structural validation, run once at load time
    pub fn validate(&self) -> std::result::Result<(), ModelError> {
        if self.num_class == 0 {
            return Err(ModelError::NoClasses);
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.class >= self.num_class {
                return Err(ModelError::BadNode { tree: i, node: 0 });
            }
            tree.check(i)?;
        }
        Ok(())
    }

    pub fn scores(
        &self,
        input: &[f64; FEATURE_COUNT],
    ) -> std::result::Result<Vec<f64>, ModelError> {
        if let Some(index) = input.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteFeature {
                index,
                name: FEATURE_NAMES[index],
            });
        }
        let mut scores = vec![self.base_score; self.num_class];
        for (i, tree) in self.trees.iter().enumerate() {
            let score = scores
                .get_mut(tree.class)
                .ok_or(ModelError::BadNode { tree: i, node: 0 })?;
            *score += tree.eval(i, input)?;
        }
        Ok(scores)
    }
}

impl MaterialModel for GradientBoostedTrees {
    fn predict(&self, input: &[f64; FEATURE_COUNT]) -> std::result::Result<usize, ModelError> {
        let scores = self.scores(input)?;
        scores
            .iter()
            .enumerate()
            // First maximum wins ties
            .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i, s)),
            })
            .map(|(i, _)| i)
            .ok_or(ModelError::NoClasses)
    }
}

/// Frozen output of the training job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierArtifact {
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub orientation_encoder: LabelEncoder,
    /// Class index to material name
    pub material_encoder: Vec<String>,
    pub model: GradientBoostedTrees,
}

impl ClassifierArtifact {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(Error::io(Stage::Setup, path))?;
        let artifact: ClassifierArtifact = serde_json::from_str(&text)?;
        Ok(artifact)
    }

    /// Check the artifact against this build's feature schema and label set.
    ///
    /// Returns the decoded material encoder.
    pub fn validate(&self) -> Result<Vec<MaterialLabel>> {
        if self.schema_version != FEATURE_SCHEMA_VERSION {
            return Err(Error::Artifact(format!(
                "feature schema version {} does not match {}",
                self.schema_version, FEATURE_SCHEMA_VERSION
            )));
        }
        if self.feature_names != FEATURE_NAMES {
            return Err(Error::Artifact(format!(
                "feature names {:?} do not match {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }

        let labels = self
            .material_encoder
            .iter()
            .map(|name| name.parse::<MaterialLabel>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Artifact)?;
        if labels.len() != self.model.num_class {
            return Err(Error::Artifact(format!(
                "material encoder has {} labels but the model has {} classes",
                labels.len(),
                self.model.num_class
            )));
        }

        self.model
            .validate()
            .map_err(|e| Error::Artifact(e.to_string()))?;
        Ok(labels)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two classes (concrete, wood): wood when thickness < 0.12 and height < 2.5
    pub(crate) fn door_artifact() -> ClassifierArtifact {
        ClassifierArtifact {
            schema_version: FEATURE_SCHEMA_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            orientation_encoder: LabelEncoder::new(["diagonal", "horizontal", "vertical"]),
            material_encoder: vec!["concrete".into(), "wood".into()],
            model: GradientBoostedTrees {
                num_class: 2,
                base_score: 0.5,
                trees: vec![
                    Tree {
                        class: 1,
                        nodes: vec![
                            TreeNode::Split {
                                feature: 1,
                                threshold: 0.12,
                                left: 1,
                                right: 4,
                            },
                            TreeNode::Split {
                                feature: 2,
                                threshold: 2.5,
                                left: 2,
                                right: 3,
                            },
                            TreeNode::Leaf { leaf: 1.0 },
                            TreeNode::Leaf { leaf: -1.0 },
                            TreeNode::Leaf { leaf: -1.0 },
                        ],
                    },
                    Tree {
                        class: 0,
                        nodes: vec![TreeNode::Leaf { leaf: 0.1 }],
                    },
                ],
            },
        }
    }

    #[test]
    fn test_label_encoder_unseen_is_zero() {
        let enc = LabelEncoder::new(["diagonal", "horizontal", "vertical"]);
        assert_eq!(enc.transform("vertical"), 2);
        assert_eq!(enc.transform("spiral"), 0);
        assert_eq!(LabelEncoder::default().transform("anything"), 0);
    }

    #[test]
    fn test_tree_ensemble_prediction() {
        let model = door_artifact().model;
        assert!(model.validate().is_ok());
        assert_eq!(model.predict(&[1.0, 0.05, 2.2, 1.0, 0.0]).unwrap(), 1);
        assert_eq!(model.predict(&[1.0, 0.25, 2.2, 1.0, 0.0]).unwrap(), 0);
        assert_eq!(model.predict(&[1.0, 0.05, 4.0, 1.0, 0.0]).unwrap(), 0);
    }

    #[test]
    fn test_non_finite_input_is_an_error() {
        let model = door_artifact().model;
        let err = model.predict(&[1.0, f64::NAN, 2.2, 1.0, 0.0]).unwrap_err();
        assert_eq!(
            err,
            ModelError::NonFiniteFeature {
                index: 1,
                name: "thickness"
            }
        );
    }

    #[test]
    fn test_artifact_json_shape() {
        let json = r#"{
            "schema_version": 1,
            "feature_names": ["length", "thickness", "height", "orientation", "is_exterior"],
            "orientation_encoder": {"classes": ["horizontal", "vertical"]},
            "material_encoder": ["gypsum"],
            "model": {"num_class": 1, "trees": [
                {"class": 0, "nodes": [
                    {"feature": 0, "threshold": 3.0, "left": 1, "right": 2},
                    {"leaf": 0.2},
                    {"leaf": 0.4}
                ]}
            ]}
        }"#;
        let artifact: ClassifierArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.validate().unwrap(), vec![MaterialLabel::Gypsum]);
        assert_eq!(artifact.model.base_score, 0.0);
    }

    #[test]
    fn test_artifact_rejects_unknown_labels_and_schema_drift() {
        let mut artifact = door_artifact();
        artifact.material_encoder[1] = "brick".into();
        assert!(matches!(artifact.validate(), Err(Error::Artifact(_))));

        let mut artifact = door_artifact();
        artifact.feature_names.swap(0, 1);
        assert!(matches!(artifact.validate(), Err(Error::Artifact(_))));

        let mut artifact = door_artifact();
        artifact.schema_version = 2;
        assert!(artifact.validate().is_err());

        let mut artifact = door_artifact();
        artifact.material_encoder.pop();
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_malformed_trees_rejected() {
        let mut artifact = door_artifact();
        // Back edge would loop forever
        artifact.model.trees[0].nodes[1] = TreeNode::Split {
            feature: 2,
            threshold: 2.5,
            left: 0,
            right: 3,
        };
        assert!(matches!(
            artifact.model.validate(),
            Err(ModelError::BadNode { tree: 0, node: 1 })
        ));

        let mut artifact = door_artifact();
        artifact.model.trees[1].class = 7;
        assert!(artifact.validate().is_err());
    }
}
