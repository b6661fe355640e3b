//! Native evaluator for XGBoost JSON models.
//!
//! Reads the document written by XGBoost's `save_model("*.json")` and
//! evaluates the boosted trees directly, so the trainer's own serialization
//! can be served without a separate export step. Only binary gradient-boosted
//! tree models with numeric splits are accepted.

use crate::config::ModelConfig;
use crate::error::{InferenceError, ModelLoadError};
use crate::feature_extractor::FeatureVector;
use crate::models::classifier::Classifier;
use crate::types::{Label, FEATURE_COUNT, FEATURE_NAMES};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

// On-disk document layout. Unknown keys are ignored.

#[derive(Debug, Deserialize)]
struct ModelDocument {
    learner: LearnerDocument,
}

#[derive(Debug, Deserialize)]
struct LearnerDocument {
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: BoosterDocument,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveDocument,
}

#[derive(Debug, Deserialize)]
struct BoosterDocument {
    name: String,
    #[serde(default)]
    model: Option<GbTreeDocument>,
}

#[derive(Debug, Deserialize)]
struct GbTreeDocument {
    #[serde(default)]
    gbtree_model_param: Option<GbTreeModelParam>,
    trees: Vec<TreeDocument>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModelParam {
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDocument {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    #[serde(default)]
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// Older writers emit 0/1, newer ones booleans.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

/// How the summed margin relates to `base_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    /// `base_score` is a probability; margin starts at its logit
    Logistic,
    /// `base_score` is already a margin
    LogitRaw,
}

impl Objective {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "binary:logistic" | "reg:logistic" => Some(Objective::Logistic),
            "binary:logitraw" => Some(Objective::LogitRaw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

/// One regression tree. Node 0 is the root; every reachable node is
/// visited at most once from it.
#[derive(Debug, Clone)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn leaf_value(&self, features: &[f32]) -> f32 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let x = features[feature];
                    index = if x.is_nan() {
                        if default_left {
                            left
                        } else {
                            right
                        }
                    } else if x < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// A gradient-boosted tree ensemble loaded from an XGBoost JSON model.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    name: String,
    trees: Vec<RegressionTree>,
    base_margin: f32,
    threshold: f64,
}

impl TreeEnsemble {
    /// Load the model at `config.path`.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelLoadError> {
        let path = &config.path;
        info!(path = %path.display(), "Loading XGBoost JSON model");

        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ModelLoadError::NotFound { path: path.clone() }
            } else {
                ModelLoadError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let model = Self::from_json(&text, config)?;
        info!(
            model = %model.name,
            trees = model.trees.len(),
            base_margin = model.base_margin,
            threshold = model.threshold,
            "Model loaded successfully"
        );
        Ok(model)
    }

    /// Parse a model document. `config.path` is only used in error messages.
    pub fn from_json(text: &str, config: &ModelConfig) -> Result<Self, ModelLoadError> {
        let path = config.path.as_path();
        let corrupt = |reason: String| ModelLoadError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        let incompatible = |reason: String| ModelLoadError::Incompatible {
            path: path.to_path_buf(),
            reason,
        };

        let document: ModelDocument =
            serde_json::from_str(text).map_err(|e| corrupt(e.to_string()))?;
        let learner = document.learner;

        let objective = Objective::parse(&learner.objective.name).ok_or_else(|| {
            incompatible(format!(
                "objective '{}' is not a binary classifier",
                learner.objective.name
            ))
        })?;

        let params = &learner.learner_model_param;
        let num_class: usize = match params.num_class.as_deref() {
            None | Some("") => 0,
            Some(raw) => parse_param(path, "num_class", raw)?,
        };
        if num_class > 1 {
            return Err(incompatible(format!(
                "multi-class model with {} classes",
                num_class
            )));
        }

        let num_feature: usize = parse_param(path, "num_feature", &params.num_feature)?;
        if num_feature != FEATURE_COUNT {
            return Err(incompatible(format!(
                "model expects {} features, the transaction contract has {}",
                num_feature, FEATURE_COUNT
            )));
        }

        check_feature_names(&learner.feature_names, config)?;

        let base_score = parse_base_score(path, &params.base_score)?;
        let base_margin = match objective {
            Objective::Logistic => {
                if !(base_score > 0.0 && base_score < 1.0) {
                    return Err(corrupt(format!(
                        "base_score {} is not a probability",
                        base_score
                    )));
                }
                (base_score / (1.0 - base_score)).ln()
            }
            Objective::LogitRaw => base_score,
        };

        if learner.gradient_booster.name != "gbtree" {
            return Err(incompatible(format!(
                "booster '{}' is not supported, expected gbtree",
                learner.gradient_booster.name
            )));
        }
        let booster = learner
            .gradient_booster
            .model
            .ok_or_else(|| corrupt("gbtree booster has no model".to_string()))?;

        let mut trees = booster
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| compile_tree(path, i, tree))
            .collect::<Result<Vec<_>, _>>()?;

        if trees.is_empty() {
            return Err(corrupt("model contains no trees".to_string()));
        }

        // Early-stopped models predict with the best iteration only.
        if let Some(best) = learner.attributes.get("best_iteration") {
            let best: usize = parse_param(path, "best_iteration", best)?;
            let parallel: usize = match booster
                .gbtree_model_param
                .as_ref()
                .and_then(|p| p.num_parallel_tree.as_deref())
            {
                Some(raw) => parse_param(path, "num_parallel_tree", raw)?,
                None => 1,
            };
            let keep = (best + 1).saturating_mul(parallel.max(1));
            if keep < trees.len() {
                info!(best_iteration = best, trees = keep, "Truncating to best iteration");
                trees.truncate(keep);
            }
        }

        let name = path
            .file_stem()
            .map(|s| format!("xgboost:{}", s.to_string_lossy()))
            .unwrap_or_else(|| "xgboost".to_string());

        Ok(Self {
            name,
            trees,
            base_margin: base_margin as f32,
            threshold: config.threshold,
        })
    }

    /// Raw summed output before the logistic transform.
    pub fn margin(&self, features: &FeatureVector) -> f32 {
        let x = features.as_slice();
        self.trees
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.leaf_value(x))
    }

    /// Fraud probability, computed in `f32` like XGBoost's own predictor.
    pub fn probability(&self, features: &FeatureVector) -> f64 {
        sigmoid(self.margin(features)) as f64
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Classifier for TreeEnsemble {
    fn classify(&self, features: &FeatureVector) -> Result<Label, InferenceError> {
        let probability = self.probability(features);
        if probability.is_nan() {
            return Err(InferenceError::Backend(
                "tree ensemble produced NaN".to_string(),
            ));
        }
        Ok(Label::from_probability(probability, self.threshold))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn parse_param<T: FromStr>(path: &Path, name: &str, raw: &str) -> Result<T, ModelLoadError> {
    raw.trim().parse().map_err(|_| ModelLoadError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("parameter {} has invalid value '{}'", name, raw),
    })
}

/// `base_score` is "5E-1" in 1.x/2.x and "[5E-1]" in 3.x.
fn parse_base_score(path: &Path, raw: &str) -> Result<f64, ModelLoadError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next().unwrap_or(trimmed);
    parse_param(path, "base_score", first)
}

fn check_feature_names(names: &[String], config: &ModelConfig) -> Result<(), ModelLoadError> {
    if names.is_empty() {
        return Ok(());
    }

    let mismatch = if names.len() != FEATURE_COUNT {
        Some(format!(
            "model declares {} feature names, the contract has {}",
            names.len(),
            FEATURE_COUNT
        ))
    } else {
        names
            .iter()
            .zip(FEATURE_NAMES.iter())
            .position(|(declared, &expected)| declared != expected)
            .map(|i| {
                format!(
                    "feature {} is '{}' in the model but '{}' in the contract",
                    i, names[i], FEATURE_NAMES[i]
                )
            })
    };

    match mismatch {
        None => Ok(()),
        Some(reason) if config.strict_feature_names => Err(ModelLoadError::Incompatible {
            path: config.path.clone(),
            reason,
        }),
        Some(reason) => {
            warn!(
                path = %config.path.display(),
                reason = %reason,
                "Model feature names disagree with the contract; serving in contract order"
            );
            Ok(())
        }
    }
}

fn compile_tree(
    path: &Path,
    index: usize,
    tree: TreeDocument,
) -> Result<RegressionTree, ModelLoadError> {
    let corrupt = |reason: String| ModelLoadError::Corrupt {
        path: PathBuf::from(path),
        reason: format!("tree {}: {}", index, reason),
    };

    let n = tree.left_children.len();
    if n == 0 {
        return Err(corrupt("no nodes".to_string()));
    }
    if tree.right_children.len() != n
        || tree.split_indices.len() != n
        || tree.split_conditions.len() != n
        || (!tree.default_left.is_empty() && tree.default_left.len() != n)
    {
        return Err(corrupt("node arrays have mismatched lengths".to_string()));
    }
    if tree.split_type.iter().any(|&t| t != 0) {
        return Err(ModelLoadError::Incompatible {
            path: PathBuf::from(path),
            reason: format!("tree {}: categorical splits are not supported", index),
        });
    }

    let child = |raw: i64, node: usize| -> Result<usize, ModelLoadError> {
        usize::try_from(raw)
            .ok()
            .filter(|&c| c < n && c != node)
            .ok_or_else(|| corrupt(format!("node {} has invalid child {}", node, raw)))
    };

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let (left, right) = (tree.left_children[i], tree.right_children[i]);
        if left == -1 {
            if right != -1 {
                return Err(corrupt(format!("node {} has only one child", i)));
            }
            nodes.push(Node::Leaf(tree.split_conditions[i]));
            continue;
        }

        let feature = usize::try_from(tree.split_indices[i])
            .ok()
            .filter(|&f| f < FEATURE_COUNT)
            .ok_or_else(|| {
                corrupt(format!(
                    "node {} splits on feature {} outside the contract",
                    i, tree.split_indices[i]
                ))
            })?;

        nodes.push(Node::Split {
            feature,
            threshold: tree.split_conditions[i],
            left: child(left, i)?,
            right: child(right, i)?,
            default_left: tree.default_left.get(i).map_or(false, |f| f.is_set()),
        });
    }

    // Every reachable node must be entered exactly once, which rules out
    // cycles and keeps evaluation finite.
    let mut visited = vec![false; n];
    let mut stack = vec![0_usize];
    while let Some(i) = stack.pop() {
        if visited[i] {
            return Err(corrupt(format!("node {} is reachable twice", i)));
        }
        visited[i] = true;
        if let Node::Split { left, right, .. } = nodes[i] {
            stack.push(left);
            stack.push(right);
        }
    }

    Ok(RegressionTree { nodes })
}
