//! Evaluator for gradient-boosted tree ensembles saved in XGBoost's JSON
//! model format (`Booster.save_model("model.json")`).
//!
//! Only the pieces needed for binary classification are read: the `gbtree`
//! booster, the logistic objectives and the per-node split statistics used
//! for feature importance. Anything else is rejected at load time so a
//! mismatched artifact never reaches inference.

use crate::error::{PredictorError, Result};
use crate::model::{Classifier, ModelInfo};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Deserialize)]
struct ModelDocument {
    learner: LearnerDocument,
    #[serde(default)]
    version: Vec<u64>,
}

#[derive(Deserialize)]
struct LearnerDocument {
    #[serde(default)]
    attributes: LearnerAttributes,
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: BoosterDocument,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveDocument,
}

// Written by early stopping.
#[derive(Deserialize, Default)]
struct LearnerAttributes {
    #[serde(default)]
    best_iteration: Option<String>,
}

#[derive(Deserialize)]
struct BoosterDocument {
    name: String,
    #[serde(default)]
    model: Option<EnsembleDocument>,
}

#[derive(Deserialize)]
struct EnsembleDocument {
    #[serde(default)]
    gbtree_model_param: Option<EnsembleParam>,
    #[serde(default)]
    iteration_indptr: Vec<usize>,
    trees: Vec<TreeDocument>,
}

#[derive(Deserialize)]
struct EnsembleParam {
    #[serde(default)]
    num_parallel_tree: Option<String>,
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
    #[serde(default)]
    num_class: Option<String>,
}

#[derive(Deserialize)]
struct ObjectiveDocument {
    name: String,
}

#[derive(Deserialize)]
struct TreeDocument {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    loss_changes: Vec<f64>,
    #[serde(default)]
    sum_hessian: Vec<f64>,
    #[serde(default)]
    split_type: Vec<i64>,
}

// Older writers emit booleans, newer ones 0/1.
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Objective {
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "reg:logistic")]
    RegLogistic,
    #[serde(rename = "binary:logitraw")]
    BinaryLogitRaw,
}

impl Objective {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "binary:logistic" => Ok(Objective::BinaryLogistic),
            "reg:logistic" => Ok(Objective::RegLogistic),
            "binary:logitraw" => Ok(Objective::BinaryLogitRaw),
            other => Err(PredictorError::ModelLoad(format!("unsupported objective '{other}'"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
            Objective::RegLogistic => "reg:logistic",
            Objective::BinaryLogitRaw => "binary:logitraw",
        }
    }

    /// Converts the stored `base_score` into margin space.
    fn base_margin(&self, base_score: f64) -> Result<f64> {
        match self {
            Objective::BinaryLogitRaw => Ok(base_score),
            Objective::BinaryLogistic | Objective::RegLogistic => {
                if base_score <= 0.0 || base_score >= 1.0 {
                    return Err(PredictorError::ModelLoad(format!(
                        "base_score {base_score} must lie strictly between 0 and 1"
                    )));
                }
                Ok((base_score / (1.0 - base_score)).ln())
            }
        }
    }
}

/// Per-feature statistic reported as importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Number of splits on the feature
    Weight,
    /// Average loss reduction of those splits
    Gain,
    TotalGain,
    /// Average hessian sum of the split nodes
    Cover,
    TotalCover,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f32,
    },
    Split {
        feature: usize,
        threshold: f32,
        default_left: bool,
        left: usize,
        right: usize,
        gain: f64,
        cover: f64,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_document(doc: TreeDocument, tree_id: usize, num_features: usize) -> Result<Self> {
        let num_nodes = doc.left_children.len();
        let invalid = |reason: String| PredictorError::ModelLoad(format!("tree {tree_id}: {reason}"));

        if num_nodes == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        let lengths = [
            doc.right_children.len(),
            doc.split_indices.len(),
            doc.split_conditions.len(),
            doc.default_left.len(),
        ];
        if lengths.iter().any(|&len| len != num_nodes) {
            return Err(invalid(format!("node arrays disagree in length ({num_nodes} vs {lengths:?})")));
        }
        if doc.split_type.iter().any(|&t| t != 0) {
            return Err(invalid("categorical splits are not supported".to_string()));
        }

        let mut nodes = Vec::with_capacity(num_nodes);
        for idx in 0..num_nodes {
            let left = doc.left_children[idx];
            let right = doc.right_children[idx];

            if left == -1 {
                nodes.push(Node::Leaf {
                    value: doc.split_conditions[idx],
                });
                continue;
            }

            // Children are always allocated after their parent.
            let child = |c: i64| -> Result<usize> {
                usize::try_from(c)
                    .ok()
                    .filter(|&c| c > idx && c < num_nodes)
                    .ok_or_else(|| invalid(format!("node {idx} has invalid child {c}")))
            };
            let feature = usize::try_from(doc.split_indices[idx])
                .ok()
                .filter(|&f| f < num_features)
                .ok_or_else(|| {
                    invalid(format!(
                        "node {idx} splits on feature {} but the model has {num_features}",
                        doc.split_indices[idx]
                    ))
                })?;

            nodes.push(Node::Split {
                feature,
                threshold: doc.split_conditions[idx],
                default_left: doc.default_left[idx].is_set(),
                left: child(left)?,
                right: child(right)?,
                gain: doc.loss_changes.get(idx).copied().unwrap_or(0.0),
                cover: doc.sum_hessian.get(idx).copied().unwrap_or(0.0),
            });
        }

        Ok(Tree { nodes })
    }

    fn leaf_value(&self, row: ArrayView1<f64>) -> f32 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                    ..
                } => {
                    let value = row[*feature];
                    idx = if value.is_nan() {
                        if *default_left { *left } else { *right }
                    } else if (value as f32) < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// A loaded tree ensemble. Immutable once built.
#[derive(Debug, Clone)]
pub struct GradientBoostedModel {
    trees: Vec<Tree>,
    /// Trees summed at prediction time; all of them unless early stopping recorded a best iteration.
    tree_limit: usize,
    objective: Objective,
    base_score: f64,
    base_margin: f64,
    num_features: usize,
    feature_names: Vec<String>,
    version: Vec<u64>,
}

fn parse_count(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|e| PredictorError::ModelLoad(format!("invalid {name} '{raw}': {e}")))
}

/// Number of leading trees that make up the first `iterations` boosting rounds.
fn trees_for_iterations(
    iterations: usize,
    iteration_indptr: &[usize],
    trees_per_iteration: usize,
    num_trees: usize,
) -> Result<usize> {
    let limit = if iteration_indptr.is_empty() {
        iterations.saturating_mul(trees_per_iteration)
    } else {
        iteration_indptr
            .get(iterations)
            .copied()
            .unwrap_or(num_trees)
    };
    if limit == 0 || limit > num_trees {
        return Err(PredictorError::ModelLoad(format!(
            "best iteration selects {limit} of {num_trees} trees"
        )));
    }
    Ok(limit)
}

fn parse_param(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .parse::<f64>()
        .map_err(|e| PredictorError::ModelLoad(format!("invalid {name} '{raw}': {e}")))
}

impl GradientBoostedModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PredictorError::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = Self::from_reader(BufReader::new(file))?;
        model.log_loaded(path);
        Ok(model)
    }

    /// Reads the artifact without blocking the runtime's worker thread.
    pub async fn load_async(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PredictorError::ModelLoad(format!("{}: {e}", path.display())))?;
        let doc: ModelDocument = serde_json::from_slice(&bytes)?;
        let model = Self::from_document(doc)?;
        model.log_loaded(path);
        Ok(model)
    }

    fn log_loaded(&self, path: &Path) {
        tracing::info!(
            path = %path.display(),
            objective = self.objective.as_str(),
            trees = self.trees.len(),
            tree_limit = self.tree_limit,
            features = self.num_features,
            "Loaded gradient boosted model"
        );
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let doc: ModelDocument = serde_json::from_reader(reader)?;
        Self::from_document(doc)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: ModelDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    fn from_document(doc: ModelDocument) -> Result<Self> {
        let learner = doc.learner;

        if learner.gradient_booster.name != "gbtree" {
            return Err(PredictorError::ModelLoad(format!(
                "unsupported booster '{}'",
                learner.gradient_booster.name
            )));
        }
        let ensemble = learner
            .gradient_booster
            .model
            .ok_or_else(|| PredictorError::ModelLoad("gbtree booster has no model".to_string()))?;

        let params = &learner.learner_model_param;
        if let Some(num_class) = &params.num_class {
            if parse_param("num_class", num_class)? > 1.0 {
                return Err(PredictorError::ModelLoad(format!(
                    "expected a binary classifier, found num_class = {num_class}"
                )));
            }
        }
        let num_features = parse_count("num_feature", &params.num_feature)?;
        let base_score = parse_param("base_score", &params.base_score)?;
        let objective = Objective::parse(&learner.objective.name)?;
        let base_margin = objective.base_margin(base_score)?;

        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_features {
            return Err(PredictorError::ModelLoad(format!(
                "{} feature names for {num_features} features",
                learner.feature_names.len()
            )));
        }

        let trees_per_iteration = match ensemble
            .gbtree_model_param
            .as_ref()
            .and_then(|param| param.num_parallel_tree.as_deref())
        {
            Some(raw) => parse_count("num_parallel_tree", raw)?.max(1),
            None => 1,
        };
        let iteration_indptr = ensemble.iteration_indptr;

        let trees = ensemble
            .trees
            .into_iter()
            .enumerate()
            .map(|(id, tree)| Tree::from_document(tree, id, num_features))
            .collect::<Result<Vec<Tree>>>()?;

        let tree_limit = match learner.attributes.best_iteration.as_deref() {
            Some(raw) => {
                let best_iteration = parse_count("best_iteration", raw)?;
                trees_for_iterations(
                    best_iteration + 1,
                    &iteration_indptr,
                    trees_per_iteration,
                    trees.len(),
                )?
            }
            None => trees.len(),
        };

        Ok(GradientBoostedModel {
            trees,
            tree_limit,
            objective,
            base_score,
            base_margin,
            num_features,
            feature_names: learner.feature_names,
            version: doc.version,
        })
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Trees used for prediction. Smaller than [`num_trees`](Self::num_trees)
    /// for an early-stopped model.
    pub fn tree_limit(&self) -> usize {
        self.tree_limit
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Writer version recorded in the artifact, e.g. `[2, 0, 3]`.
    pub fn version(&self) -> &[u64] {
        &self.version
    }

    fn check_width(&self, ncols: usize) -> Result<()> {
        if ncols != self.num_features {
            return Err(PredictorError::SchemaMismatch(format!(
                "model expects {} features, got {ncols}",
                self.num_features
            )));
        }
        Ok(())
    }

    /// Raw additive score of one row.
    pub fn margin(&self, row: ArrayView1<f64>) -> f64 {
        self.base_margin
            + self
                .trees[..self.tree_limit]
                .iter()
                .map(|tree| f64::from(tree.leaf_value(row)))
                .sum::<f64>()
    }

    pub fn predict_margin(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.check_width(features.ncols())?;
        Ok(features.outer_iter().map(|row| self.margin(row)).collect())
    }

    /// Unnormalized importance per feature, in column order. Unused features score 0.
    pub fn importance(&self, kind: ImportanceType) -> Array1<f64> {
        let mut splits = vec![0.0_f64; self.num_features];
        let mut total_gain = vec![0.0_f64; self.num_features];
        let mut total_cover = vec![0.0_f64; self.num_features];

        for node in self.trees.iter().flat_map(|t| t.nodes.iter()) {
            if let Node::Split {
                feature, gain, cover, ..
            } = node
            {
                splits[*feature] += 1.0;
                total_gain[*feature] += gain;
                total_cover[*feature] += cover;
            }
        }

        let average = |totals: Vec<f64>| -> Vec<f64> {
            totals
                .iter()
                .zip(&splits)
                .map(|(total, count)| if *count > 0.0 { total / count } else { 0.0 })
                .collect()
        };

        let values = match kind {
            ImportanceType::Weight => splits.clone(),
            ImportanceType::Gain => average(total_gain),
            ImportanceType::TotalGain => total_gain,
            ImportanceType::Cover => average(total_cover),
            ImportanceType::TotalCover => total_cover,
        };
        Array1::from_vec(values)
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

impl Classifier for GradientBoostedModel {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_margin(features)?.mapv(sigmoid))
    }

    /// Average gain per feature, normalized to sum to 1.
    fn feature_importances(&self) -> Array1<f64> {
        let gain = self.importance(ImportanceType::Gain);
        let total = gain.sum();
        if total > 0.0 {
            gain / total
        } else {
            gain
        }
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            algorithm: "Gradient Boosted Trees".to_string(),
            objective: self.objective.as_str().to_string(),
            num_trees: self.trees.len(),
            num_features: self.num_features,
            base_score: self.base_score,
            version: self
                .version
                .iter()
                .map(|part| part.to_string())
                .collect::<Vec<String>>()
                .join("."),
        }
    }
}
