use crate::analytics::{
    importance_chart, score_chart, top_features, FeatureImportance, ImportanceChart, ScoreChart,
    ScoreSummary, Standing, TOP_FEATURES,
};
use crate::error::{PredictorError, Result};
use crate::features::{self, EncodedFeatureVector, RawInput, StudentForm, MODEL_COLUMNS};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::Serialize;

/// A trained binary classifier over the encoded student features.
pub trait Classifier: Send + Sync {
    /// Number of input columns the classifier was trained on
    fn num_features(&self) -> usize;

    /// Training-time column names, empty when the artifact does not record them
    fn feature_names(&self) -> &[String];

    /// Probability of a pass for each row
    fn predict_proba(&self, features: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Decision rule turning a pass probability into a label
    fn is_pass(&self, probability: f64) -> bool {
        probability > 0.5
    }

    /// Pass/fail label for each row
    fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<bool>> {
        Ok(self.predict_proba(features)?.mapv(|p| self.is_pass(p)))
    }

    /// Built-in importance per column, in column order
    fn feature_importances(&self) -> Array1<f64>;

    fn info(&self) -> ModelInfo;
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub algorithm: String,
    pub objective: String,
    pub num_trees: usize,
    pub num_features: usize,
    pub base_score: f64,
    pub version: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Pass,
    Fail,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub label: Label,
    pub probability_pass: f64,
}

impl PredictionResult {
    /// Confidence in the reported label, as a percentage.
    pub fn certainty(&self) -> f64 {
        match self.label {
            Label::Pass => self.probability_pass * 100.0,
            Label::Fail => 100.0 - self.probability_pass * 100.0,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct PredictionReport {
    pub prediction: Label,
    pub probability_pass: f64,
    pub certainty: f64,
    pub scores: ScoreSummary,
    pub score_chart: ScoreChart,
    pub top_features: Vec<FeatureImportance>,
    pub importance_chart: ImportanceChart,
    pub encoded_columns: Vec<&'static str>,
    pub predicted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct BatchPrediction {
    pub row: usize,
    pub prediction: Label,
    pub probability_pass: f64,
    pub certainty: f64,
    pub average_score: String,
    pub standing: Standing,
}

#[derive(Debug, Serialize, Clone)]
pub struct BatchSummary {
    pub pass_count: usize,
    pub fail_count: usize,
    pub pass_rate: f64,
    pub avg_certainty: f64,
}

#[derive(Debug, Serialize, Clone)]
pub struct BatchReport {
    pub total_students: usize,
    pub predictions: Vec<BatchPrediction>,
    pub summary: BatchSummary,
}

/// Runs the encoder and the classifier for one request. Built once at
/// startup and shared read-only by every worker.
pub struct Predictor {
    classifier: Box<dyn Classifier>,
    top_features: Vec<FeatureImportance>,
}

impl Predictor {
    /// Wraps a classifier after checking it was trained on the encoder's columns.
    pub fn new(classifier: Box<dyn Classifier>) -> Result<Self> {
        check_schema(classifier.as_ref())?;

        let importances = classifier.feature_importances();
        if importances.len() != MODEL_COLUMNS.len() {
            return Err(PredictorError::SchemaMismatch(format!(
                "{} importance scores for {} columns",
                importances.len(),
                MODEL_COLUMNS.len()
            )));
        }
        let top_features = top_features(&MODEL_COLUMNS, importances.as_slice().unwrap_or(&[]), TOP_FEATURES);

        Ok(Predictor {
            classifier,
            top_features,
        })
    }

    pub fn model_info(&self) -> ModelInfo {
        self.classifier.info()
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn top_features(&self) -> &[FeatureImportance] {
        &self.top_features
    }

    /// Label and pass probability for one encoded record.
    pub fn classify(&self, encoded: &EncodedFeatureVector) -> Result<PredictionResult> {
        let results = self.classify_rows(encoded.values().view().insert_axis(Axis(0)))?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| PredictorError::Inference("classifier returned no prediction".to_string()))
    }

    fn classify_rows(&self, rows: ArrayView2<f64>) -> Result<Vec<PredictionResult>> {
        if rows.ncols() != self.classifier.num_features() {
            let err = PredictorError::SchemaMismatch(format!(
                "encoded {} columns, classifier expects {}",
                rows.ncols(),
                self.classifier.num_features()
            ));
            tracing::error!(error = %err, "Refusing to predict");
            return Err(err);
        }

        let proba = self.classifier.predict_proba(rows)?;
        if proba.len() != rows.nrows() {
            return Err(PredictorError::Inference(format!(
                "expected {} predictions, got {}",
                rows.nrows(),
                proba.len()
            )));
        }

        proba
            .iter()
            .map(|&p| {
                if !(0.0..=1.0).contains(&p) {
                    return Err(PredictorError::Inference(format!("probability {p} outside [0, 1]")));
                }
                Ok(PredictionResult {
                    label: if self.classifier.is_pass(p) { Label::Pass } else { Label::Fail },
                    probability_pass: p,
                })
            })
            .collect()
    }

    pub fn predict(&self, input: &RawInput) -> Result<PredictionReport> {
        let encoded = features::encode(input);
        let result = self.classify(&encoded)?;
        let scores = ScoreSummary::new(input.math_score, input.reading_score, input.writing_score);

        tracing::info!(
            prediction = ?result.label,
            probability_pass = result.probability_pass,
            average_score = %scores.average_display,
            "Prediction served"
        );

        Ok(PredictionReport {
            prediction: result.label,
            probability_pass: result.probability_pass,
            certainty: result.certainty(),
            score_chart: score_chart(&scores),
            scores,
            top_features: self.top_features.clone(),
            importance_chart: importance_chart(&self.top_features),
            encoded_columns: encoded.active_columns(),
            predicted_at: Utc::now(),
        })
    }

    pub fn predict_form(&self, form: &StudentForm) -> Result<PredictionReport> {
        let input = RawInput::try_from(form)?;
        self.predict(&input)
    }

    /// Predicts every record in one classifier call. The first invalid
    /// record rejects the whole batch.
    pub fn predict_batch(&self, forms: &[StudentForm]) -> Result<BatchReport> {
        let inputs = forms
            .iter()
            .enumerate()
            .map(|(idx, form)| {
                RawInput::try_from(form).map_err(|e| PredictorError::BatchRecord {
                    row: idx + 1,
                    source: Box::new(e),
                })
            })
            .collect::<Result<Vec<RawInput>>>()?;

        let mut rows = Array2::<f64>::zeros((inputs.len(), MODEL_COLUMNS.len()));
        for (mut row, input) in rows.outer_iter_mut().zip(&inputs) {
            row.assign(&features::encode(input).into_values());
        }

        let results = self.classify_rows(rows.view())?;

        let mut predictions = Vec::with_capacity(results.len());
        let mut pass_count = 0;
        let mut total_certainty = 0.0;

        for (idx, (input, result)) in inputs.iter().zip(results).enumerate() {
            if result.label == Label::Pass {
                pass_count += 1;
            }
            total_certainty += result.certainty();

            let scores = ScoreSummary::new(input.math_score, input.reading_score, input.writing_score);
            predictions.push(BatchPrediction {
                row: idx + 1,
                prediction: result.label,
                probability_pass: result.probability_pass,
                certainty: result.certainty(),
                average_score: scores.average_display,
                standing: scores.standing,
            });
        }

        let total_students = predictions.len();
        tracing::info!(total_students, pass_count, "Batch prediction served");

        Ok(BatchReport {
            total_students,
            predictions,
            summary: BatchSummary {
                pass_count,
                fail_count: total_students - pass_count,
                pass_rate: if total_students > 0 {
                    pass_count as f64 / total_students as f64
                } else {
                    0.0
                },
                avg_certainty: if total_students > 0 {
                    total_certainty / total_students as f64
                } else {
                    0.0
                },
            },
        })
    }
}

fn check_schema(classifier: &dyn Classifier) -> Result<()> {
    if classifier.num_features() != MODEL_COLUMNS.len() {
        return Err(PredictorError::SchemaMismatch(format!(
            "classifier expects {} features, encoder produces {}",
            classifier.num_features(),
            MODEL_COLUMNS.len()
        )));
    }

    let names = classifier.feature_names();
    if names.is_empty() {
        tracing::warn!("Model carries no feature names; assuming the canonical column order");
        return Ok(());
    }

    if let Some((idx, (found, expected))) = names
        .iter()
        .zip(MODEL_COLUMNS.iter())
        .enumerate()
        .find(|(_, (found, expected))| found.as_str() != **expected)
    {
        return Err(PredictorError::SchemaMismatch(format!(
            "column {idx} is '{found}' in the model, '{expected}' in the encoder"
        )));
    }
    Ok(())
}
