//! Student Academic Success Predictor.
//!
//! Encodes a student's demographic answers into the fixed 17-column layout a
//! gradient boosted classifier was trained on, runs the classifier and
//! serves the result, with its supporting chart data, from a one-page
//! dashboard.

pub mod analytics;
pub mod api;
pub mod booster;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod model;

pub use booster::GradientBoostedModel;
pub use error::{PredictorError, Result};
pub use features::{encode, EncodedFeatureVector, RawInput, StudentForm, MODEL_COLUMNS};
pub use model::{Classifier, Label, PredictionReport, PredictionResult, Predictor};
