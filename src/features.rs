//! One-hot encoding of the student form into the classifier's column layout.
//!
//! The classifier was trained on a dummy-encoded table with a fixed set of
//! 17 columns. Every categorical field is encoded against its full option
//! set and the result is aligned to [`MODEL_COLUMNS`], so a single record
//! always yields every column, zero-filled where the category was not chosen.

use crate::error::{PredictorError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column order used when the model artifact was trained.
pub const MODEL_COLUMNS: [&str; 17] = [
    "gender_female",
    "gender_male",
    "race/ethnicity_group A",
    "race/ethnicity_group B",
    "race/ethnicity_group C",
    "race/ethnicity_group D",
    "race/ethnicity_group E",
    "parental level of education_associate's degree",
    "parental level of education_bachelor's degree",
    "parental level of education_high school",
    "parental level of education_master's degree",
    "parental level of education_some college",
    "parental level of education_some high school",
    "lunch_free/reduced",
    "lunch_standard",
    "test preparation course_completed",
    "test preparation course_none",
];

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;
pub const DEFAULT_SCORE: i64 = 50;

/// A categorical form field with a closed set of options.
pub trait Category: Copy + PartialEq + Sized + 'static {
    /// Column prefix, as named in the training data.
    const FIELD: &'static str;
    /// Every option, in the order the form lists them.
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn column(&self) -> String {
        format!("{}_{}", Self::FIELD, self.as_str())
    }

    fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| PredictorError::InvalidCategory {
                field: Self::FIELD,
                value: value.to_string(),
            })
    }

    fn options() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "female")]
    Female,
    #[serde(rename = "male")]
    Male,
}

impl Category for Gender {
    const FIELD: &'static str = "gender";
    const ALL: &'static [Self] = &[Gender::Female, Gender::Male];

    fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaceEthnicity {
    #[serde(rename = "group A")]
    GroupA,
    #[serde(rename = "group B")]
    GroupB,
    #[serde(rename = "group C")]
    GroupC,
    #[serde(rename = "group D")]
    GroupD,
    #[serde(rename = "group E")]
    GroupE,
}

impl Category for RaceEthnicity {
    const FIELD: &'static str = "race/ethnicity";
    const ALL: &'static [Self] = &[
        RaceEthnicity::GroupA,
        RaceEthnicity::GroupB,
        RaceEthnicity::GroupC,
        RaceEthnicity::GroupD,
        RaceEthnicity::GroupE,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            RaceEthnicity::GroupA => "group A",
            RaceEthnicity::GroupB => "group B",
            RaceEthnicity::GroupC => "group C",
            RaceEthnicity::GroupD => "group D",
            RaceEthnicity::GroupE => "group E",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentalEducation {
    #[serde(rename = "some high school")]
    SomeHighSchool,
    #[serde(rename = "high school")]
    HighSchool,
    #[serde(rename = "some college")]
    SomeCollege,
    #[serde(rename = "associate's degree")]
    Associates,
    #[serde(rename = "bachelor's degree")]
    Bachelors,
    #[serde(rename = "master's degree")]
    Masters,
}

impl Category for ParentalEducation {
    const FIELD: &'static str = "parental level of education";
    const ALL: &'static [Self] = &[
        ParentalEducation::SomeHighSchool,
        ParentalEducation::HighSchool,
        ParentalEducation::SomeCollege,
        ParentalEducation::Associates,
        ParentalEducation::Bachelors,
        ParentalEducation::Masters,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            ParentalEducation::SomeHighSchool => "some high school",
            ParentalEducation::HighSchool => "high school",
            ParentalEducation::SomeCollege => "some college",
            ParentalEducation::Associates => "associate's degree",
            ParentalEducation::Bachelors => "bachelor's degree",
            ParentalEducation::Masters => "master's degree",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lunch {
    #[serde(rename = "standard")]
    Standard,
    #[serde(rename = "free/reduced")]
    FreeReduced,
}

impl Category for Lunch {
    const FIELD: &'static str = "lunch";
    const ALL: &'static [Self] = &[Lunch::Standard, Lunch::FreeReduced];

    fn as_str(&self) -> &'static str {
        match self {
            Lunch::Standard => "standard",
            Lunch::FreeReduced => "free/reduced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestPreparation {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "completed")]
    Completed,
}

impl Category for TestPreparation {
    const FIELD: &'static str = "test preparation course";
    const ALL: &'static [Self] = &[TestPreparation::None, TestPreparation::Completed];

    fn as_str(&self) -> &'static str {
        match self {
            TestPreparation::None => "none",
            TestPreparation::Completed => "completed",
        }
    }
}

/// Student details exactly as submitted by the form or an API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentForm {
    pub gender: String,
    #[serde(alias = "race/ethnicity")]
    pub race_ethnicity: String,
    #[serde(alias = "parental level of education")]
    pub parental_education: String,
    pub lunch: String,
    #[serde(alias = "test preparation course")]
    pub test_preparation: String,
    #[serde(default = "default_score", alias = "math score")]
    pub math_score: i64,
    #[serde(default = "default_score", alias = "reading score")]
    pub reading_score: i64,
    #[serde(default = "default_score", alias = "writing score")]
    pub writing_score: i64,
}

fn default_score() -> i64 {
    DEFAULT_SCORE
}

/// A validated student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    pub gender: Gender,
    pub race_ethnicity: RaceEthnicity,
    pub parental_education: ParentalEducation,
    pub lunch: Lunch,
    pub test_preparation: TestPreparation,
    pub math_score: u8,
    pub reading_score: u8,
    pub writing_score: u8,
}

fn check_score(field: &'static str, value: i64) -> Result<u8> {
    if (MIN_SCORE..=MAX_SCORE).contains(&value) {
        Ok(value as u8)
    } else {
        Err(PredictorError::ScoreOutOfRange { field, value })
    }
}

impl TryFrom<&StudentForm> for RawInput {
    type Error = PredictorError;

    fn try_from(form: &StudentForm) -> Result<Self> {
        Ok(RawInput {
            gender: Gender::parse(&form.gender)?,
            race_ethnicity: RaceEthnicity::parse(&form.race_ethnicity)?,
            parental_education: ParentalEducation::parse(&form.parental_education)?,
            lunch: Lunch::parse(&form.lunch)?,
            test_preparation: TestPreparation::parse(&form.test_preparation)?,
            math_score: check_score("math score", form.math_score)?,
            reading_score: check_score("reading score", form.reading_score)?,
            writing_score: check_score("writing score", form.writing_score)?,
        })
    }
}

/// Classifier input: one value per entry of [`MODEL_COLUMNS`], same order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector {
    values: Array1<f64>,
}

impl EncodedFeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array1<f64> {
        self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        MODEL_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        MODEL_COLUMNS.iter().copied().zip(self.values.iter().copied())
    }

    /// Names of the columns set to 1.
    pub fn active_columns(&self) -> Vec<&'static str> {
        self.iter()
            .filter(|(_, value)| *value != 0.0)
            .map(|(name, _)| name)
            .collect()
    }
}

/// Encodes one field against every option it can take.
pub fn one_hot<C: Category>(chosen: C) -> Vec<(String, f64)> {
    C::ALL
        .iter()
        .map(|option| (option.column(), if *option == chosen { 1.0 } else { 0.0 }))
        .collect()
}

/// Lays named columns out in [`MODEL_COLUMNS`] order. Missing columns are
/// zero; columns outside the schema are dropped.
pub fn align(columns: &HashMap<String, f64>) -> EncodedFeatureVector {
    for name in columns.keys() {
        if !MODEL_COLUMNS.contains(&name.as_str()) {
            tracing::warn!(column = %name, "Dropping column outside the model schema");
        }
    }

    let values = MODEL_COLUMNS
        .iter()
        .map(|name| columns.get(*name).copied().unwrap_or(0.0))
        .collect::<Vec<f64>>();

    EncodedFeatureVector {
        values: Array1::from_vec(values),
    }
}

pub fn encode(input: &RawInput) -> EncodedFeatureVector {
    let mut columns = HashMap::with_capacity(MODEL_COLUMNS.len());
    columns.extend(one_hot(input.gender));
    columns.extend(one_hot(input.race_ethnicity));
    columns.extend(one_hot(input.parental_education));
    columns.extend(one_hot(input.lunch));
    columns.extend(one_hot(input.test_preparation));
    align(&columns)
}

/// Validates a submitted form and encodes it.
pub fn encode_form(form: &StudentForm) -> Result<EncodedFeatureVector> {
    let input = RawInput::try_from(form)?;
    Ok(encode(&input))
}

/// Option sets for the form controls.
#[derive(Debug, Clone, Serialize)]
pub struct FormOptions {
    pub gender: Vec<&'static str>,
    pub race_ethnicity: Vec<&'static str>,
    pub parental_education: Vec<&'static str>,
    pub lunch: Vec<&'static str>,
    pub test_preparation: Vec<&'static str>,
    pub score_min: i64,
    pub score_max: i64,
    pub score_default: i64,
}

pub fn form_options() -> FormOptions {
    FormOptions {
        gender: Gender::options(),
        race_ethnicity: RaceEthnicity::options(),
        parental_education: ParentalEducation::options(),
        lunch: Lunch::options(),
        test_preparation: TestPreparation::options(),
        score_min: MIN_SCORE,
        score_max: MAX_SCORE,
        score_default: DEFAULT_SCORE,
    }
}
