use serde::Serialize;

/// Average score at or above which the dashboard shows a "Pass" standing.
pub const PASS_THRESHOLD: f64 = 40.0;

/// Bars shown in the feature importance chart.
pub const TOP_FEATURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Standing {
    Pass,
    Fail,
}

/// The three slider scores and their average. The standing is a display
/// heuristic on the average alone and is reported next to, never instead
/// of, the classifier's own label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub math: u8,
    pub reading: u8,
    pub writing: u8,
    pub average: f64,
    pub average_display: String,
    pub standing: Standing,
}

impl ScoreSummary {
    pub fn new(math: u8, reading: u8, writing: u8) -> Self {
        let average = (f64::from(math) + f64::from(reading) + f64::from(writing)) / 3.0;
        let standing = if average >= PASS_THRESHOLD {
            Standing::Pass
        } else {
            Standing::Fail
        };

        ScoreSummary {
            math,
            reading,
            writing,
            average,
            average_display: format!("{:.2}", average),
            standing,
        }
    }
}

// Chart data structures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreChart {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceChart {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

pub fn score_chart(summary: &ScoreSummary) -> ScoreChart {
    ScoreChart {
        labels: ["Math", "Reading", "Writing", "Average"]
            .iter()
            .map(|label| label.to_string())
            .collect(),
        values: vec![
            f64::from(summary.math),
            f64::from(summary.reading),
            f64::from(summary.writing),
            summary.average,
        ],
        threshold: PASS_THRESHOLD,
    }
}

/// The `k` most important features, highest first. Equal scores keep
/// column order.
pub fn top_features<S: AsRef<str>>(names: &[S], importances: &[f64], k: usize) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances.iter())
        .map(|(name, &importance)| FeatureImportance {
            feature: name.as_ref().to_string(),
            importance,
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(k);
    ranked
}

pub fn importance_chart(features: &[FeatureImportance]) -> ImportanceChart {
    ImportanceChart {
        labels: features.iter().map(|f| f.feature.clone()).collect(),
        values: features.iter().map(|f| f.importance).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_and_display() {
        let summary = ScoreSummary::new(70, 80, 75);
        assert_eq!(summary.average, 75.0);
        assert_eq!(summary.average_display, "75.00");
        assert_eq!(summary.standing, Standing::Pass);

        let summary = ScoreSummary::new(40, 41, 41);
        assert_eq!(summary.average_display, "40.67");
    }

    #[test]
    fn test_standing_threshold_is_inclusive() {
        assert_eq!(ScoreSummary::new(40, 40, 40).standing, Standing::Pass);
        assert_eq!(ScoreSummary::new(40, 40, 39).standing, Standing::Fail);
        assert_eq!(ScoreSummary::new(0, 0, 0).average_display, "0.00");
    }

    #[test]
    fn test_score_chart_includes_average_and_threshold() {
        let chart = score_chart(&ScoreSummary::new(10, 20, 60));
        assert_eq!(chart.labels, vec!["Math", "Reading", "Writing", "Average"]);
        assert_eq!(chart.values, vec![10.0, 20.0, 60.0, 30.0]);
        assert_eq!(chart.threshold, 40.0);
    }

    #[test]
    fn test_top_features_sorted_descending_with_stable_ties() {
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        let importances = [0.1, 0.3, 0.1, 0.0, 0.3, 0.2, 0.0];

        let top = top_features(&names, &importances, TOP_FEATURES);
        let order: Vec<&str> = top.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "e", "f", "a", "c"]);
    }

    #[test]
    fn test_top_features_with_fewer_columns_than_k() {
        let top = top_features(&["only"], &[1.0], TOP_FEATURES);
        assert_eq!(top.len(), 1);

        let chart = importance_chart(&top);
        assert_eq!(chart.labels, vec!["only"]);
        assert_eq!(chart.values, vec![1.0]);
    }
}
