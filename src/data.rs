use crate::error::Result;
use crate::features::StudentForm;
use csv::{ReaderBuilder, Trim};
use std::io::Read;

/// Reads student records laid out like the public "StudentsPerformance"
/// table: `gender, race/ethnicity, parental level of education, lunch,
/// test preparation course, math score, reading score, writing score`.
/// The snake_case field names are accepted as headers too.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<StudentForm>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut records = Vec::new();

    for result in rdr.deserialize() {
        let record: StudentForm = result?;
        records.push(record);
    }

    tracing::debug!(records = records.len(), "Parsed batch CSV");
    Ok(records)
}

pub fn parse_csv_str(data: &str) -> Result<Vec<StudentForm>> {
    parse_csv(data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictorError;

    #[test]
    fn test_parse_dataset_layout() {
        let data = "\
\"gender\",\"race/ethnicity\",\"parental level of education\",\"lunch\",\"test preparation course\",\"math score\",\"reading score\",\"writing score\"
\"female\",\"group B\",\"bachelor's degree\",\"standard\",\"none\",\"72\",\"72\",\"74\"
\"male\",\"group A\",\"associate's degree\",\"free/reduced\",\"none\",\"47\",\"57\",\"44\"
";
        let records = parse_csv_str(data).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].race_ethnicity, "group B");
        assert_eq!(records[0].parental_education, "bachelor's degree");
        assert_eq!(records[1].lunch, "free/reduced");
        assert_eq!(records[1].math_score, 47);
        assert_eq!(records[1].writing_score, 44);
    }

    #[test]
    fn test_parse_snake_case_headers_and_default_scores() {
        let data = "gender,race_ethnicity,parental_education,lunch,test_preparation
male, group E ,master's degree,standard,completed
";
        let records = parse_csv_str(data).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].race_ethnicity, "group E");
        assert_eq!(records[0].reading_score, 50);
    }

    #[test]
    fn test_non_numeric_score_is_invalid_csv() {
        let data = "gender,race/ethnicity,parental level of education,lunch,test preparation course,math score
female,group C,high school,standard,none,eighty
";
        assert!(matches!(parse_csv_str(data), Err(PredictorError::InvalidCsv(_))));
    }

    #[test]
    fn test_missing_column_is_invalid_csv() {
        let data = "gender,lunch\nfemale,standard\n";
        assert!(matches!(parse_csv_str(data), Err(PredictorError::InvalidCsv(_))));
    }
}
