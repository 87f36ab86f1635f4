// Admission and validation of uploaded datasets.

use log::{debug, info};
use std::collections::BTreeMap;

use crate::config::*;

/// The container format of an upload.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UploadFormat {
    Csv,
    Xlsx,
    Xls,
}

const MIME_CSV: &str = "text/csv";
const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const MIME_XLS: &str = "application/vnd.ms-excel";

/// Decides whether an upload can be parsed at all, before reading its content.
///
/// The declared media type wins when present; otherwise the file extension is used.
pub fn admit_upload(
    file_name: &str,
    declared_type: Option<&str>,
    size: u64,
    settings: &SurveySettings,
) -> Result<UploadFormat, SurveyError> {
    let format = match declared_type.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(MIME_CSV) => UploadFormat::Csv,
        Some(MIME_XLSX) => UploadFormat::Xlsx,
        Some(MIME_XLS) => UploadFormat::Xls,
        Some(other) => {
            debug!("admit_upload: rejected media type {:?}", other);
            return Err(SurveyError::UnsupportedFormat(file_name.to_string()));
        }
        None => format_from_extension(file_name)
            .ok_or_else(|| SurveyError::UnsupportedFormat(file_name.to_string()))?,
    };
    if size > settings.max_file_bytes {
        return Err(SurveyError::FileTooLarge {
            size,
            limit: settings.max_file_bytes,
        });
    }
    Ok(format)
}

fn format_from_extension(file_name: &str) -> Option<UploadFormat> {
    let lower = file_name.to_lowercase();
    let (_, ext) = lower.rsplit_once('.')?;
    match ext {
        "csv" => Some(UploadFormat::Csv),
        "xlsx" => Some(UploadFormat::Xlsx),
        "xls" => Some(UploadFormat::Xls),
        _ => None,
    }
}

/// A validated dataset.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Dataset {
    pub questions: Vec<QuestionRecord>,
    pub original_labels: Vec<Label>,
}

/// Checks the rows of an upload and turns them into questions.
///
/// The checks run in order: empty dataset, missing `ResponseA`, missing
/// `ResponseB`, too many rows, then every row must fill `ResponseA` and `ResponseB`.
pub fn validate_rows(rows: &[Row], settings: &SurveySettings) -> Result<Dataset, SurveyError> {
    let first = rows.first().ok_or(SurveyError::EmptyDataset)?;
    let columns = &settings.columns;
    for required in [Label::A, Label::B] {
        let name = columns.response(required);
        if !first.contains_key(name) {
            return Err(SurveyError::MissingColumn(name.to_string()));
        }
    }
    if rows.len() > settings.max_rows {
        return Err(SurveyError::RowLimitExceeded {
            rows: rows.len(),
            limit: settings.max_rows,
        });
    }

    let mut questions: Vec<QuestionRecord> = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let q = question_from_row(row, columns);
        for required in [Label::A, Label::B] {
            if !q.has_label(required) {
                debug!("validate_rows: row {} lacks {}", idx + 1, required);
                return Err(SurveyError::MissingResponse {
                    row: idx + 1,
                    column: columns.response(required).to_string(),
                });
            }
        }
        questions.push(q);
    }
    let original_labels = original_labels(first, columns);
    info!(
        "validate_rows: accepted {} questions, labels {:?}",
        questions.len(),
        original_labels
    );
    Ok(Dataset {
        questions,
        original_labels,
    })
}

fn populated<'a>(row: &'a Row, col: &str) -> Option<&'a str> {
    row.get(col)
        .map(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
}

fn question_from_row(row: &Row, columns: &ColumnNames) -> QuestionRecord {
    let responses: BTreeMap<Label, String> = Label::ALL
        .iter()
        .filter_map(|label| {
            populated(row, columns.response(*label)).map(|s| (*label, s.to_string()))
        })
        .collect();
    QuestionRecord {
        standard_question: populated(row, &columns.standard_question).map(|s| s.to_string()),
        responses,
    }
}

/// The labels whose column is populated in the given row.
pub fn original_labels(row: &Row, columns: &ColumnNames) -> Vec<Label> {
    Label::ALL
        .iter()
        .filter(|label| populated(row, columns.response(**label)).is_some())
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> Row {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn rows_become_questions_in_order() {
        let rows: Vec<Row> = (0..3)
            .map(|i| {
                row(&[
                    ("StandardQuestion", format!("q{}", i).as_str()),
                    ("ResponseA", format!("a{}", i).as_str()),
                    ("ResponseB", format!("b{}", i).as_str()),
                ])
            })
            .collect();
        let ds = validate_rows(&rows, &SurveySettings::default()).unwrap();
        assert_eq!(ds.questions.len(), 3);
        assert_eq!(ds.questions[2].standard_question.as_deref(), Some("q2"));
        assert_eq!(ds.questions[1].response(Label::A), Some("a1"));
        assert_eq!(ds.original_labels, vec![Label::A, Label::B]);
    }

    #[test]
    fn empty_cells_are_not_responses() {
        let rows = vec![row(&[
            ("StandardQuestion", ""),
            ("ResponseA", "x"),
            ("ResponseB", "y"),
            ("ResponseC", "z"),
            ("ResponseD", "  "),
        ])];
        let ds = validate_rows(&rows, &SurveySettings::default()).unwrap();
        assert_eq!(ds.questions[0].standard_question, None);
        assert_eq!(ds.questions[0].labels(), vec![Label::A, Label::B, Label::C]);
        assert_eq!(ds.original_labels, vec![Label::A, Label::B, Label::C]);
    }

    #[test]
    fn validation_order() {
        let settings = SurveySettings::default();
        assert_eq!(
            validate_rows(&[], &settings),
            Err(SurveyError::EmptyDataset)
        );
        let no_a = vec![row(&[("ResponseB", "y")])];
        assert_eq!(
            validate_rows(&no_a, &settings),
            Err(SurveyError::MissingColumn("ResponseA".to_string()))
        );
        let no_b = vec![row(&[("ResponseA", "x")])];
        assert_eq!(
            validate_rows(&no_b, &settings),
            Err(SurveyError::MissingColumn("ResponseB".to_string()))
        );
        let too_many: Vec<Row> = (0..501)
            .map(|_| row(&[("ResponseA", "x"), ("ResponseB", "y")]))
            .collect();
        assert_eq!(
            validate_rows(&too_many, &settings),
            Err(SurveyError::RowLimitExceeded {
                rows: 501,
                limit: 500
            })
        );
        assert!(validate_rows(&too_many[..500], &settings).is_ok());
    }

    #[test]
    fn rows_need_both_required_responses() {
        let settings = SurveySettings::default();
        let blank = vec![row(&[("ResponseA", ""), ("ResponseB", " ")])];
        assert_eq!(
            validate_rows(&blank, &settings),
            Err(SurveyError::MissingResponse {
                row: 1,
                column: "ResponseA".to_string()
            })
        );
        let rows = vec![
            row(&[("ResponseA", "x"), ("ResponseB", "y")]),
            row(&[("ResponseA", "x"), ("ResponseB", ""), ("ResponseC", "z")]),
        ];
        assert_eq!(
            validate_rows(&rows, &settings),
            Err(SurveyError::MissingResponse {
                row: 2,
                column: "ResponseB".to_string()
            })
        );
    }

    #[test]
    fn localized_headers() {
        let settings = SurveySettings {
            columns: ColumnNames::chinese(),
            ..SurveySettings::default()
        };
        let rows = vec![row(&[("回复A", "x"), ("回复B", "y")])];
        let ds = validate_rows(&rows, &settings).unwrap();
        assert_eq!(ds.questions[0].response(Label::B), Some("y"));
        let english = vec![row(&[("ResponseA", "x"), ("ResponseB", "y")])];
        assert_eq!(
            validate_rows(&english, &settings),
            Err(SurveyError::MissingColumn("回复A".to_string()))
        );
    }

    #[test]
    fn admission() {
        let settings = SurveySettings::default();
        assert_eq!(
            admit_upload("data.CSV", None, 10, &settings),
            Ok(UploadFormat::Csv)
        );
        assert_eq!(
            admit_upload("data.bin", Some(MIME_XLSX), 10, &settings),
            Ok(UploadFormat::Xlsx)
        );
        assert_eq!(
            admit_upload("data.xls", None, 10, &settings),
            Ok(UploadFormat::Xls)
        );
        assert_eq!(
            admit_upload("data.csv", Some("application/json"), 10, &settings),
            Err(SurveyError::UnsupportedFormat("data.csv".to_string()))
        );
        assert_eq!(
            admit_upload("notes.txt", None, 10, &settings),
            Err(SurveyError::UnsupportedFormat("notes.txt".to_string()))
        );
        let limit = SurveySettings::DEFAULT_MAX_FILE_BYTES;
        assert!(admit_upload("data.csv", None, limit, &settings).is_ok());
        assert_eq!(
            admit_upload("data.csv", None, limit + 1, &settings),
            Err(SurveyError::FileTooLarge {
                size: limit + 1,
                limit
            })
        );
    }
}
