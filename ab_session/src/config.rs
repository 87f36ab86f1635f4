// ********* Input data structures ***********

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A row of the uploaded table, mapping each header to the text of its cell.
pub type Row = HashMap<String, String>;

/// The canonical label of a response column.
///
/// The label is the identity of a response: it does not depend on the order
/// in which the responses were shown.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Label {
    A,
    B,
    C,
    D,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::A, Label::B, Label::C, Label::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::A => "A",
            Label::B => "B",
            Label::C => "C",
            Label::D => "D",
        }
    }

    /// The label for a position on screen (0 is `A`).
    pub fn from_position(pos: usize) -> Option<Label> {
        Label::ALL.get(pos).copied()
    }

    /// Reads a label, ignoring surrounding blanks and case.
    pub fn parse(s: &str) -> Option<Label> {
        match s.trim() {
            "A" | "a" => Some(Label::A),
            "B" | "b" => Some(Label::B),
            "C" | "c" => Some(Label::C),
            "D" | "d" => Some(Label::D),
            _ => None,
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One question of the survey, as read from a row of the dataset.
///
/// Only the populated response cells are kept.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(
        rename = "standardQuestion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub standard_question: Option<String>,
    pub responses: BTreeMap<Label, String>,
}

impl QuestionRecord {
    pub fn labels(&self) -> Vec<Label> {
        self.responses.keys().copied().collect()
    }

    pub fn response(&self, label: Label) -> Option<&str> {
        self.responses.get(&label).map(|s| s.as_str())
    }

    pub fn has_label(&self, label: Label) -> bool {
        self.responses.contains_key(&label)
    }
}

/// Who is submitting the results.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Respondent {
    Named(String),
    Anonymous,
}

// ******** Output data structures *********

/// A response as rendered on screen.
///
/// `display_label` is the letter of the slot on screen, `canonical_label` the
/// identity under which the answer is recorded.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DisplayOption {
    pub display_label: Label,
    pub content: String,
    pub canonical_label: Label,
}

/// Free-text notes, keyed by question index and canonical label.
///
/// Stored as a JSON object with keys of the form `"<index>-<label>"`.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct NoteMap(BTreeMap<(usize, Label), String>);

impl NoteMap {
    pub fn new() -> NoteMap {
        NoteMap(BTreeMap::new())
    }

    pub fn insert(&mut self, index: usize, label: Label, note: String) {
        self.0.insert((index, label), note);
    }

    pub fn get(&self, index: usize, label: Label) -> Option<&str> {
        self.0.get(&(index, label)).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Label, &str)> {
        self.0
            .iter()
            .map(|((idx, label), note)| (*idx, *label, note.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }
}

fn note_key(index: usize, label: Label) -> String {
    format!("{}-{}", index, label)
}

fn parse_note_key(key: &str) -> Option<(usize, Label)> {
    let (idx, label) = key.rsplit_once('-')?;
    Some((idx.parse::<usize>().ok()?, Label::parse(label)?))
}

impl Serialize for NoteMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|((idx, label), note)| (note_key(*idx, *label), note)),
        )
    }
}

impl<'de> Deserialize<'de> for NoteMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<NoteMap, D::Error> {
        let raw: BTreeMap<String, String> = BTreeMap::deserialize(deserializer)?;
        let mut notes = BTreeMap::new();
        for (key, note) in raw {
            let k = parse_note_key(&key)
                .ok_or_else(|| D::Error::custom(format!("invalid note key {:?}", key)))?;
            notes.insert(k, note);
        }
        Ok(NoteMap(notes))
    }
}

/// The durable snapshot of a session in progress.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SessionProgress {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "testData", default)]
    pub test_data: Vec<QuestionRecord>,
    #[serde(rename = "currentQuestionIndex", default)]
    pub current_question_index: usize,
    #[serde(rename = "userAnswers", default)]
    pub user_answers: Vec<Option<Label>>,
    #[serde(rename = "userNotes", default)]
    pub user_notes: NoteMap,
    #[serde(rename = "originalLabels", default)]
    pub original_labels: Vec<Label>,
}

/// The submitted results of a session.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub nickname: String,
    #[serde(rename = "uploadTime")]
    pub upload_time: DateTime<Utc>,
    #[serde(rename = "testData")]
    pub test_data: Vec<QuestionRecord>,
    #[serde(rename = "userAnswers")]
    pub user_answers: Vec<Option<Label>>,
    #[serde(rename = "userNotes", default)]
    pub user_notes: NoteMap,
    #[serde(rename = "originalLabels", default)]
    pub original_labels: Vec<Label>,
}

/// The phases of a survey session.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Phase {
    Idle,
    DatasetLoaded,
    InProgress,
    AwaitingSubmission,
    Submitted,
}

/// Errors reported to the user at the point of the failed action.
///
/// None of them is fatal: the session stays usable after any of them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SurveyError {
    /// The uploaded file is neither delimited text nor a spreadsheet.
    UnsupportedFormat(String),
    FileTooLarge {
        size: u64,
        limit: u64,
    },
    /// A required column is absent from the header.
    MissingColumn(String),
    RowLimitExceeded {
        rows: usize,
        limit: usize,
    },
    EmptyDataset,
    /// The question at this index has no recorded answer.
    UnansweredQuestion(usize),
    NicknameRequired,
    InvalidState {
        operation: &'static str,
        phase: Phase,
    },
    QuestionOutOfRange {
        index: usize,
        len: usize,
    },
    /// Answers and notes only apply to the question on screen.
    NotCurrentQuestion {
        index: usize,
        current: usize,
    },
    /// A row leaves a required response empty. Rows count from 1.
    MissingResponse {
        row: usize,
        column: String,
    },
    /// The label is not one of the populated responses of the question.
    UnknownOption {
        index: usize,
        label: Label,
    },
    /// The upload was superseded by a later one.
    StaleUpload(u64),
}

impl Error for SurveyError {}

impl Display for SurveyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurveyError::UnsupportedFormat(name) => {
                write!(f, "unsupported file {:?}: upload a CSV or Excel file", name)
            }
            SurveyError::FileTooLarge { size, limit } => {
                write!(f, "file is {} bytes, the limit is {} bytes", size, limit)
            }
            SurveyError::MissingColumn(col) => write!(f, "missing required column: {}", col),
            SurveyError::RowLimitExceeded { rows, limit } => {
                write!(f, "dataset has {} rows, the limit is {}", rows, limit)
            }
            SurveyError::EmptyDataset => write!(f, "the dataset is empty"),
            SurveyError::UnansweredQuestion(idx) => {
                write!(f, "question {} has no answer yet: choose an option", idx + 1)
            }
            SurveyError::NicknameRequired => {
                write!(f, "enter a nickname or submit anonymously")
            }
            SurveyError::InvalidState { operation, phase } => {
                write!(f, "cannot {} while the session is {:?}", operation, phase)
            }
            SurveyError::QuestionOutOfRange { index, len } => {
                write!(f, "question {} does not exist ({} questions)", index + 1, len)
            }
            SurveyError::NotCurrentQuestion { index, current } => write!(
                f,
                "question {} is not the current question ({})",
                index + 1,
                current + 1
            ),
            SurveyError::MissingResponse { row, column } => {
                write!(f, "row {} has no value in required column {}", row, column)
            }
            SurveyError::UnknownOption { index, label } => {
                write!(f, "question {} has no response {}", index + 1, label)
            }
            SurveyError::StaleUpload(ticket) => {
                write!(f, "upload #{} was superseded by a newer upload", ticket)
            }
        }
    }
}

// ********* Configuration **********

/// The header names of the dataset columns.
///
/// Any header text works (localized headers included); the defaults are the
/// English names.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    pub standard_question: String,
    pub response_a: String,
    pub response_b: String,
    pub response_c: String,
    pub response_d: String,
}

impl ColumnNames {
    pub fn english() -> ColumnNames {
        ColumnNames {
            standard_question: "StandardQuestion".to_string(),
            response_a: "ResponseA".to_string(),
            response_b: "ResponseB".to_string(),
            response_c: "ResponseC".to_string(),
            response_d: "ResponseD".to_string(),
        }
    }

    pub fn chinese() -> ColumnNames {
        ColumnNames {
            standard_question: "标准问题".to_string(),
            response_a: "回复A".to_string(),
            response_b: "回复B".to_string(),
            response_c: "回复C".to_string(),
            response_d: "回复D".to_string(),
        }
    }

    /// A named preset: `en` or `zh`.
    pub fn preset(name: &str) -> Option<ColumnNames> {
        match name {
            "en" => Some(ColumnNames::english()),
            "zh" => Some(ColumnNames::chinese()),
            _ => None,
        }
    }

    pub fn response(&self, label: Label) -> &str {
        match label {
            Label::A => &self.response_a,
            Label::B => &self.response_b,
            Label::C => &self.response_c,
            Label::D => &self.response_d,
        }
    }
}

impl Default for ColumnNames {
    fn default() -> ColumnNames {
        ColumnNames::english()
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveySettings {
    pub columns: ColumnNames,
    pub max_rows: usize,
    pub max_file_bytes: u64,
    /// The nickname recorded for anonymous submissions.
    pub anonymous_nickname: String,
    pub export_file_prefix: String,
    pub export_sheet_name: String,
}

impl SurveySettings {
    pub const DEFAULT_MAX_ROWS: usize = 500;
    pub const DEFAULT_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;
}

impl Default for SurveySettings {
    fn default() -> SurveySettings {
        SurveySettings {
            columns: ColumnNames::default(),
            max_rows: SurveySettings::DEFAULT_MAX_ROWS,
            max_file_bytes: SurveySettings::DEFAULT_MAX_FILE_BYTES,
            anonymous_nickname: "Anonymous".to_string(),
            export_file_prefix: "ab_test_results".to_string(),
            export_sheet_name: "Results".to_string(),
        }
    }
}
