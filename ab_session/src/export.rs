// Flattening of submitted results into the export table.

use crate::config::*;

pub const EXPORT_HEADER: [&str; 9] = [
    "Index",
    "StandardQuestion",
    "ResponseA",
    "ResponseB",
    "ResponseC",
    "ResponseD",
    "Choice",
    "Label",
    "Note",
];

/// One exported question, in dataset order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExportRow {
    /// 1-based position of the question in the dataset.
    pub index: usize,
    pub standard_question: String,
    pub responses: [String; 4],
    pub choice: Option<Label>,
    /// Left empty for manual annotation after the export.
    pub label: String,
    pub note: String,
}

impl ExportRow {
    pub fn cells(&self) -> [String; 9] {
        [
            self.index.to_string(),
            self.standard_question.clone(),
            self.responses[0].clone(),
            self.responses[1].clone(),
            self.responses[2].clone(),
            self.responses[3].clone(),
            self.choice.map(|l| l.to_string()).unwrap_or_default(),
            self.label.clone(),
            self.note.clone(),
        ]
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExportTable {
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn header(&self) -> [&'static str; 9] {
        EXPORT_HEADER
    }
}

/// Builds the export table of a result.
///
/// The choice is the canonical label, whatever order the options were shown
/// in. The note is the one attached to the chosen label.
pub fn export_table(result: &FinalResult) -> ExportTable {
    let rows = result
        .test_data
        .iter()
        .enumerate()
        .map(|(idx, q)| {
            let choice = result.user_answers.get(idx).copied().flatten();
            let note = choice
                .and_then(|l| result.user_notes.get(idx, l))
                .unwrap_or_default()
                .to_string();
            ExportRow {
                index: idx + 1,
                standard_question: q.standard_question.clone().unwrap_or_default(),
                responses: Label::ALL.map(|l| q.response(l).unwrap_or_default().to_string()),
                choice,
                label: String::new(),
                note,
            }
        })
        .collect();
    ExportTable { rows }
}

/// The file name of an export, derived from the session id.
pub fn export_file_name(prefix: &str, session_id: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, session_id, extension)
}
