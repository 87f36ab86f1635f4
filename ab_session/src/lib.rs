mod config;
pub mod dataset;
pub mod export;
pub mod manual;
pub mod persistence;
pub mod randomizer;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;

pub use crate::config::*;
use crate::dataset::validate_rows;
use crate::persistence::{Gateway, KeyValueStore};

/// Identifies one asynchronous upload. Only the latest ticket may complete.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct UploadTicket(u64);

/// How far a session has got.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

/// The state machine of one survey session on this device.
///
/// Every mutating operation that changes the answers, the notes or the
/// position writes the full snapshot through the gateway.
#[derive(Debug)]
pub struct SurveySession<S: KeyValueStore> {
    settings: SurveySettings,
    gateway: Gateway<S>,
    session_id: String,
    phase: Phase,
    questions: Vec<QuestionRecord>,
    original_labels: Vec<Label>,
    current: usize,
    answers: Vec<Option<Label>>,
    notes: NoteMap,
    upload_seq: u64,
}

impl<S: KeyValueStore> SurveySession<S> {
    /// Opens the session of this device, restoring a saved snapshot if possible.
    ///
    /// A snapshot is restored only when it belongs to the current session id
    /// and its position is within its dataset. Otherwise the session starts idle.
    pub fn open<R: Rng + ?Sized>(store: S, settings: SurveySettings, rng: &mut R) -> SurveySession<S> {
        let mut gateway = Gateway::new(store);
        let session_id = gateway.session_id(rng);
        let saved = gateway.load_progress();
        let mut session = SurveySession {
            settings,
            gateway,
            session_id,
            phase: Phase::Idle,
            questions: Vec::new(),
            original_labels: Vec::new(),
            current: 0,
            answers: Vec::new(),
            notes: NoteMap::new(),
            upload_seq: 0,
        };
        if let Some(progress) = saved {
            session.restore(progress);
        }
        info!(
            "open: session {} in phase {:?}",
            session.session_id, session.phase
        );
        session
    }

    fn restore(&mut self, progress: SessionProgress) {
        if progress.session_id != self.session_id {
            info!(
                "restore: ignoring snapshot of session {}",
                progress.session_id
            );
            return;
        }
        let len = progress.test_data.len();
        if len == 0 || progress.current_question_index >= len {
            info!(
                "restore: ignoring snapshot at {} of {} questions",
                progress.current_question_index, len
            );
            return;
        }
        let mut answers = progress.user_answers;
        answers.resize(len, None);
        for (idx, slot) in answers.iter_mut().enumerate() {
            if let Some(label) = *slot {
                if !progress.test_data[idx].has_label(label) {
                    warn!("restore: dropping answer {} of question {}", label, idx + 1);
                    *slot = None;
                }
            }
        }
        self.questions = progress.test_data;
        self.original_labels = progress.original_labels;
        self.current = progress.current_question_index;
        self.answers = answers;
        self.notes = progress.user_notes;
        self.phase = Phase::InProgress;
        info!(
            "restore: resumed at question {} of {}",
            self.current + 1,
            len
        );
    }

    // ******** Accessors *********

    pub fn settings(&self) -> &SurveySettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    pub fn current_question(&self) -> Option<&QuestionRecord> {
        self.questions.get(self.current)
    }

    pub fn answers(&self) -> &[Option<Label>] {
        &self.answers
    }

    pub fn answer(&self, index: usize) -> Option<Label> {
        self.answers.get(index).copied().flatten()
    }

    pub fn notes(&self) -> &NoteMap {
        &self.notes
    }

    pub fn note(&self, index: usize, label: Label) -> Option<&str> {
        self.notes.get(index, label)
    }

    pub fn original_labels(&self) -> &[Label] {
        &self.original_labels
    }

    pub fn progress(&self) -> Progress {
        Progress {
            answered: self.answers.iter().filter(|a| a.is_some()).count(),
            total: self.questions.len(),
        }
    }

    pub fn store(&self) -> &S {
        self.gateway.store()
    }

    pub fn into_store(self) -> S {
        self.gateway.into_store()
    }

    /// The options of the current question, freshly shuffled.
    ///
    /// Only available while a question is on screen.
    pub fn current_options<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<DisplayOption>> {
        if self.phase != Phase::InProgress {
            return None;
        }
        self.current_question()
            .map(|q| randomizer::shuffle_options(q, rng))
    }

    /// Whether `jump_to(index)` would move: earlier questions and answered
    /// questions are reachable, unanswered later ones are not.
    pub fn can_jump_to(&self, index: usize) -> bool {
        index < self.questions.len() && (index <= self.current || self.answer(index).is_some())
    }

    /// The last submitted result stored on this device.
    pub fn latest_result(&self) -> Option<FinalResult> {
        self.gateway.load_result()
    }

    pub fn snapshot(&self) -> SessionProgress {
        SessionProgress {
            session_id: self.session_id.clone(),
            test_data: self.questions.clone(),
            current_question_index: self.current,
            user_answers: self.answers.clone(),
            user_notes: self.notes.clone(),
            original_labels: self.original_labels.clone(),
        }
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        self.gateway.save_progress(&snapshot);
    }

    fn require(&self, operation: &'static str, allowed: &[Phase]) -> Result<(), SurveyError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(SurveyError::InvalidState {
                operation,
                phase: self.phase,
            })
        }
    }

    fn check_option(&self, index: usize, label: Label) -> Result<(), SurveyError> {
        let q = self
            .questions
            .get(index)
            .ok_or(SurveyError::QuestionOutOfRange {
                index,
                len: self.questions.len(),
            })?;
        if q.has_label(label) {
            Ok(())
        } else {
            Err(SurveyError::UnknownOption { index, label })
        }
    }

    // Answers and notes only go to the question on screen.
    fn check_current(&self, index: usize) -> Result<(), SurveyError> {
        if index == self.current {
            Ok(())
        } else {
            Err(SurveyError::NotCurrentQuestion {
                index,
                current: self.current,
            })
        }
    }

    // ******** Dataset *********

    /// Replaces the dataset with the given rows, if they pass validation.
    ///
    /// On error the previous dataset stays in place.
    pub fn load_dataset(&mut self, rows: &[Row]) -> Result<(), SurveyError> {
        self.require("load a dataset", &[Phase::Idle, Phase::DatasetLoaded])?;
        let ds = validate_rows(rows, &self.settings)?;
        self.answers = vec![None; ds.questions.len()];
        self.questions = ds.questions;
        self.original_labels = ds.original_labels;
        self.notes.clear();
        self.current = 0;
        self.phase = Phase::DatasetLoaded;
        info!("load_dataset: {} questions", self.questions.len());
        Ok(())
    }

    /// Registers the start of an upload. Any earlier upload still being read
    /// becomes stale.
    pub fn begin_upload(&mut self) -> UploadTicket {
        self.upload_seq += 1;
        debug!("begin_upload: ticket {}", self.upload_seq);
        UploadTicket(self.upload_seq)
    }

    /// Applies the rows read for an upload, unless a later upload was begun.
    pub fn complete_upload(&mut self, ticket: UploadTicket, rows: &[Row]) -> Result<(), SurveyError> {
        if ticket.0 != self.upload_seq {
            warn!(
                "complete_upload: ticket {} superseded by {}",
                ticket.0, self.upload_seq
            );
            return Err(SurveyError::StaleUpload(ticket.0));
        }
        self.load_dataset(rows)
    }

    // ******** Navigation *********

    pub fn start(&mut self) -> Result<(), SurveyError> {
        if self.phase == Phase::Idle {
            return Err(SurveyError::EmptyDataset);
        }
        self.require("start", &[Phase::DatasetLoaded])?;
        if self.questions.is_empty() {
            return Err(SurveyError::EmptyDataset);
        }
        self.current = 0;
        self.answers = vec![None; self.questions.len()];
        self.notes.clear();
        self.phase = Phase::InProgress;
        info!("start: {} questions", self.questions.len());
        self.persist();
        Ok(())
    }

    /// Records the chosen canonical label for the current question. Does not move.
    pub fn select_answer(&mut self, index: usize, label: Label) -> Result<(), SurveyError> {
        self.require("select an answer", &[Phase::InProgress])?;
        self.check_option(index, label)?;
        self.check_current(index)?;
        self.answers[index] = Some(label);
        debug!("select_answer: question {} -> {}", index + 1, label);
        self.persist();
        Ok(())
    }

    /// Moves to the next question, or to the submission step after the last one.
    ///
    /// The current question must be answered; otherwise nothing moves.
    pub fn advance(&mut self) -> Result<Phase, SurveyError> {
        self.require("advance", &[Phase::InProgress])?;
        if self.answer(self.current).is_none() {
            return Err(SurveyError::UnansweredQuestion(self.current));
        }
        if self.current + 1 == self.questions.len() {
            self.phase = Phase::AwaitingSubmission;
            info!("advance: all {} questions answered", self.questions.len());
        } else {
            self.current += 1;
        }
        self.persist();
        Ok(self.phase)
    }

    /// Goes back one question. From the submission step, returns to the last question.
    ///
    /// Returns whether the view changed.
    pub fn retreat(&mut self) -> Result<bool, SurveyError> {
        self.require("go back", &[Phase::InProgress, Phase::AwaitingSubmission])?;
        if self.phase == Phase::AwaitingSubmission {
            self.phase = Phase::InProgress;
        } else if self.current > 0 {
            self.current -= 1;
        } else {
            return Ok(false);
        }
        self.persist();
        Ok(true)
    }

    /// Jumps to a question. Skipping ahead into unanswered questions is a no-op.
    ///
    /// Returns whether the view changed.
    pub fn jump_to(&mut self, index: usize) -> Result<bool, SurveyError> {
        self.require(
            "jump to a question",
            &[Phase::InProgress, Phase::AwaitingSubmission],
        )?;
        if !self.can_jump_to(index) {
            debug!("jump_to: question {} is not reachable", index + 1);
            return Ok(false);
        }
        if self.phase == Phase::InProgress && index == self.current {
            return Ok(false);
        }
        self.phase = Phase::InProgress;
        self.current = index;
        self.persist();
        Ok(true)
    }

    // ******** Notes and submission *********

    /// Stores the note of an option, trimmed. An empty note is stored as well.
    ///
    /// Notes are keyed by the annotated label: changing the answer afterwards
    /// leaves the note on the old label, where the export does not look.
    pub fn set_note(&mut self, index: usize, label: Label, text: &str) -> Result<(), SurveyError> {
        self.require(
            "edit a note",
            &[Phase::InProgress, Phase::AwaitingSubmission],
        )?;
        self.check_option(index, label)?;
        self.check_current(index)?;
        self.notes.insert(index, label, text.trim().to_string());
        self.persist();
        Ok(())
    }

    pub fn submit(&mut self, respondent: Respondent) -> Result<FinalResult, SurveyError> {
        self.submit_at(respondent, Utc::now())
    }

    /// Submits the answers with the given timestamp.
    ///
    /// The progress snapshot is left untouched; `reset` clears it.
    pub fn submit_at(
        &mut self,
        respondent: Respondent,
        at: DateTime<Utc>,
    ) -> Result<FinalResult, SurveyError> {
        self.require("submit", &[Phase::AwaitingSubmission])?;
        let nickname = match respondent {
            Respondent::Anonymous => self.settings.anonymous_nickname.clone(),
            Respondent::Named(nick) => {
                let nick = nick.trim();
                if nick.is_empty() {
                    return Err(SurveyError::NicknameRequired);
                }
                nick.to_string()
            }
        };
        let result = FinalResult {
            session_id: self.session_id.clone(),
            nickname,
            upload_time: at,
            test_data: self.questions.clone(),
            user_answers: self.answers.clone(),
            user_notes: self.notes.clone(),
            original_labels: self.original_labels.clone(),
        };
        self.gateway.save_result(&result);
        self.phase = Phase::Submitted;
        info!(
            "submit: session {} submitted by {}",
            self.session_id, result.nickname
        );
        Ok(result)
    }

    /// Drops the session in progress, in memory and on disk. Results are kept.
    pub fn reset(&mut self) {
        self.gateway.clear_progress();
        self.questions.clear();
        self.original_labels.clear();
        self.answers.clear();
        self.notes.clear();
        self.current = 0;
        self.phase = Phase::Idle;
        info!("reset: session {} is idle", self.session_id);
    }

    /// Resets and issues a new session id for this device.
    pub fn forget_device_session<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.reset();
        self.gateway.clear_session_id();
        self.session_id = self.gateway.session_id(rng);
        info!("forget_device_session: new session {}", self.session_id);
    }
}
