use log::{debug, info, warn};

use ab_session::dataset::{admit_upload, UploadFormat};
use ab_session::persistence::KeyValueStore;
use ab_session::randomizer::loading_steps;
use ab_session::*;
use snafu::{prelude::*, Snafu};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::args::Args;
use crate::survey::config_reader::{build_settings, read_config, SurveyConfig};
use crate::survey::export_writer::write_export;
use crate::survey::file_store::FileStore;
use crate::survey::io_csv::read_csv_rows;
use crate::survey::io_excel::read_excel_rows;
use crate::survey::repl::{parse_command, Command, HELP};

pub mod config_reader;
pub mod export_writer;
pub mod file_store;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod repl;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile { source: io::Error, path: String },
    #[snafu(display("Error writing file {path}"))]
    WritingFile { source: io::Error, path: String },
    #[snafu(display("Cannot create the store directory {path}"))]
    CreatingStore { source: io::Error, path: String },
    #[snafu(display("Error parsing CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error writing CSV"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Error writing CSV"))]
    WritingCsvBuffer { source: io::Error },
    #[snafu(display("Error opening the Excel workbook"))]
    OpeningExcel { source: calamine::XlsxError },
    #[snafu(display("Error opening the Excel 97-2003 workbook"))]
    OpeningXls { source: calamine::XlsError },
    #[snafu(display("The workbook has no worksheet"))]
    EmptyExcel {},
    #[snafu(display("Error writing the Excel workbook"))]
    WritingExcel { source: rust_xlsxwriter::XlsxError },
    #[snafu(display("Error opening configuration {path}"))]
    OpeningJson { source: io::Error, path: String },
    #[snafu(display("Error parsing configuration"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error reading the terminal"))]
    ReadingInput { source: io::Error },
    #[snafu(context(false), display("{source}"))]
    Survey { source: SurveyError },
    #[snafu(display("No submitted results on this device yet"))]
    NoResult {},
    #[snafu(display("{message}"))]
    InvalidCommand { message: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;

/// What the loop should do after a command.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Outcome {
    Continue(String),
    Quit,
}

/// The terminal front end of a survey session.
///
/// The options of a question are shuffled every time the question is put on
/// screen. The letters typed by the user refer to the last order shown.
pub struct App<S: KeyValueStore> {
    session: SurveySession<S>,
    rng: StdRng,
    shown: Option<(usize, Vec<DisplayOption>)>,
    out_dir: PathBuf,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: S, settings: SurveySettings, mut rng: StdRng, out_dir: PathBuf) -> App<S> {
        let session = SurveySession::open(store, settings, &mut rng);
        App {
            session,
            rng,
            shown: None,
            out_dir,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &SurveySession<S> {
        &self.session
    }

    /// Reads a dataset from disk and loads it in the session.
    ///
    /// The file is admitted on its name and size before its content is read.
    pub fn upload_file(&mut self, path: &str) -> AppResult<usize> {
        let p = Path::new(path);
        let meta = fs::metadata(p).context(OpeningFileSnafu { path })?;
        let file_name = p
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        let format = admit_upload(&file_name, None, meta.len(), self.session.settings())?;
        let ticket = self.session.begin_upload();
        info!("upload_file: reading {:?} as {:?}", path, format);
        let content = fs::read(p).context(OpeningFileSnafu { path })?;
        let rows = match format {
            UploadFormat::Csv => read_csv_rows(&content)?,
            UploadFormat::Xlsx | UploadFormat::Xls => read_excel_rows(content, format)?,
        };
        self.session.complete_upload(ticket, &rows)?;
        self.shown = None;
        Ok(self.session.questions().len())
    }

    pub fn execute(&mut self, cmd: Command) -> AppResult<Outcome> {
        debug!("execute: {:?}", cmd);
        let msg = match cmd {
            Command::Load(path) => {
                let n = self.upload_file(&path)?;
                format!("Loaded {} questions. Type `start` to begin.", n)
            }
            Command::Start => {
                self.session.start()?;
                let bar = render_loading(&loading_steps(&mut self.rng));
                format!("{}\n\n{}", bar, self.show_current())
            }
            Command::Show => self.show_current(),
            Command::Choose(display) => {
                let index = self.session.current_index();
                let label = self.canonical(index, display, "select an answer")?;
                self.session.select_answer(index, label)?;
                self.render_shown()
            }
            Command::Next => {
                self.session.advance()?;
                self.show_current()
            }
            Command::Prev => {
                if self.session.retreat()? {
                    self.show_current()
                } else {
                    "Already at the first question.".to_string()
                }
            }
            Command::Jump(index) => {
                if self.session.jump_to(index)? {
                    self.show_current()
                } else if index >= self.session.questions().len() {
                    return Err(SurveyError::QuestionOutOfRange {
                        index,
                        len: self.session.questions().len(),
                    }
                    .into());
                } else {
                    format!(
                        "Question {} cannot be reached yet: answer the questions before it.",
                        index + 1
                    )
                }
            }
            Command::Note(display, text) => {
                let index = self.session.current_index();
                let label = self.canonical(index, display, "edit a note")?;
                self.session.set_note(index, label, &text)?;
                format!("Note saved on option {}.", display)
            }
            Command::Submit(respondent) => {
                let result = self.session.submit(respondent)?;
                format!(
                    "Thank you, {}! Results saved for session {}. Type `export csv` or `export xlsx`.",
                    result.nickname, result.session_id
                )
            }
            Command::Export(format, dir) => {
                let result = self.session.latest_result().context(NoResultSnafu {})?;
                let dir = dir.map(PathBuf::from).unwrap_or_else(|| self.out_dir.clone());
                let path = write_export(&result, format, &dir, self.session.settings())?;
                format!("Exported to {}", path.display())
            }
            Command::Status => self.render_status(),
            Command::Reset => {
                self.session.reset();
                self.shown = None;
                "Progress cleared. Load a dataset to start again.".to_string()
            }
            Command::Forget => {
                self.session.forget_device_session(&mut self.rng);
                self.shown = None;
                format!("New session {}.", self.session.session_id())
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Outcome::Quit),
        };
        Ok(Outcome::Continue(msg))
    }

    // The canonical label behind a letter of the last order shown.
    fn canonical(
        &self,
        index: usize,
        display: Label,
        operation: &'static str,
    ) -> AppResult<Label> {
        let phase = self.session.phase();
        if phase != Phase::InProgress && phase != Phase::AwaitingSubmission {
            return Err(SurveyError::InvalidState { operation, phase }.into());
        }
        let options = match &self.shown {
            Some((idx, options)) if *idx == index => options,
            _ => {
                return InvalidCommandSnafu {
                    message: "type `show` to display the question first",
                }
                .fail()
            }
        };
        options
            .iter()
            .find(|o| o.display_label == display)
            .map(|o| o.canonical_label)
            .context(InvalidCommandSnafu {
                message: format!("option {} is not on screen", display),
            })
    }

    /// Puts the current view on screen, shuffling the options of the question.
    pub fn show_current(&mut self) -> String {
        match self.session.phase() {
            Phase::Idle => "No dataset loaded. Type `load <file>`.".to_string(),
            Phase::DatasetLoaded => format!(
                "{} questions loaded. Type `start` to begin.",
                self.session.questions().len()
            ),
            Phase::InProgress => {
                let index = self.session.current_index();
                self.shown = self
                    .session
                    .current_options(&mut self.rng)
                    .map(|options| (index, options));
                self.render_shown()
            }
            Phase::AwaitingSubmission => format!(
                "All {} questions answered.\nType `submit <nickname>` or `submit --anonymous`, or `prev` to review.",
                self.session.questions().len()
            ),
            Phase::Submitted => {
                "Results submitted. Type `export csv` or `export xlsx`, or `reset`.".to_string()
            }
        }
    }

    fn render_shown(&self) -> String {
        let (index, options) = match &self.shown {
            Some(x) => x,
            None => return String::new(),
        };
        let total = self.session.questions().len();
        let mut lines: Vec<String> = vec![format!("Question {}/{}", index + 1, total)];
        if let Some(q) = self
            .session
            .questions()
            .get(*index)
            .and_then(|q| q.standard_question.as_ref())
        {
            lines.push(q.clone());
        }
        lines.push(String::new());
        let answer = self.session.answer(*index);
        for o in options {
            let mark = if answer == Some(o.canonical_label) {
                "*"
            } else {
                " "
            };
            lines.push(format!("{} {}) {}", mark, o.display_label, o.content));
            if let Some(note) = self
                .session
                .note(*index, o.canonical_label)
                .filter(|n| !n.is_empty())
            {
                lines.push(format!("     note: {}", note));
            }
        }
        lines.join("\n")
    }

    fn render_status(&self) -> String {
        let progress = self.session.progress();
        let current = self.session.current_index();
        let in_progress = self.session.phase() == Phase::InProgress;
        let dots: String = (0..progress.total)
            .map(|idx| {
                if in_progress && idx == current {
                    '>'
                } else if self.session.answer(idx).is_some() {
                    '#'
                } else {
                    '.'
                }
            })
            .collect();
        format!(
            "Session {} ({:?})\n[{}] {}/{} answered",
            self.session.session_id(),
            self.session.phase(),
            dots,
            progress.answered,
            progress.total
        )
    }
}

fn render_loading(steps: &[u8]) -> String {
    let parts: Vec<String> = steps.iter().map(|s| format!("{}%", s)).collect();
    format!("Preparing questions... {}", parts.join(" "))
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

/// Runs the interactive survey on the terminal until `quit` or end of input.
pub fn run_survey(args: &Args) -> AppResult<()> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => SurveyConfig::default(),
    };
    info!("config: {:?}", config);
    let settings = build_settings(&config, args.columns.as_deref())?;
    let store = FileStore::open(&args.store_dir)?;
    let out_dir = PathBuf::from(args.out.clone().unwrap_or_else(|| ".".to_string()));
    let mut app = App::new(store, settings, make_rng(args.seed), out_dir);

    if let Some(input) = &args.input {
        match app.execute(Command::Load(input.clone())) {
            Ok(Outcome::Continue(msg)) => println!("{}", msg),
            Ok(Outcome::Quit) => return Ok(()),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    println!("{}", app.show_current());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        // A prompt that fails to flush is only cosmetic.
        if let Err(e) = io::stdout().flush() {
            debug!("run_survey: flush failed: {:?}", e);
        }
        let line = match lines.next() {
            Some(l) => l.context(ReadingInputSnafu {})?,
            None => break,
        };
        let res = parse_command(&line).and_then(|cmd| match cmd {
            Some(c) => app.execute(c),
            None => Ok(Outcome::Continue(String::new())),
        });
        match res {
            Ok(Outcome::Continue(msg)) => {
                if !msg.is_empty() {
                    println!("{}", msg);
                }
            }
            Ok(Outcome::Quit) => break,
            Err(e) => {
                warn!("run_survey: {:?}", e);
                eprintln!("Error: {}", e);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_session::persistence::MemoryStore;
    use crate::survey::export_writer::ExportFormat;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn app(dir: &Path) -> App<MemoryStore> {
        App::new(
            MemoryStore::new(),
            SurveySettings::default(),
            StdRng::seed_from_u64(7),
            dir.to_path_buf(),
        )
    }

    fn write_dataset(dir: &Path) -> String {
        let p = dir.join("data.csv");
        fs::write(
            &p,
            "StandardQuestion,ResponseA,ResponseB,ResponseC\n\
             capital of France?,Paris,Lyon,\n\
             2+2?,4,5,22\n",
        )
        .unwrap();
        p.display().to_string()
    }

    fn msg(o: Outcome) -> String {
        match o {
            Outcome::Continue(m) => m,
            Outcome::Quit => panic!("unexpected quit"),
        }
    }

    fn letter_of(app: &App<MemoryStore>, canonical: Label) -> Label {
        let (_, options) = app.shown.as_ref().unwrap();
        options
            .iter()
            .find(|o| o.canonical_label == canonical)
            .unwrap()
            .display_label
    }

    #[test]
    fn full_session_through_export() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = write_dataset(dir.path());
        let mut app = app(dir.path());

        let loaded = msg(app.execute(Command::Load(path)).unwrap());
        assert!(loaded.contains("Loaded 2 questions"));
        let started = msg(app.execute(Command::Start).unwrap());
        assert!(started.contains("100%"));
        assert!(started.contains("Question 1/2"));
        assert_eq!(app.shown.as_ref().unwrap().1.len(), 2);

        assert!(matches!(
            app.execute(Command::Next),
            Err(AppError::Survey {
                source: SurveyError::UnansweredQuestion(0)
            })
        ));

        let a = letter_of(&app, Label::B);
        app.execute(Command::Choose(a)).unwrap();
        app.execute(Command::Note(a, "close enough".to_string()))
            .unwrap();
        assert_eq!(app.session().answer(0), Some(Label::B));
        assert_eq!(app.session().note(0, Label::B), Some("close enough"));

        app.execute(Command::Next).unwrap();
        assert_eq!(app.shown.as_ref().unwrap().1.len(), 3);
        let c = letter_of(&app, Label::C);
        app.execute(Command::Choose(c)).unwrap();
        let done = msg(app.execute(Command::Next).unwrap());
        assert!(done.contains("All 2 questions answered"));

        let thanks = msg(app
            .execute(Command::Submit(Respondent::Named(" ann ".to_string())))
            .unwrap());
        assert!(thanks.contains("ann"));

        let exported = msg(app
            .execute(Command::Export(ExportFormat::Csv, None))
            .unwrap());
        assert!(exported.contains("ab_test_results_"));
        let file = dir.path().join(format!(
            "ab_test_results_{}.csv",
            app.session().session_id()
        ));
        let text = fs::read_to_string(file).unwrap();
        assert!(text.contains("\"1\",\"capital of France?\",\"Paris\",\"Lyon\",\"\",\"\",\"B\",\"\",\"close enough\""));
        assert!(text.contains("\"2\",\"2+2?\",\"4\",\"5\",\"22\",\"\",\"C\",\"\",\"\""));
    }

    #[test]
    fn letters_need_a_question_on_screen() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert!(matches!(
            app.execute(Command::Choose(Label::A)),
            Err(AppError::Survey {
                source: SurveyError::InvalidState { .. }
            })
        ));

        let path = write_dataset(dir.path());
        app.execute(Command::Load(path)).unwrap();
        app.execute(Command::Start).unwrap();
        // Only two options on the first question.
        assert!(matches!(
            app.execute(Command::Choose(Label::C)),
            Err(AppError::InvalidCommand { .. })
        ));
        app.shown = None;
        assert!(matches!(
            app.execute(Command::Choose(Label::A)),
            Err(AppError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn jumps_ahead_are_refused() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = write_dataset(dir.path());
        let mut app = app(dir.path());
        app.execute(Command::Load(path)).unwrap();
        app.execute(Command::Start).unwrap();
        let out = msg(app.execute(Command::Jump(1)).unwrap());
        assert!(out.contains("cannot be reached"));
        assert!(matches!(
            app.execute(Command::Jump(5)),
            Err(AppError::Survey {
                source: SurveyError::QuestionOutOfRange { index: 5, len: 2 }
            })
        ));
        let back = msg(app.execute(Command::Prev).unwrap());
        assert!(back.contains("first question"));
    }

    #[test]
    fn uploads_are_admitted_before_reading() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let txt = dir.path().join("data.txt");
        fs::write(&txt, "ResponseA,ResponseB\nx,y\n").unwrap();
        assert!(matches!(
            app.upload_file(&txt.display().to_string()),
            Err(AppError::Survey {
                source: SurveyError::UnsupportedFormat(_)
            })
        ));
        assert!(matches!(
            app.upload_file(&dir.path().join("missing.csv").display().to_string()),
            Err(AppError::OpeningFile { .. })
        ));
        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "ResponseA\nx\n").unwrap();
        assert!(matches!(
            app.upload_file(&bad.display().to_string()),
            Err(AppError::Survey {
                source: SurveyError::MissingColumn(_)
            })
        ));
        assert_eq!(app.session().phase(), Phase::Idle);
    }

    #[test]
    fn export_needs_a_result() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert!(matches!(
            app.execute(Command::Export(ExportFormat::Xlsx, None)),
            Err(AppError::NoResult {})
        ));
    }

    #[test]
    fn status_and_reset() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = write_dataset(dir.path());
        let mut app = app(dir.path());
        app.execute(Command::Load(path)).unwrap();
        app.execute(Command::Start).unwrap();
        let a = letter_of(&app, Label::A);
        app.execute(Command::Choose(a)).unwrap();
        let status = msg(app.execute(Command::Status).unwrap());
        assert!(status.contains("[>.] 1/2 answered"));

        let id = app.session().session_id().to_string();
        app.execute(Command::Reset).unwrap();
        assert_eq!(app.session().phase(), Phase::Idle);
        assert_eq!(app.session().session_id(), id);
        app.execute(Command::Forget).unwrap();
        assert_ne!(app.session().session_id(), id);
        assert_eq!(app.execute(Command::Quit).unwrap(), Outcome::Quit);
    }
}
