// Parsing of the commands typed at the prompt.

use ab_session::{Label, Respondent};

use crate::survey::export_writer::ExportFormat;
use crate::survey::{AppResult, InvalidCommandSnafu};

pub const HELP: &str = "\
Commands:
  load <file>              load a CSV, XLSX or XLS dataset
  start                    start answering the loaded dataset
  show                     show the current question
  choose <letter>          choose the option shown under this letter
  next | prev              move to the next or previous question
  jump <n>                 go to question n (earlier or answered questions)
  note <letter> <text>     attach a note to an option
  submit <nickname>        submit the answers under a nickname
  submit --anonymous       submit the answers anonymously
  export <csv|xlsx> [dir]  export the last submitted results
  status                   show the progress of the session
  reset                    discard the progress and start over
  forget                   reset and use a new session id
  help | quit";

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Command {
    Load(String),
    Start,
    Show,
    /// A letter as shown on screen, not the canonical label.
    Choose(Label),
    Next,
    Prev,
    /// 0-based question index.
    Jump(usize),
    Note(Label, String),
    Submit(Respondent),
    Export(ExportFormat, Option<String>),
    Status,
    Reset,
    Forget,
    Help,
    Quit,
}

fn invalid<T>(message: String) -> AppResult<T> {
    InvalidCommandSnafu { message }.fail()
}

fn letter(arg: Option<&str>, usage: &str) -> AppResult<Label> {
    match arg.and_then(Label::parse) {
        Some(l) => Ok(l),
        None => invalid(format!("usage: {}", usage)),
    }
}

/// Parses one line. Blank lines give `None`.
pub fn parse_command(line: &str) -> AppResult<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    let arg = if rest.is_empty() { None } else { Some(rest) };

    let cmd = match word.to_lowercase().as_str() {
        "load" => match arg {
            Some(path) => Command::Load(path.to_string()),
            None => return invalid("usage: load <file>".to_string()),
        },
        "start" => Command::Start,
        "show" => Command::Show,
        "choose" | "c" => Command::Choose(letter(arg, "choose <letter>")?),
        "next" | "n" => Command::Next,
        "prev" | "p" => Command::Prev,
        "jump" | "j" => match arg.map(|s| s.parse::<usize>()) {
            Some(Ok(n)) if n >= 1 => Command::Jump(n - 1),
            _ => return invalid("usage: jump <question number, from 1>".to_string()),
        },
        "note" => {
            let (l, text) = match arg.and_then(|a| a.split_once(char::is_whitespace)) {
                Some((l, text)) => (Some(l), text.trim()),
                None => (arg, ""),
            };
            Command::Note(letter(l, "note <letter> <text>")?, text.to_string())
        }
        "submit" => match arg {
            Some("--anonymous") => Command::Submit(Respondent::Anonymous),
            Some(nick) => Command::Submit(Respondent::Named(nick.to_string())),
            None => Command::Submit(Respondent::Named(String::new())),
        },
        "export" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let format = match parts.next().map(|s| s.to_lowercase()).as_deref() {
                Some("csv") => ExportFormat::Csv,
                Some("xlsx") => ExportFormat::Xlsx,
                _ => return invalid("usage: export <csv|xlsx> [dir]".to_string()),
            };
            let dir = parts
                .next()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            Command::Export(format, dir)
        }
        "status" => Command::Status,
        "reset" => Command::Reset,
        "forget" => Command::Forget,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return invalid(format!("unknown command {:?}, type `help`", other)),
    };
    Ok(Some(cmd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::AppError;

    fn parse(line: &str) -> Command {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse("load  data/q.csv "), Command::Load("data/q.csv".to_string()));
        assert_eq!(parse("choose b"), Command::Choose(Label::B));
        assert_eq!(parse("C d"), Command::Choose(Label::D));
        assert_eq!(parse("jump 3"), Command::Jump(2));
        assert_eq!(
            parse("note a  too long, but correct "),
            Command::Note(Label::A, "too long, but correct".to_string())
        );
        assert_eq!(parse("note c"), Command::Note(Label::C, String::new()));
        assert_eq!(parse("submit --anonymous"), Command::Submit(Respondent::Anonymous));
        assert_eq!(
            parse("submit Ann Lee"),
            Command::Submit(Respondent::Named("Ann Lee".to_string()))
        );
        assert_eq!(parse("submit"), Command::Submit(Respondent::Named(String::new())));
        assert_eq!(parse("export XLSX"), Command::Export(ExportFormat::Xlsx, None));
        assert_eq!(
            parse("export csv out/dir"),
            Command::Export(ExportFormat::Csv, Some("out/dir".to_string()))
        );
        assert_eq!(parse("QUIT"), Command::Quit);
    }

    #[test]
    fn rejects_bad_arguments() {
        for line in ["choose", "choose e", "jump 0", "jump x", "export pdf", "load", "note", "dance"] {
            assert!(
                matches!(parse_command(line), Err(AppError::InvalidCommand { .. })),
                "{}",
                line
            );
        }
    }
}
