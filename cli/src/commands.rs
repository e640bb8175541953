use tutor_core::{Level, Subject, ValidationError};

/// One line typed in interactive mode
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Exit,
    Reset,
    History,
    Help,
    Plan { subject: Subject, level: Level },
    /// Anything that is not a slash command: a new question or a follow-up
    Text(String),
}

impl Command {
    /// Returns `None` for blank lines
    pub fn parse(line: &str) -> Result<Option<Command>, ValidationError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            return Ok(Some(Command::Exit));
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Text(line.to_string())));
        };

        let (name, arguments) = match rest.split_once(char::is_whitespace) {
            Some((name, arguments)) => (name, arguments.trim()),
            None => (rest, ""),
        };
        let command = match name.to_lowercase().as_str() {
            "reset" => Command::Reset,
            "history" => Command::History,
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            "plan" => parse_plan(arguments)?,
            _ => {
                return Err(ValidationError::UnknownVariant {
                    kind: "command",
                    value: name.to_string(),
                })
            }
        };
        Ok(Some(command))
    }
}

/// `<subject> <level>`. The level is the last word so subject names may contain spaces.
fn parse_plan(arguments: &str) -> Result<Command, ValidationError> {
    let (subject, level) = arguments
        .rsplit_once(char::is_whitespace)
        .ok_or(ValidationError::EmptyField("level"))?;
    Ok(Command::Plan {
        subject: subject.parse()?,
        level: level.parse()?,
    })
}
