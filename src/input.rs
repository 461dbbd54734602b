//! Console command parsing.
//!
//! Maps lines typed on stdin to [`Command`]s.  Adding a command is one
//! variant plus one match arm in [`parse_command`].
//!
//! ## For contributors
//!
//! To add a new command:
//!
//! 1. Add a variant to [`Command`].
//! 2. Add a match arm in [`parse_command`].
//! 3. Handle it in `dispatch` in `main.rs`.
//! 4. Mention it in [`HELP`].

/// Help text printed by the `help` command.
pub const HELP: &str = "\
commands:
  list            show the current notifications
  refresh         poll now instead of waiting for the next period
  read <id>       mark a notification as read
  token <value>   replace the GitHub token and restart polling
  open            open https://github.com/notifications in the browser
  help            show this text
  quit            exit";

/// One console action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Refresh,
    MarkRead(String),
    SetToken(String),
    Open,
    Help,
    Quit,
}

/// Parse one input line.
///
/// Returns `Ok(None)` for blank lines and `Err` with a short message for
/// anything unrecognised.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "refresh" | "r" => Command::Refresh,
        "read" | "mark" => {
            if rest.is_empty() || rest.contains(char::is_whitespace) {
                return Err("usage: read <id>".to_string());
            }
            Command::MarkRead(rest.to_string())
        }
        "token" => {
            if rest.is_empty() {
                return Err("usage: token <value>".to_string());
            }
            Command::SetToken(rest.to_string())
        }
        "open" => Command::Open,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("   \t"), Ok(None));
    }

    #[test]
    fn simple_commands_and_aliases() {
        assert_eq!(parse_command("list"), Ok(Some(Command::List)));
        assert_eq!(parse_command("LS"), Ok(Some(Command::List)));
        assert_eq!(parse_command(" refresh "), Ok(Some(Command::Refresh)));
        assert_eq!(parse_command("open"), Ok(Some(Command::Open)));
        assert_eq!(parse_command("?"), Ok(Some(Command::Help)));
        assert_eq!(parse_command("q"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn read_takes_exactly_one_id() {
        assert_eq!(
            parse_command("read 1234"),
            Ok(Some(Command::MarkRead("1234".into())))
        );
        assert!(parse_command("read").is_err());
        assert!(parse_command("read 1 2").is_err());
    }

    #[test]
    fn token_keeps_value_verbatim() {
        assert_eq!(
            parse_command("token ghp_AbC123"),
            Ok(Some(Command::SetToken("ghp_AbC123".into())))
        );
        assert!(parse_command("token").is_err());
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = parse_command("frobnicate now").unwrap_err();
        assert!(err.contains("frobnicate"));
    }
}
