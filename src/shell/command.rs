//! Shell command parsing

use thiserror::Error;

/// Which table `show` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowTarget {
    Options,
    Globals,
}

/// One parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Clear,
    List(Option<String>),
    Cd(Option<String>),
    Reload,
    Search(String),
    Info(Option<String>),
    Use(String),
    Set { key: String, value: String },
    Show(ShowTarget),
    Run,
    Back,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}. Type 'help' for available commands")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    ///
    /// The verb is case-insensitive. Arguments keep their case, and the value
    /// of `set` is the rest of the line joined by single spaces.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = tokens.collect();
        let first = args.first().map(|s| s.to_string());

        let command = match verb.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "clear" | "cls" => Command::Clear,
            "list" | "ls" => Command::List(first),
            "cd" => Command::Cd(first),
            "reload" => Command::Reload,
            "search" => {
                if args.is_empty() {
                    return Err(CommandError::Usage("search <query>"));
                }
                Command::Search(args.join(" "))
            }
            "info" => Command::Info(first),
            "use" | "select" => Command::Use(first.ok_or(CommandError::Usage("use <module>"))?),
            "set" => {
                if args.len() < 2 {
                    return Err(CommandError::Usage("set <option> <value>"));
                }
                Command::Set {
                    key: args[0].to_string(),
                    value: args[1..].join(" "),
                }
            }
            "show" => match first.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("options") => Command::Show(ShowTarget::Options),
                Some("global") | Some("globals") => Command::Show(ShowTarget::Globals),
                _ => return Err(CommandError::Usage("show options|global")),
            },
            "run" | "exploit" => Command::Run,
            "back" => Command::Back,
            "exit" | "quit" | "q" => Command::Exit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}
