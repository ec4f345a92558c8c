/// Command table and parser.
///
/// [`COMMANDS`] is the single source of truth: the parser matches against it
/// and the `/start` usage text is generated from it.
use std::path::PathBuf;

/// A parsed, well-formed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Files,
    Check,
    Status,
    Download(PathBuf),
    Delete(PathBuf),
    AllMedia,
    ZipAll,
}

/// Static description of one command.
#[derive(Debug)]
pub struct CommandSpec {
    /// Trigger, including the leading slash.
    pub name: &'static str,
    /// Placeholder for the required argument, if any.
    pub argument: Option<&'static str>,
    /// One-line description for the usage text.
    pub summary: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "/start",
        argument: None,
        summary: "Show this help",
    },
    CommandSpec {
        name: "/files",
        argument: None,
        summary: "Display files in the specified folders",
    },
    CommandSpec {
        name: "/check",
        argument: None,
        summary: "Check for new files in the specified folders",
    },
    CommandSpec {
        name: "/status",
        argument: None,
        summary: "Show watched folders and the last check time",
    },
    CommandSpec {
        name: "/download",
        argument: Some("file_path"),
        summary: "Download a file",
    },
    CommandSpec {
        name: "/delete",
        argument: Some("file_path"),
        summary: "Delete a file",
    },
    CommandSpec {
        name: "/all",
        argument: None,
        summary: "Download all available media files",
    },
    CommandSpec {
        name: "/zip",
        argument: None,
        summary: "Create a zip file containing files from the specified folders",
    },
];

/// Result of parsing one message.
#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// A known command whose required argument was missing.
    MissingArgument(&'static CommandSpec),
    /// Plain text or an unknown slash command.
    NotACommand,
}

impl PartialEq for CommandSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CommandSpec {}

/// Parse message text.
///
/// The command is the first whitespace-separated token, with any
/// `@botname` suffix removed. The argument is the trimmed remainder, so
/// paths containing spaces survive intact.
pub fn parse(text: &str) -> Parsed {
    let text = text.trim();
    if !text.starts_with('/') {
        return Parsed::NotACommand;
    }
    let (head, rest) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };
    let name = head.split_once('@').map_or(head, |(name, _bot)| name);

    let Some(spec) = COMMANDS.iter().find(|c| c.name == name) else {
        return Parsed::NotACommand;
    };
    if spec.argument.is_some() && rest.is_empty() {
        return Parsed::MissingArgument(spec);
    }

    let command = match spec.name {
        "/start" => Command::Start,
        "/files" => Command::Files,
        "/check" => Command::Check,
        "/status" => Command::Status,
        "/download" => Command::Download(PathBuf::from(rest)),
        "/delete" => Command::Delete(PathBuf::from(rest)),
        "/all" => Command::AllMedia,
        "/zip" => Command::ZipAll,
        _ => return Parsed::NotACommand,
    };
    Parsed::Command(command)
}

/// `/download <file_path>` style usage line for one command.
pub fn usage_line(spec: &CommandSpec) -> String {
    match spec.argument {
        Some(arg) => format!("{} [{arg}]", spec.name),
        None => spec.name.to_owned(),
    }
}

/// Welcome text listing every command.
pub fn usage_text() -> String {
    let mut text = String::from("Welcome to FileWarden!\n\nUse the following commands:\n\n");
    for spec in COMMANDS.iter().filter(|c| c.name != "/start") {
        text.push_str(&format!("{} - {}\n", usage_line(spec), spec.summary));
    }
    text
}
