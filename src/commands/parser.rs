/// A chat command addressed to the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a controller in production mode
    Trigger(String),
    /// Run a controller or report in debug mode
    Debug(String),
    /// Generate a report and reply with its text
    Report(String),
    Say(String),
    Help,
    Unknown(String),
}

impl Command {
    /// Parses `trigger <job>`, `debug <job>`, `report <job>`, `say <text>`
    /// and `help`. `admin trigger` and `admin debug` are accepted as aliases
    /// and a leading bot mention is ignored.
    pub fn parse(text: &str) -> Self {
        let mut rest = text.trim();
        if rest.starts_with("<@")
            && let Some(end) = rest.find('>')
        {
            rest = rest[end + 1..].trim_start();
        }

        let (verb, args) = split_word(rest);
        let (verb, args) = if verb.eq_ignore_ascii_case("admin") {
            let (inner, inner_args) = split_word(args);
            if inner.eq_ignore_ascii_case("trigger") || inner.eq_ignore_ascii_case("debug") {
                (inner, inner_args)
            } else {
                return Command::Unknown(text.trim().to_string());
            }
        } else {
            (verb, args)
        };

        let single_arg = |args: &str| {
            let mut words = args.split_whitespace();
            match (words.next(), words.next()) {
                (Some(name), None) => Some(name.to_string()),
                _ => None,
            }
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "trigger" => single_arg(args).map(Command::Trigger),
            "debug" => single_arg(args).map(Command::Debug),
            "report" => single_arg(args).map(Command::Report),
            "say" if !args.is_empty() => Some(Command::Say(args.to_string())),
            "help" if args.is_empty() => Some(Command::Help),
            _ => None,
        };
        command.unwrap_or_else(|| Command::Unknown(text.trim().to_string()))
    }

    /// Trigger and debug run jobs that may write; both need the admins group.
    pub fn requires_admin(&self) -> bool {
        matches!(self, Command::Trigger(_) | Command::Debug(_))
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}
