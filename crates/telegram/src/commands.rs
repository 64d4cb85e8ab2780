/// Commands the bot understands in a private chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BotCommand {
    Start,
    Commands,
    Docs,
    New,
    Reqs,
    Cancel,
    Back,
}

impl BotCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "/start",
            Self::Commands => "/commands",
            Self::Docs => "/docs",
            Self::New => "/new",
            Self::Reqs => "/reqs",
            Self::Cancel => "/cancel",
            Self::Back => "/back",
        }
    }
}

/// Parses a message text into a command. Returns `None` for ordinary text.
///
/// A command is the first whitespace-separated token; a `@botname` suffix is
/// tolerated so that forwarded group-style invocations still match.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let first_token = text.trim().split_whitespace().next()?;
    if !first_token.starts_with('/') {
        return None;
    }
    let bare = first_token.split('@').next().unwrap_or(first_token).to_ascii_lowercase();

    match bare.as_str() {
        "/start" => Some(BotCommand::Start),
        "/commands" => Some(BotCommand::Commands),
        "/docs" => Some(BotCommand::Docs),
        "/new" => Some(BotCommand::New),
        "/reqs" => Some(BotCommand::Reqs),
        "/cancel" => Some(BotCommand::Cancel),
        "/back" => Some(BotCommand::Back),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, BotCommand};

    #[test]
    fn known_commands_parse() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start));
        assert_eq!(parse_command("/new"), Some(BotCommand::New));
        assert_eq!(parse_command("/reqs"), Some(BotCommand::Reqs));
        assert_eq!(parse_command("/back"), Some(BotCommand::Back));
    }

    #[test]
    fn bot_name_suffix_and_case_are_tolerated() {
        assert_eq!(parse_command("/Cancel@aktly_bot"), Some(BotCommand::Cancel));
        assert_eq!(parse_command("  /DOCS  "), Some(BotCommand::Docs));
    }

    #[test]
    fn plain_text_and_unknown_commands_are_not_commands() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command(""), None);
    }
}
