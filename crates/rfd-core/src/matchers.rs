//! Stateless classifiers for inbound messages.
//!
//! Missing or empty text never matches a command and never errors.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::{clock::Clock, domain::Message};

fn token_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w@/]").expect("valid regex"))
}

/// First token of the lowercased text, split on anything that is not a word
/// character, `@` or `/`.
pub fn first_token(text: &str) -> String {
    let lower = text.to_lowercase();
    token_splitter()
        .split(&lower)
        .next()
        .unwrap_or("")
        .to_string()
}

/// Set of command tokens (e.g. `/start`) one handler answers to.
///
/// Names may be given with or without the leading `/`; both register the
/// slash form, so a bare `start` in chat never matches.
///
/// Also accepts the `/cmd@botname` form used in group chats, but only when the
/// part after the last `@` is exactly this bot's username.
#[derive(Clone, Debug)]
pub struct CommandSet {
    commands: HashSet<String>,
    bot_name: String,
}

impl CommandSet {
    pub fn new<I, S>(commands: I, bot_name: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            commands: commands
                .into_iter()
                .map(|c| {
                    let c = c.as_ref().to_lowercase();
                    if c.starts_with('/') {
                        c
                    } else {
                        format!("/{c}")
                    }
                })
                .collect(),
            bot_name: bot_name.trim_start_matches('@').to_lowercase(),
        }
    }

    pub fn matches_text(&self, text: Option<&str>) -> bool {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            return false;
        };
        let token = first_token(text);
        if self.commands.contains(&token) {
            return true;
        }
        if self.bot_name.is_empty() {
            return false;
        }
        let Some((cmd, addressee)) = token.rsplit_once('@') else {
            return false;
        };
        addressee == self.bot_name && self.commands.contains(cmd)
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.matches_text(message.text())
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|s| s.as_str())
    }
}

pub fn is_command(message: &Message) -> bool {
    message.text().is_some_and(|t| t.starts_with('/'))
}

pub fn is_not_command(message: &Message) -> bool {
    message.text().is_some_and(|t| !t.starts_with('/'))
}

/// Age of `message` in seconds relative to `clock`.
pub fn message_age(clock: &dyn Clock, message: &Message) -> f64 {
    clock.now() - message.date.timestamp() as f64
}

/// True when `message` is more than `delay_secs` old.
pub fn is_callback_stale(clock: &dyn Clock, delay_secs: f64, message: &Message) -> bool {
    message_age(clock, message) > delay_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::MockClock, domain::fixtures};

    fn set() -> CommandSet {
        CommandSet::new(["/start", "/help"], "mybot")
    }

    #[test]
    fn matches_plain_and_addressed_commands() {
        let s = set();
        assert!(s.matches_text(Some("/start")));
        assert!(s.matches_text(Some("/start@mybot")));
        assert!(s.matches_text(Some("/HELP please")));
        assert!(s.matches_text(Some("/start, now")));
        assert!(s.matches_text(Some("/start@MyBot arg")));
    }

    #[test]
    fn rejects_other_bots_and_plain_text() {
        let s = set();
        assert!(!s.matches_text(Some("/start@otherbot")));
        assert!(!s.matches_text(Some("/start@notmybot")));
        assert!(!s.matches_text(Some("hello")));
        assert!(!s.matches_text(Some("")));
        assert!(!s.matches_text(None));
        assert!(!s.matches_text(Some("/starter")));
        assert!(!s.matches_text(Some(" /start")));
    }

    #[test]
    fn empty_bot_name_only_matches_bare_commands() {
        let s = CommandSet::new(["/start"], "");
        assert!(s.matches_text(Some("/start")));
        assert!(!s.matches_text(Some("/start@anybot")));
    }

    #[test]
    fn names_without_slash_register_the_slash_form() {
        let s = CommandSet::new(["start", "/help"], "mybot");
        assert!(s.matches_text(Some("/start")));
        assert!(s.matches_text(Some("/start@mybot")));
        assert!(s.matches_text(Some("/help")));
        assert!(!s.matches_text(Some("start")));
        assert!(!s.matches_text(Some("help@mybot")));
        let mut names: Vec<&str> = s.commands().collect();
        names.sort();
        assert_eq!(names, vec!["/help", "/start"]);
    }

    #[test]
    fn command_vs_non_command() {
        let cmd = fixtures::message(1, Some("/x"));
        let txt = fixtures::message(1, Some("x"));
        let empty = fixtures::message(1, Some(""));
        let none = fixtures::message(1, None);

        assert!(is_command(&cmd) && !is_not_command(&cmd));
        assert!(!is_command(&txt) && is_not_command(&txt));
        for m in [&empty, &none] {
            assert!(!is_command(m));
            assert!(!is_not_command(m));
        }
    }

    #[test]
    fn staleness_uses_strict_greater_than() {
        let clock = MockClock::at(1_000.0);
        let msg = fixtures::message_at(1, "menu", 940);
        assert!(!is_callback_stale(&clock, 60.0, &msg));
        clock.set(1_000.5);
        assert!(is_callback_stale(&clock, 60.0, &msg));
    }
}
