use regex::Regex;

use crate::data::types::Station;

/// A recognized chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Alert(Station),
    Stop(Station),
    Current(Station),
    Resolve,
    Streak(Station),
    Help,
}

/// Parse a chat message into a command. Matching is anchored and
/// case-insensitive; anything unrecognized yields None and is silently
/// ignored by the dispatcher.
pub fn parse(text: &str) -> Option<Command> {
    let re = Regex::new(r"(?i)^/(start|alert|stop|current|resolve|streak|help)(?:\s+(\S+))?$").ok()?;
    let caps = re.captures(text.trim())?;
    let verb = caps.get(1)?.as_str().to_lowercase();
    let arg = caps.get(2).map(|m| m.as_str());

    match (verb.as_str(), arg) {
        ("start", None) => Some(Command::Start),
        ("resolve", None) => Some(Command::Resolve),
        ("help", None) => Some(Command::Help),
        ("alert", Some(s)) => Station::parse(s).map(Command::Alert),
        ("stop", Some(s)) => Station::parse(s).map(Command::Stop),
        ("current", Some(s)) => Station::parse(s).map(Command::Current),
        ("streak", Some(s)) => Station::parse(s).map(Command::Streak),
        _ => None,
    }
}
