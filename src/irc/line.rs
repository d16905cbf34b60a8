//! Line splitting and the little token inspection the core needs.
//!
//! Lines are never parsed beyond their first two whitespace-delimited tokens.

use super::DISCONNECT_SENTINEL;

/// Numeric replies that end registration: end of MOTD, and MOTD missing.
const END_OF_MOTD: [&str; 2] = ["376", "422"];

/// How the core reacts to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// `ERROR ...`, the server is closing the link.
    Error,
    /// `PING <token>`, must be answered with a `PONG`.
    Ping,
    Other,
}

impl Kind {
    pub fn of(line: &str) -> Self {
        match first_token(line) {
            Some(tok) if tok.eq_ignore_ascii_case("ERROR") => Self::Error,
            Some(tok) if tok.eq_ignore_ascii_case("PING") => Self::Ping,
            _ => Self::Other,
        }
    }
}

/// Splits one read's worth of text on CRLF.
///
/// Joining the pieces with `"\r\n"` gives back the input. A trailing CRLF
/// yields a final empty piece, and a line cut by a read boundary comes out as
/// a fragment; neither is repaired here.
pub fn split_lines(text: &str) -> std::str::Split<'_, &'static str> {
    text.split("\r\n")
}

/// Splitting used while registering: LF separated, a trailing CR dropped,
/// empty lines skipped.
pub fn handshake_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
}

pub fn first_token(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

pub fn second_token(line: &str) -> Option<&str> {
    line.split_whitespace().nth(1)
}

/// True for the numeric replies that end registration.
pub fn is_end_of_motd(line: &str) -> bool {
    second_token(line).is_some_and(|tok| END_OF_MOTD.contains(&tok))
}

/// The reply to a `PING` line: `PONG` followed by the ping's token with one
/// leading `:` removed. `None` when the ping carries no token.
pub fn pong_for(line: &str) -> Option<String> {
    let token = second_token(line)?;
    let token = token.strip_prefix(':').unwrap_or(token);
    if token.is_empty() {
        return None;
    }
    Some(format!("PONG {token}"))
}

/// True for the last line a connection delivers: the server's `ERROR`, or
/// the local disconnect sentinel.
pub fn is_terminal(line: &str) -> bool {
    line == DISCONNECT_SENTINEL || Kind::of(line) == Kind::Error
}
