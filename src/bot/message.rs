//! `PRIVMSG` lines as seen by command handlers.

/// A channel (or private) message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Nickname of the sender, without the `user@host` part.
    pub nick: String,
    /// Where the message was sent: a channel, or our own nick for queries.
    pub channel: String,
    /// The full message text, trimmed.
    pub text: String,
}

impl Message {
    /// Parses `:<nick>!<user>@<host> PRIVMSG <target> :<text>`.
    ///
    /// Returns `None` for any other line, including a `PRIVMSG` without a
    /// prefix or without text.
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.splitn(4, ' ').collect();
        let [prefix, cmd, target, text] = parts[..] else {
            return None;
        };

        if !cmd.eq_ignore_ascii_case("PRIVMSG") {
            return None;
        }

        let source = prefix.strip_prefix(':')?;
        let nick = source.split('!').next().unwrap_or(source);
        let text = text.strip_prefix(':').unwrap_or(text).trim();
        if nick.is_empty() || target.is_empty() || text.is_empty() {
            return None;
        }

        Some(Self {
            nick: nick.to_string(),
            channel: target.to_string(),
            text: text.to_string(),
        })
    }

    /// The first word of the text, used to pick a handler.
    pub fn command(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or_default()
    }

    /// Everything after the command word.
    pub fn args(&self) -> &str {
        self.text
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim_start())
            .unwrap_or_default()
    }
}
