//! The chat client the engine runs inside, and the events it delivers.

use std::fmt;

use thiserror::Error;

use super::irc::{self, StripMask};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("no such context: {0}")]
    NoSuchContext(String),
    #[error("host call failed: {0}")]
    Failed(String),
}

/// A window/tab in the client: one channel or query on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub id: u64,
    pub network: String,
    pub channel: String,
    /// Text currently typed in the context's input box.
    pub input_box: String,
}

impl Context {
    pub fn is_same(&self, other: &Context) -> bool {
        self.id == other.id
    }
}

/// Print events the engine listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChannelMessage,
    ChannelMsgHilight,
    ChannelAction,
    PrivateMessage,
    PrivateMessageToDialog,
    PrivateAction,
    PrivateActionToDialog,
}

impl EventKind {
    pub fn all() -> &'static [EventKind] {
        &[
            Self::ChannelMsgHilight,
            Self::ChannelMessage,
            Self::ChannelAction,
            Self::PrivateMessage,
            Self::PrivateMessageToDialog,
            Self::PrivateAction,
            Self::PrivateActionToDialog,
        ]
    }

    /// The client's name for the event.
    pub fn name(self) -> &'static str {
        match self {
            Self::ChannelMessage => "Channel Message",
            Self::ChannelMsgHilight => "Channel Msg Hilight",
            Self::ChannelAction => "Channel Action",
            Self::PrivateMessage => "Private Message",
            Self::PrivateMessageToDialog => "Private Message to Dialog",
            Self::PrivateAction => "Private Action",
            Self::PrivateActionToDialog => "Private Action to Dialog",
        }
    }

    pub fn is_channel(self) -> bool {
        self.name().starts_with("Channel")
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One incoming message. The hostmask and stripped text are computed once,
/// at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub kind: EventKind,
    pub nick: String,
    pub text: String,
    /// Any further event arguments (mode character, identified text),
    /// passed back unchanged when the line is re-emitted.
    pub extra: Vec<String>,
    hostmask: String,
    stripped: String,
}

impl MessageEvent {
    /// `user_host` is the sender's `user@host`, when the client knows it.
    pub fn new(kind: EventKind, nick: &str, text: &str, user_host: Option<&str>) -> Self {
        let hostmask = match user_host {
            Some(user_host) if user_host.contains('@') => format!("{nick}!{user_host}"),
            _ => format!("{nick}!*@*"),
        };
        Self {
            kind,
            nick: nick.to_string(),
            text: text.to_string(),
            extra: Vec::new(),
            hostmask,
            stripped: irc::strip(text, StripMask::ALL),
        }
    }

    pub fn with_extra(mut self, extra: Vec<String>) -> Self {
        self.extra = extra;
        self
    }

    /// Canonical `nick!user@host` of the sender.
    pub fn hostmask(&self) -> &str {
        &self.hostmask
    }

    /// The message with formatting and colors removed.
    pub fn stripped(&self) -> &str {
        &self.stripped
    }
}

/// Services the client provides. All calls are synchronous and
/// fire-and-forget; `emit_print` may deliver the line straight back into
/// the engine.
pub trait Host {
    /// Context the event arrived in.
    fn current(&self) -> Context;
    /// Context the user is looking at.
    fn focused(&self) -> Context;
    fn find_context(&self, network: &str, channel: &str) -> Option<Context>;
    /// Open a query window without switching to it.
    fn open_query(&self, network: &str, name: &str) -> Result<(), HostError>;
    fn emit_print(&self, context: &Context, event: EventKind, args: &[&str]) -> Result<(), HostError>;
    fn print(&self, context: &Context, text: &str) -> Result<(), HostError>;
    /// Send `text` to the channel or query as the user.
    fn say(&self, context: &Context, text: &str) -> Result<(), HostError>;
    fn focus(&self, context: &Context) -> Result<(), HostError>;
    fn flash(&self) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds() {
        assert_eq!(EventKind::all().len(), 7);
        assert!(EventKind::ChannelMsgHilight.is_channel());
        assert!(!EventKind::PrivateActionToDialog.is_channel());
        assert_eq!(EventKind::PrivateMessage.to_string(), "Private Message");
    }

    #[test]
    fn test_message_event_caches_derived_fields() {
        let event = MessageEvent::new(
            EventKind::ChannelMessage,
            "Bob",
            "\x02Fire\x02 in the \x0304hole",
            Some("bob@example.org"),
        );
        assert_eq!(event.hostmask(), "Bob!bob@example.org");
        assert_eq!(event.stripped(), "Fire in the hole");

        let anonymous = MessageEvent::new(EventKind::PrivateMessage, "eve", "hi", None);
        assert_eq!(anonymous.hostmask(), "eve!*@*");
    }
}
