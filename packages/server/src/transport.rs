//! Line-oriented transport: one request per stdin line, notices on stdout.
//!
//! Each input line is `<origin> <text>`. Text starting with `/start` or
//! `/help` gets the canned reply; anything else is a generation request.

use std::io::Write;
use std::sync::Mutex;

use actors::{NoticeRef, Notifier, NotifyError, NotifyFuture};
use futures_util::FutureExt;
use motion_core::{GenerationRequest, Notice, OriginId};

pub const WELCOME: &str = "Hi! I'm AIMotion. Tell me what kind of dance video you want to create. \
For example: 'Create a video where pepe is dancing hiphop'";

pub const HELP: &str = "Just send me a description of the dance video you want to create. \
Include details like who should be dancing and what style of dance.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(OriginId),
    Help(OriginId),
    Generate(OriginId, GenerationRequest),
}

impl Command {
    /// Parse one input line. Blank lines and lines without text yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let (origin, text) = line.trim().split_once(char::is_whitespace)?;
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let origin = OriginId::from(origin);

        match text.split_whitespace().next() {
            Some("/start") => Some(Self::Start(origin)),
            Some("/help") => Some(Self::Help(origin)),
            _ => Some(Self::Generate(origin, GenerationRequest::new(text))),
        }
    }
}

/// Writes notices to stdout, one line each. Edits are not supported, so
/// status updates arrive as new lines.
#[derive(Debug, Default)]
pub struct StdoutNotifier {
    next_id: Mutex<u64>,
}

impl StdoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, origin_id: &OriginId, text: &str) -> Result<(), NotifyError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{origin_id}: {text}").map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

impl Notifier for StdoutNotifier {
    fn notify<'a>(&'a self, origin_id: &'a OriginId, notice: &'a Notice) -> NotifyFuture<'a> {
        async move {
            let message_id = {
                let mut next = self
                    .next_id
                    .lock()
                    .map_err(|_| NotifyError::Delivery("message counter poisoned".into()))?;
                *next += 1;
                next.to_string()
            };
            self.reply(origin_id, &notice.to_string())?;
            Ok(NoticeRef {
                origin_id: origin_id.clone(),
                message_id,
            })
        }
        .boxed()
    }
}
