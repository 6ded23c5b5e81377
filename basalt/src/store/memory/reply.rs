use crate::collection::Document;
use crate::common::{Value, REPLY_CODE, REPLY_CURSOR, REPLY_ERRMSG, REPLY_FIRST_BATCH, REPLY_OK};
use std::fmt::{Display, Formatter};

/// A command rejected by the in-memory store, reported to the caller as a
/// failure reply rather than as an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandError {
    code: i32,
    message: String,
}

impl CommandError {
    pub(crate) fn new(code: i32, message: impl Into<String>) -> Self {
        CommandError {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn code(&self) -> i32 {
        self.code
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn to_reply(&self) -> Document {
        let mut reply = Document::new();
        reply.insert(REPLY_OK, 0.0);
        reply.insert(REPLY_ERRMSG, self.message.as_str());
        reply.insert(REPLY_CODE, self.code);
        reply
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

pub(crate) type CommandOutcome<T> = Result<T, CommandError>;

/// Appends `ok: 1` to a successful reply body.
pub(crate) fn ok_reply(mut body: Document) -> Document {
    body.insert(REPLY_OK, 1.0);
    body
}

/// Wraps documents into a single-batch cursor reply.
pub(crate) fn cursor_reply(namespace: &str, documents: Vec<Document>) -> Document {
    let mut cursor = Document::new();
    cursor.insert("id", 0i64);
    cursor.insert("ns", namespace);
    cursor.insert(
        REPLY_FIRST_BATCH,
        Value::Array(documents.into_iter().map(Value::Document).collect()),
    );

    let mut body = Document::new();
    body.insert(REPLY_CURSOR, cursor);
    ok_reply(body)
}
