use crate::collection::Document;
use crate::common::{
    Value, CODE_DUPLICATE_KEY, CODE_INDEX_NOT_FOUND, CODE_NAMESPACE_EXISTS, REPLY_CODE,
    REPLY_CURSOR, REPLY_ERRMSG, REPLY_FIRST_BATCH, REPLY_OK,
};
use crate::errors::{BasaltError, BasaltResult, ErrorKind};

/// Outcome of one store command.
///
/// Built from the reply document: `ok` decides success, `errmsg` and
/// `code` describe a failure, and the whole reply is kept as the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    ok: bool,
    error_message: Option<String>,
    code: Option<i32>,
    payload: Document,
}

impl CommandResult {
    pub fn from_reply(reply: Document) -> CommandResult {
        let ok = reply.get(REPLY_OK).map(|v| v.is_truthy()).unwrap_or(false);
        let error_message = reply
            .get(REPLY_ERRMSG)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let code = reply.get(REPLY_CODE).and_then(|v| v.as_i32());
        CommandResult {
            ok,
            error_message,
            code,
            payload: reply,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn payload(&self) -> &Document {
        &self.payload
    }

    pub fn into_payload(self) -> Document {
        self.payload
    }

    /// Maps a failed reply to a typed error carrying the store's message
    /// verbatim.
    ///
    /// | code  | kind                        |
    /// |-------|-----------------------------|
    /// | 27    | [ErrorKind::IndexNotFound]  |
    /// | 48    | [ErrorKind::NameConflict]   |
    /// | 11000 | [ErrorKind::DuplicateKey]   |
    /// | other | [ErrorKind::CommandFailure] |
    pub fn to_error(&self) -> BasaltError {
        let message = self
            .error_message
            .clone()
            .unwrap_or_else(|| "command failed without an error message".to_string());
        let kind = match self.code {
            Some(CODE_INDEX_NOT_FOUND) => ErrorKind::IndexNotFound,
            Some(CODE_NAMESPACE_EXISTS) => ErrorKind::NameConflict,
            Some(CODE_DUPLICATE_KEY) => ErrorKind::DuplicateKey,
            _ => ErrorKind::CommandFailure,
        };
        BasaltError::new(&message, kind)
    }

    /// Returns the payload on success, or the mapped error.
    pub fn into_result(self) -> BasaltResult<Document> {
        if self.ok {
            Ok(self.payload)
        } else {
            let error = self.to_error();
            log::error!("Command failed: {}", error.message());
            Err(error)
        }
    }

    /// Reads `cursor.firstBatch` from a successful payload.
    pub fn first_batch(payload: &Document) -> Vec<Document> {
        payload
            .get(REPLY_CURSOR)
            .and_then(|v| v.as_document())
            .and_then(|cursor| cursor.get(REPLY_FIRST_BATCH))
            .and_then(|v| v.as_array())
            .map(|batch| {
                batch
                    .iter()
                    .filter_map(|v| match v {
                        Value::Document(doc) => Some(doc.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_ok_reply() {
        let result = CommandResult::from_reply(doc! { ok: 1.0, n: 3 });
        assert!(result.is_ok());
        assert_eq!(result.error_message(), None);
        assert_eq!(result.payload().get("n"), Some(&Value::I32(3)));
        assert!(result.into_result().is_ok());
    }

    #[test]
    fn test_ok_accepts_bool_and_missing_is_failure() {
        assert!(CommandResult::from_reply(doc! { ok: true }).is_ok());
        assert!(!CommandResult::from_reply(doc! { n: 1 }).is_ok());
    }

    #[test]
    fn test_error_code_mapping() {
        let cases = vec![
            (27, ErrorKind::IndexNotFound),
            (48, ErrorKind::NameConflict),
            (11000, ErrorKind::DuplicateKey),
            (2, ErrorKind::CommandFailure),
        ];
        for (code, kind) in cases {
            let result = CommandResult::from_reply(doc! { ok: 0.0, errmsg: "boom", code: code });
            let error = result.into_result().unwrap_err();
            assert_eq!(error.kind(), &kind);
            assert_eq!(error.message(), "boom");
        }
    }

    #[test]
    fn test_failure_without_message() {
        let error = CommandResult::from_reply(doc! { ok: 0 }).into_result().unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::CommandFailure);
        assert!(!error.message().is_empty());
    }

    #[test]
    fn test_first_batch() {
        let payload = doc! {
            cursor: { id: 0, ns: "db.c", firstBatch: [{ a: 1 }, { a: 2 }] },
            ok: 1
        };
        let batch = CommandResult::first_batch(&payload);
        assert_eq!(batch, vec![doc! { a: 1 }, doc! { a: 2 }]);
        assert!(CommandResult::first_batch(&doc! { ok: 1 }).is_empty());
    }
}
