use crate::collection::Document;
use crate::common::Value;

/// Which version of the document `find_and_modify` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    /// The document as it was before the update was applied.
    #[default]
    Before,
    /// The document after the update (or the upserted document).
    After,
}

/// Options for `find_with_options`.
///
/// # Examples
///
/// ```rust,ignore
/// let options = FindOptions::new()
///     .sort(doc!{ age: (-1) })
///     .skip(10)
///     .limit(5)
///     .projection(doc!{ name: 1 });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub(crate) projection: Option<Document>,
    pub(crate) sort: Option<Document>,
    pub(crate) skip: Option<u64>,
    pub(crate) limit: Option<i64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Maximum number of documents to return; zero means no limit.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for `update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub(crate) upsert: bool,
    pub(crate) multi: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document built from the query and update if nothing
    /// matches.
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    /// Update every matching document instead of the first one.
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }
}

/// Options for `find_and_modify_with_options`.
///
/// Exactly one of `update` or `remove` must be set. `return_document`
/// falls back to the collection's configured default, which is
/// [ReturnDocument::Before] unless changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyOptions {
    pub(crate) query: Option<Document>,
    pub(crate) sort: Option<Document>,
    pub(crate) fields: Option<Document>,
    pub(crate) update: Option<Document>,
    pub(crate) remove: bool,
    pub(crate) return_document: Option<ReturnDocument>,
    pub(crate) upsert: bool,
}

impl FindAndModifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: Document) -> Self {
        self.query = Some(query);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn fields(mut self, fields: Document) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn update(mut self, update: Document) -> Self {
        self.update = Some(update);
        self
    }

    pub fn remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }

    pub fn return_document(mut self, return_document: ReturnDocument) -> Self {
        self.return_document = Some(return_document);
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

/// Outcome of an `update`, `save` or `remove`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteResult {
    n: i64,
    n_modified: i64,
    upserted_id: Option<Value>,
}

impl WriteResult {
    pub(crate) fn new(n: i64, n_modified: i64, upserted_id: Option<Value>) -> Self {
        WriteResult {
            n,
            n_modified,
            upserted_id,
        }
    }

    /// Number of documents matched (or removed, or upserted).
    pub fn affected(&self) -> i64 {
        self.n
    }

    /// Number of documents whose content actually changed.
    pub fn modified(&self) -> i64 {
        self.n_modified
    }

    /// The `_id` of the upserted document, if the write inserted one.
    pub fn upserted_id(&self) -> Option<&Value> {
        self.upserted_id.as_ref()
    }

    pub fn is_updated_existing(&self) -> bool {
        self.n > 0 && self.upserted_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_return_document_defaults_to_before() {
        assert_eq!(ReturnDocument::default(), ReturnDocument::Before);
        assert_eq!(FindAndModifyOptions::new().return_document, None);
    }

    #[test]
    fn test_find_options_builder() {
        let options = FindOptions::new()
            .sort(doc! { a: 1 })
            .skip(2)
            .limit(3)
            .projection(doc! { a: 1 });
        assert_eq!(options.sort, Some(doc! { a: 1 }));
        assert_eq!(options.skip, Some(2));
        assert_eq!(options.limit, Some(3));
        assert_eq!(options.projection, Some(doc! { a: 1 }));
    }

    #[test]
    fn test_write_result_updated_existing() {
        let updated = WriteResult::new(1, 1, None);
        assert!(updated.is_updated_existing());
        let upserted = WriteResult::new(1, 0, Some(Value::I32(3)));
        assert!(!upserted.is_updated_existing());
        assert_eq!(upserted.upserted_id(), Some(&Value::I32(3)));
        assert!(!WriteResult::default().is_updated_existing());
    }
}
