//! Cross-collection document references.
//!
//! A reference is stored inside a document as `{ $ref: <collection>,
//! $id: <id> }`, optionally with `$db` naming another database on the same
//! connection. [DocumentRef] parses and renders that form and resolves it
//! with a single `_id` lookup.

use crate::collection::Document;
use crate::common::{Value, DOC_ID, REF_DATABASE, REF_ID, REF_NAMESPACE};
use crate::database::Database;
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use std::fmt::{Display, Formatter};

/// Pointer to a document in another collection.
///
/// # Examples
///
/// ```rust,ignore
/// let author = DocumentRef::new("users", 42);
/// posts.insert(doc!{ title: "Hello", author: (author.to_document()) })?;
///
/// let post = posts.find_one(doc!{ title: "Hello" })?.unwrap();
/// if let Some(Value::Document(author)) = post.get("author") {
///     let user = DocumentRef::fetch_from(&db, author)?;
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    namespace: Option<String>,
    id: Option<Value>,
    database: Option<String>,
}

impl DocumentRef {
    pub fn new<T: Into<Value>>(namespace: &str, id: T) -> Self {
        DocumentRef {
            namespace: Some(namespace.to_string()),
            id: Some(id.into()),
            database: None,
        }
    }

    /// A reference with either part possibly absent; such a reference
    /// resolves to nothing.
    pub fn with_parts(namespace: Option<String>, id: Option<Value>) -> Self {
        DocumentRef {
            namespace,
            id,
            database: None,
        }
    }

    /// Points the reference at another database of the same connection.
    pub fn in_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Parses a `{ $ref, $id, $db }` document. Missing parts stay absent.
    ///
    /// # Errors
    ///
    /// [ErrorKind::ValidationError] when `$ref` or `$db` is present but not a
    /// string.
    pub fn from_document(document: &Document) -> BasaltResult<DocumentRef> {
        let namespace = string_part(document, REF_NAMESPACE)?;
        let database = string_part(document, REF_DATABASE)?;
        let id = match document.get(REF_ID) {
            None | Some(Value::Null) => None,
            Some(id) => Some(id.clone()),
        };
        Ok(DocumentRef {
            namespace,
            id,
            database,
        })
    }

    /// Renders the reference as `{ $ref, $id }`, plus `$db` when set.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert(REF_NAMESPACE, Value::from(self.namespace.clone()));
        document.insert(REF_ID, self.id.clone().unwrap_or_default());
        if let Some(database) = &self.database {
            document.insert(REF_DATABASE, database.as_str());
        }
        document
    }

    /// Loads the referenced document.
    ///
    /// Returns `None` without contacting the store when the namespace or id
    /// is absent or null, and `None` when no document has that `_id`.
    pub fn fetch(&self, db: &Database) -> BasaltResult<Option<Document>> {
        let (namespace, id) = match (&self.namespace, &self.id) {
            (Some(namespace), Some(id)) if !id.is_null() => (namespace, id),
            _ => return Ok(None),
        };

        let db = match &self.database {
            Some(name) => db.sibling(name)?,
            None => db.clone(),
        };
        let mut filter = Document::new();
        filter.insert(DOC_ID, id.clone());
        db.collection(namespace)?.find_one(filter)
    }

    /// Resolves a reference document in one step.
    pub fn fetch_from(db: &Database, reference: &Document) -> BasaltResult<Option<Document>> {
        DocumentRef::from_document(reference)?.fetch(db)
    }
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ \"$ref\" : \"{}\", \"$id\" : {} }}",
            self.namespace.as_deref().unwrap_or_default(),
            self.id.as_ref().map(|id| id.to_json()).unwrap_or_else(|| "null".to_string())
        )
    }
}

fn string_part(document: &Document, key: &str) -> BasaltResult<Option<String>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => {
            log::error!("{} must be a string, found {}", key, other.type_name());
            Err(BasaltError::new(
                &format!("{} must be a string, found {}", key, other.type_name()),
                ErrorKind::ValidationError,
            ))
        }
    }
}
