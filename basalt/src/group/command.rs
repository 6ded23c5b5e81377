use crate::collection::Document;
use crate::errors::BasaltResult;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Folds one document into a group's accumulator.
pub type ReduceFunction = Arc<dyn Fn(&Document, &mut Document) -> BasaltResult<()> + Send + Sync>;

/// Post-processes a group's accumulator. Returning `Some` replaces the
/// group entry; returning `None` keeps the accumulator as mutated.
pub type FinalizeFunction =
    Arc<dyn Fn(&mut Document) -> BasaltResult<Option<Document>> + Send + Sync>;

/// Computes the grouping key of a document.
pub type KeyFunction = Arc<dyn Fn(&Document) -> BasaltResult<Document> + Send + Sync>;

/// A grouped aggregation request.
///
/// `initial` and `reduce` are mandatory. Grouping uses either the `key`
/// fields or `key_fn`, never both; with neither, every matching document
/// falls into one group.
///
/// # Examples
///
/// ```rust,ignore
/// let command = GroupCommand::new()
///     .key(doc!{ x: 1 })
///     .initial(doc!{ count: 0 })
///     .reduce(|_, acc| {
///         let count = acc.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
///         acc.insert("count", count + 1);
///         Ok(())
///     });
/// let groups = collection.group(command)?;
/// ```
#[derive(Clone, Default)]
pub struct GroupCommand {
    pub(crate) key: Option<Document>,
    pub(crate) key_fn: Option<KeyFunction>,
    pub(crate) cond: Option<Document>,
    pub(crate) initial: Option<Document>,
    pub(crate) reduce: Option<ReduceFunction>,
    pub(crate) finalize: Option<FinalizeFunction>,
}

impl GroupCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields whose values identify a group.
    pub fn key(mut self, key: Document) -> Self {
        self.key = Some(key);
        self
    }

    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&Document) -> BasaltResult<Document> + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Filter selecting the documents to group.
    pub fn cond(mut self, cond: Document) -> Self {
        self.cond = Some(cond);
        self
    }

    /// Starting accumulator, cloned for every group.
    pub fn initial(mut self, initial: Document) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn reduce<F>(mut self, reduce: F) -> Self
    where
        F: Fn(&Document, &mut Document) -> BasaltResult<()> + Send + Sync + 'static,
    {
        self.reduce = Some(Arc::new(reduce));
        self
    }

    pub fn finalize<F>(mut self, finalize: F) -> Self
    where
        F: Fn(&mut Document) -> BasaltResult<Option<Document>> + Send + Sync + 'static,
    {
        self.finalize = Some(Arc::new(finalize));
        self
    }
}

impl Debug for GroupCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCommand")
            .field("key", &self.key)
            .field("key_fn", &self.key_fn.is_some())
            .field("cond", &self.cond)
            .field("initial", &self.initial)
            .field("reduce", &self.reduce.is_some())
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}
