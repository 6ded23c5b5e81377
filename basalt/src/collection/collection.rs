use super::{
    Document, FindAndModifyOptions, FindOptions, IndexInfo, IndexOptions, IndexSpec, ObjectId,
    ReturnDocument, UpdateOptions, WriteResult,
};
use crate::basalt_config::BasaltConfig;
use crate::codec::{DecoderFactory, ObjectFactory, TypeBindings};
use crate::common::{
    atomic, Atomic, ReadExecutor, Value, WriteExecutor, ALL_INDEXES, CODE_NAMESPACE_NOT_FOUND,
    DOC_ID,
};
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use crate::group::{GroupCommand, GroupEngine};
use crate::store::{CommandResult, StoreConnection};
use std::ops::Deref;
use std::sync::Arc;

/// Decoding settings of one collection handle.
#[derive(Clone)]
pub(crate) struct CollectionSettings {
    decoder_factory: Arc<dyn DecoderFactory>,
    type_bindings: TypeBindings,
    return_document: ReturnDocument,
}

impl CollectionSettings {
    fn from_config(config: &BasaltConfig) -> Self {
        CollectionSettings {
            decoder_factory: config.decoder_factory(),
            type_bindings: config.type_bindings(),
            return_document: config.return_document(),
        }
    }
}

/// A named collection in a database.
///
/// Every operation formats a command document, runs it through the
/// database's store connection and interprets the reply. The handle is
/// cheap to clone; clones share the name and the decoding settings.
///
/// # Examples
///
/// ```rust,ignore
/// let users = db.collection("users")?;
/// users.insert(doc!{ name: "Alice", age: 30 })?;
/// users.ensure_index(doc!{ name: 1 }, IndexOptions::new().unique(true))?;
///
/// let adults = users.find(doc!{ age: { "$gte": 18 } })?;
/// let before = users.find_and_modify(doc!{ name: "Alice" }, doc!{ "$inc": { age: 1 } })?;
/// ```
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    pub(crate) fn new(
        database: &str,
        name: &str,
        connection: StoreConnection,
        config: &BasaltConfig,
    ) -> BasaltResult<Collection> {
        validate_collection_name(name)?;
        Ok(Collection {
            inner: Arc::new(CollectionInner {
                database: database.to_string(),
                name: atomic(name.to_string()),
                connection,
                settings: atomic(CollectionSettings::from_config(config)),
            }),
        })
    }

    /// Drops the collection with its documents and indexes. Dropping a
    /// collection that does not exist is a no-op.
    // must stay on the handle: through Deref the Arc's Drop::drop wins
    pub fn drop(&self) -> BasaltResult<()> {
        let command = self.inner.command("drop");
        self.inner.run_ignoring_missing(command)?;
        Ok(())
    }
}

impl Deref for Collection {
    type Target = Arc<CollectionInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct CollectionInner {
    database: String,
    name: Atomic<String>,
    connection: StoreConnection,
    settings: Atomic<CollectionSettings>,
}

impl CollectionInner {
    pub fn name(&self) -> String {
        self.name.read_with(|it| it.clone())
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// `database.collection`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.name())
    }

    /// Creates an index on `keys` unless an equivalent one exists.
    ///
    /// Options the typed builder does not cover can be passed through with
    /// [IndexOptions::option] and reach the store verbatim.
    pub fn ensure_index(&self, keys: Document, options: IndexOptions) -> BasaltResult<()> {
        let spec = IndexSpec::new(keys)?.with_options(options)?;
        self.create_index(&spec)?;
        Ok(())
    }

    /// Creates an index and returns its name.
    pub fn create_index(&self, spec: &IndexSpec) -> BasaltResult<String> {
        let mut command = self.command("createIndexes");
        command.insert("indexes", vec![Value::Document(spec.to_document())]);
        self.run(command)?;
        Ok(spec.name())
    }

    /// Drops the index whose key pattern equals `keys` exactly, including
    /// field order and kind tokens.
    ///
    /// # Errors
    ///
    /// [ErrorKind::IndexNotFound] when no index has that pattern.
    pub fn drop_index(&self, keys: &Document) -> BasaltResult<()> {
        if keys.is_empty() {
            log::error!("Index key pattern cannot be empty");
            return Err(BasaltError::new(
                "Index key pattern cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        let mut command = self.command("dropIndexes");
        command.insert("index", keys.clone());
        self.run_ignoring_missing(command)?;
        Ok(())
    }

    /// Drops an index by name.
    pub fn drop_index_by_name(&self, name: &str) -> BasaltResult<()> {
        if name.is_empty() || name == ALL_INDEXES {
            log::error!("Invalid index name '{}'", name);
            return Err(BasaltError::new(
                &format!("Invalid index name '{}'", name),
                ErrorKind::ValidationError,
            ));
        }
        let mut command = self.command("dropIndexes");
        command.insert("index", name);
        self.run_ignoring_missing(command)?;
        Ok(())
    }

    /// Drops every index except the one on `_id`.
    pub fn drop_indexes(&self) -> BasaltResult<()> {
        let mut command = self.command("dropIndexes");
        command.insert("index", ALL_INDEXES);
        self.run_ignoring_missing(command)?;
        Ok(())
    }

    /// Lists index descriptors. An absent collection has none.
    pub fn list_indexes(&self) -> BasaltResult<Vec<IndexInfo>> {
        let command = self.command("listIndexes");
        match self.run_ignoring_missing(command)? {
            Some(payload) => Ok(CommandResult::first_batch(&payload)
                .into_iter()
                .map(IndexInfo::new)
                .collect()),
            None => Ok(vec![]),
        }
    }

    /// Distinct values of `field` among documents matching `filter`.
    /// Array fields contribute their elements.
    pub fn distinct(&self, field: &str, filter: Option<Document>) -> BasaltResult<Vec<Value>> {
        if field.is_empty() {
            log::error!("Distinct field cannot be empty");
            return Err(BasaltError::new(
                "Distinct field cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        let mut command = self.command("distinct");
        command.insert("key", field);
        command.insert("query", filter.unwrap_or_default());
        let payload = self.run(command)?;
        match payload.get("values") {
            Some(Value::Array(values)) => Ok(values.clone()),
            _ => Ok(vec![]),
        }
    }

    /// Renames the collection; this handle follows the new name.
    ///
    /// # Errors
    ///
    /// * [ErrorKind::NameConflict] if `new_name` exists and `drop_target`
    ///   is false
    /// * [ErrorKind::CommandFailure] if this collection does not exist
    pub fn rename(&self, new_name: &str, drop_target: bool) -> BasaltResult<()> {
        validate_collection_name(new_name)?;
        let mut command = Document::new();
        command.insert("renameCollection", self.namespace());
        command.insert("to", format!("{}.{}", self.database, new_name));
        command.insert("dropTarget", drop_target);
        self.run(command)?;
        self.name.write_with(|it| *it = new_name.to_string());
        Ok(())
    }

    /// Inserts a document and returns its `_id`, generating an [ObjectId]
    /// when the document has none.
    pub fn insert(&self, document: Document) -> BasaltResult<Value> {
        let mut ids = self.insert_many(vec![document])?;
        ids.pop().ok_or_else(|| {
            log::error!("Insert did not report an id");
            BasaltError::new("Insert did not report an id", ErrorKind::InternalError)
        })
    }

    /// Inserts documents in order and returns their `_id`s. A failure
    /// stops the batch; documents before it stay inserted.
    pub fn insert_many(&self, documents: Vec<Document>) -> BasaltResult<Vec<Value>> {
        let mut ids = Vec::with_capacity(documents.len());
        let mut batch = Vec::with_capacity(documents.len());
        for document in documents {
            let document = with_id(document);
            ids.push(document.id().cloned().unwrap_or_default());
            batch.push(Value::Document(document));
        }

        let mut command = self.command("insert");
        command.insert("documents", batch);
        self.run(command)?;
        Ok(ids)
    }

    /// Inserts the document, or replaces the stored one with the same `_id`.
    pub fn save(&self, document: Document) -> BasaltResult<WriteResult> {
        match document.id().cloned() {
            Some(id) => {
                let mut query = Document::new();
                query.insert(DOC_ID, id);
                self.update(query, document, UpdateOptions::new().upsert(true))
            }
            None => {
                let id = self.insert(document)?;
                Ok(WriteResult::new(1, 0, Some(id)))
            }
        }
    }

    pub fn find(&self, filter: Document) -> BasaltResult<Vec<Document>> {
        self.find_with_options(filter, &FindOptions::default())
    }

    pub fn find_with_options(
        &self,
        filter: Document,
        options: &FindOptions,
    ) -> BasaltResult<Vec<Document>> {
        let mut command = self.command("find");
        command.insert("filter", filter);
        if let Some(projection) = &options.projection {
            command.insert("projection", projection.clone());
        }
        if let Some(sort) = &options.sort {
            command.insert("sort", sort.clone());
        }
        if let Some(skip) = options.skip {
            command.insert("skip", skip as i64);
        }
        if let Some(limit) = options.limit {
            command.insert("limit", limit);
        }
        let payload = self.run(command)?;
        Ok(CommandResult::first_batch(&payload))
    }

    pub fn find_one(&self, filter: Document) -> BasaltResult<Option<Document>> {
        let mut found = self.find_with_options(filter, &FindOptions::new().limit(1))?;
        Ok(found.pop())
    }

    pub fn find_by_id<T: Into<Value>>(&self, id: T) -> BasaltResult<Option<Document>> {
        let mut filter = Document::new();
        filter.insert(DOC_ID, id.into());
        self.find_one(filter)
    }

    pub fn count(&self, filter: Document) -> BasaltResult<u64> {
        let mut command = self.command("count");
        command.insert("query", filter);
        let payload = self.run(command)?;
        Ok(payload
            .get("n")
            .and_then(|v| v.as_i64())
            .map(|n| n.max(0) as u64)
            .unwrap_or(0))
    }

    /// Updates the first matching document, or all of them with
    /// [UpdateOptions::multi]. `update` is either a modifier document
    /// (`$set`, `$unset`, `$inc`, `$push`) or a replacement that keeps `_id`.
    pub fn update(
        &self,
        query: Document,
        update: Document,
        options: UpdateOptions,
    ) -> BasaltResult<WriteResult> {
        let mut statement = Document::new();
        statement.insert("q", query);
        statement.insert("u", update);
        statement.insert("upsert", options.upsert);
        statement.insert("multi", options.multi);

        let mut command = self.command("update");
        command.insert("updates", vec![Value::Document(statement)]);
        let payload = self.run(command)?;

        let n = payload.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
        let modified = payload
            .get("nModified")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let upserted_id = payload.get("upserted.0._id").cloned();
        Ok(WriteResult::new(n, modified, upserted_id))
    }

    /// Removes every document matching `query`.
    pub fn remove(&self, query: Document) -> BasaltResult<WriteResult> {
        let mut statement = Document::new();
        statement.insert("q", query);
        statement.insert("limit", 0);

        let mut command = self.command("delete");
        command.insert("deletes", vec![Value::Document(statement)]);
        let payload = self.run(command)?;
        let n = payload.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(WriteResult::new(n, 0, None))
    }

    /// Atomically applies `update` to one document matching `query` and
    /// returns it as it was before the update, unless the collection is
    /// configured to return the updated version. Returns `None` when
    /// nothing matched.
    pub fn find_and_modify(&self, query: Document, update: Document) -> BasaltResult<Option<Value>> {
        let options = FindAndModifyOptions::new().query(query).update(update);
        self.find_and_modify_with_options(&options)
    }

    /// Full form of [CollectionInner::find_and_modify].
    ///
    /// The matched document is decoded with the collection's decoder
    /// factory, so type bindings shape the returned value.
    ///
    /// # Errors
    ///
    /// [ErrorKind::ValidationError] unless exactly one of `update` and
    /// `remove` is set, or when `upsert` is combined with `remove`.
    pub fn find_and_modify_with_options(
        &self,
        options: &FindAndModifyOptions,
    ) -> BasaltResult<Option<Value>> {
        if options.update.is_some() == options.remove {
            log::error!("Exactly one of update or remove must be specified");
            return Err(BasaltError::new(
                "Exactly one of update or remove must be specified",
                ErrorKind::ValidationError,
            ));
        }
        if options.remove && options.upsert {
            log::error!("Upsert cannot be combined with remove");
            return Err(BasaltError::new(
                "Upsert cannot be combined with remove",
                ErrorKind::ValidationError,
            ));
        }

        let (factory, bindings, default_mode) = self.settings.read_with(|it| {
            (
                it.decoder_factory.clone(),
                it.type_bindings.clone(),
                it.return_document,
            )
        });
        let mode = options.return_document.unwrap_or(default_mode);

        let mut command = self.command("findAndModify");
        command.insert("query", options.query.clone().unwrap_or_default());
        if let Some(sort) = &options.sort {
            command.insert("sort", sort.clone());
        }
        if let Some(fields) = &options.fields {
            command.insert("fields", fields.clone());
        }
        if let Some(update) = &options.update {
            command.insert("update", update.clone());
        }
        command.insert("remove", options.remove);
        command.insert("new", mode == ReturnDocument::After && !options.remove);
        command.insert("upsert", options.upsert);

        let mut payload = self.run(command)?;
        match payload.remove("value") {
            Some(Value::Document(raw)) => {
                let mut decoder = factory.create();
                decoder.decode(raw, &bindings).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Groups documents and reduces each group. See [GroupEngine].
    pub fn group(&self, command: GroupCommand) -> BasaltResult<Vec<Document>> {
        GroupEngine::new().execute(self, command)
    }

    pub fn set_decoder_factory<F: DecoderFactory + 'static>(&self, factory: F) {
        self.settings
            .write_with(|it| it.decoder_factory = Arc::new(factory));
    }

    /// Binds `factory` to the embedded documents found at `path` in
    /// decoded results.
    pub fn set_type_binding<F: ObjectFactory + 'static>(&self, path: &str, factory: F) {
        self.settings
            .write_with(|it| it.type_bindings.bind(path, factory));
    }

    /// Factory for embedded documents with no binding of their own.
    pub fn set_default_type<F: ObjectFactory + 'static>(&self, factory: F) {
        self.settings
            .write_with(|it| it.type_bindings.set_default(factory));
    }

    pub fn set_return_document(&self, return_document: ReturnDocument) {
        self.settings
            .write_with(|it| it.return_document = return_document);
    }

    pub fn type_bindings(&self) -> TypeBindings {
        self.settings.read_with(|it| it.type_bindings.clone())
    }

    pub fn return_document(&self) -> ReturnDocument {
        self.settings.read_with(|it| it.return_document)
    }

    fn command(&self, name: &str) -> Document {
        let mut command = Document::new();
        command.insert(name, self.name());
        command
    }

    fn run(&self, command: Document) -> BasaltResult<Document> {
        self.connection
            .execute(&self.database, &command)?
            .into_result()
    }

    /// Runs `command`, treating "namespace not found" as an empty success.
    fn run_ignoring_missing(&self, command: Document) -> BasaltResult<Option<Document>> {
        let result = self.connection.execute(&self.database, &command)?;
        if !result.is_ok() && result.code() == Some(CODE_NAMESPACE_NOT_FOUND) {
            log::warn!(
                "{} on missing collection {} ignored",
                command.first_key().unwrap_or_default(),
                self.namespace()
            );
            return Ok(None);
        }
        result.into_result().map(Some)
    }
}

fn with_id(document: Document) -> Document {
    if document.has_id() {
        return document;
    }
    let mut result = Document::with_capacity(document.size() + 1);
    result.insert(DOC_ID, ObjectId::new());
    result.extend(document);
    result
}

pub(crate) fn validate_collection_name(name: &str) -> BasaltResult<()> {
    if name.is_empty() {
        log::error!("Collection name cannot be empty");
        return Err(BasaltError::new(
            "Collection name cannot be empty",
            ErrorKind::ValidationError,
        ));
    }
    if name.contains('$') || name.contains('\0') {
        log::error!("Collection name '{}' contains an invalid character", name);
        return Err(BasaltError::new(
            &format!("Collection name '{}' contains an invalid character", name),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DefaultDecoder, DocumentDecoder};
    use crate::doc;
    use crate::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collection(name: &str) -> Collection {
        let connection = StoreConnection::new(InMemoryStore::new());
        Collection::new("test", name, connection, &BasaltConfig::new()).unwrap()
    }

    #[test]
    fn test_invalid_names() {
        let connection = StoreConnection::new(InMemoryStore::new());
        let config = BasaltConfig::new();
        assert!(Collection::new("test", "", connection.clone(), &config).is_err());
        assert!(Collection::new("test", "a$b", connection, &config).is_err());
    }

    #[test]
    fn test_namespace() {
        let c = collection("users");
        assert_eq!(c.name(), "users");
        assert_eq!(c.database_name(), "test");
        assert_eq!(c.namespace(), "test.users");
    }

    #[test]
    fn test_insert_generates_id_first() {
        let c = collection("c");
        let id = c.insert(doc! { a: 1 }).unwrap();
        assert!(id.as_object_id().is_some());
        let stored = c.find_by_id(id.clone()).unwrap().unwrap();
        assert_eq!(stored.first_key(), Some("_id"));
        assert_eq!(stored.id(), Some(&id));
    }

    #[test]
    fn test_insert_duplicate_id() {
        let c = collection("c");
        c.insert(doc! { _id: 1 }).unwrap();
        let error = c.insert(doc! { _id: 1 }).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::DuplicateKey);
        assert!(error.message().contains("duplicate key"));
    }

    #[test]
    fn test_save_inserts_then_replaces() {
        let c = collection("c");
        let inserted = c.save(doc! { _id: 1, v: 1 }).unwrap();
        assert_eq!(inserted.upserted_id(), Some(&Value::I32(1)));

        let replaced = c.save(doc! { _id: 1, v: 2 }).unwrap();
        assert!(replaced.is_updated_existing());
        assert_eq!(c.find_by_id(1).unwrap(), Some(doc! { _id: 1, v: 2 }));
    }

    #[test]
    fn test_update_and_remove() {
        let c = collection("c");
        c.insert_many(vec![doc! { k: 1 }, doc! { k: 1 }, doc! { k: 2 }])
            .unwrap();

        let single = c
            .update(doc! { k: 1 }, doc! { "$set": { s: 1 } }, UpdateOptions::new())
            .unwrap();
        assert_eq!(single.affected(), 1);

        let multi = c
            .update(
                doc! { k: 1 },
                doc! { "$set": { s: 2 } },
                UpdateOptions::new().multi(true),
            )
            .unwrap();
        assert_eq!(multi.affected(), 2);
        assert_eq!(multi.modified(), 2);

        let removed = c.remove(doc! { k: 1 }).unwrap();
        assert_eq!(removed.affected(), 2);
        assert_eq!(c.count(doc! {}).unwrap(), 1);
    }

    #[test]
    fn test_numeric_type_changes_are_stored() {
        let c = collection("c");
        c.insert(doc! { _id: 1, n: 1 }).unwrap();

        let result = c
            .update(doc! { _id: 1 }, doc! { "$set": { n: 1.0 } }, UpdateOptions::new())
            .unwrap();
        assert_eq!(result.modified(), 1);
        let stored = c.find_by_id(1).unwrap().unwrap();
        assert!(matches!(stored.get("n"), Some(Value::F64(_))));

        c.save(doc! { _id: 1, n: (1i64) }).unwrap();
        let stored = c.find_by_id(1).unwrap().unwrap();
        assert!(matches!(stored.get("n"), Some(Value::I64(1))));

        let options = FindAndModifyOptions::new()
            .query(doc! { _id: 1 })
            .update(doc! { "$set": { n: 1 } })
            .return_document(ReturnDocument::After);
        let returned = c.find_and_modify_with_options(&options).unwrap().unwrap();
        assert!(matches!(
            returned.as_document().and_then(|d| d.get("n")),
            Some(Value::I32(1))
        ));
        let stored = c.find_by_id(1).unwrap().unwrap();
        assert!(matches!(stored.get("n"), Some(Value::I32(1))));
    }

    #[test]
    fn test_find_with_options() {
        let c = collection("c");
        for i in 0..5 {
            c.insert(doc! { _id: i, n: i }).unwrap();
        }
        let found = c
            .find_with_options(
                doc! {},
                &FindOptions::new()
                    .sort(doc! { n: (-1) })
                    .skip(1)
                    .limit(2)
                    .projection(doc! { n: 1, _id: 0 }),
            )
            .unwrap();
        assert_eq!(found, vec![doc! { n: 3 }, doc! { n: 2 }]);
        assert_eq!(c.find_one(doc! { n: { "$gt": 10 } }).unwrap(), None);
    }

    #[test]
    fn test_drop_missing_collection_is_noop() {
        let c = collection("missing");
        assert!(c.drop().is_ok());
        assert!(c.drop_indexes().is_ok());
        assert!(c.drop_index(&doc! { a: 1 }).is_ok());
        assert!(c.list_indexes().unwrap().is_empty());
    }

    #[test]
    fn test_index_lifecycle() {
        let c = collection("c");
        c.ensure_index(doc! { a: 1 }, IndexOptions::new()).unwrap();
        c.ensure_index(doc! { b: (-1) }, IndexOptions::new().unique(true))
            .unwrap();
        // second call with the same spec is a no-op
        c.ensure_index(doc! { a: 1 }, IndexOptions::new()).unwrap();

        let indexes = c.list_indexes().unwrap();
        let names: Vec<&str> = indexes.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["_id_", "a_1", "b_-1"]);
        assert!(indexes[2].is_unique());

        let error = c.drop_index(&doc! { a: (-1) }).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::IndexNotFound);
        c.drop_index(&doc! { a: 1 }).unwrap();
        c.drop_index_by_name("b_-1").unwrap();
        assert_eq!(c.list_indexes().unwrap().len(), 1);
        assert!(c.drop_index_by_name("*").is_err());
        assert!(c.drop_index(&doc! {}).is_err());
    }

    #[test]
    fn test_rename_updates_handle() {
        let c = collection("a");
        c.insert(doc! { _id: 1 }).unwrap();
        c.rename("b", false).unwrap();
        assert_eq!(c.name(), "b");
        assert_eq!(c.find(doc! {}).unwrap(), vec![doc! { _id: 1 }]);
    }

    #[test]
    fn test_rename_to_own_name() {
        let c = collection("a");
        c.insert(doc! { _id: 1 }).unwrap();
        c.rename("a", true).unwrap();
        assert_eq!(c.name(), "a");
        assert_eq!(c.find(doc! {}).unwrap(), vec![doc! { _id: 1 }]);

        let error = c.rename("a", false).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::NameConflict);
    }

    #[test]
    fn test_rename_missing_source() {
        let c = collection("a");
        let error = c.rename("b", false).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::CommandFailure);
        assert_eq!(error.message(), "source namespace does not exist");
        assert_eq!(c.name(), "a");
    }

    #[test]
    fn test_distinct() {
        let c = collection("c");
        c.insert_many(vec![
            doc! { v: 1, tag: ["x", "y"] },
            doc! { v: 1, tag: "z" },
            doc! { v: 2, tag: ["x"] },
        ])
        .unwrap();
        assert_eq!(
            c.distinct("v", None).unwrap(),
            vec![Value::I32(1), Value::I32(2)]
        );
        assert_eq!(
            c.distinct("tag", Some(doc! { v: 1 })).unwrap(),
            vec![Value::from("x"), Value::from("y"), Value::from("z")]
        );
        assert!(c.distinct("", None).is_err());
    }

    #[test]
    fn test_find_and_modify_returns_before_by_default() {
        let c = collection("c");
        c.insert(doc! { _id: 1, n: 1 }).unwrap();
        let before = c
            .find_and_modify(doc! { _id: 1 }, doc! { "$inc": { n: 1 } })
            .unwrap();
        assert_eq!(before, Some(Value::from(doc! { _id: 1, n: 1 })));

        c.set_return_document(ReturnDocument::After);
        let after = c
            .find_and_modify(doc! { _id: 1 }, doc! { "$inc": { n: 1 } })
            .unwrap();
        assert_eq!(after, Some(Value::from(doc! { _id: 1, n: 3 })));

        let none = c
            .find_and_modify(doc! { _id: 2 }, doc! { "$inc": { n: 1 } })
            .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_find_and_modify_validation() {
        let c = collection("c");
        let neither = c.find_and_modify_with_options(&FindAndModifyOptions::new());
        assert_eq!(neither.unwrap_err().kind(), &ErrorKind::ValidationError);
        let both = c.find_and_modify_with_options(
            &FindAndModifyOptions::new()
                .update(doc! { "$set": { a: 1 } })
                .remove(true),
        );
        assert_eq!(both.unwrap_err().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_find_and_modify_uses_type_bindings() {
        let c = collection("c");
        c.insert(doc! { _id: 1, address: { city: "Oslo" } }).unwrap();
        c.set_type_binding("address", |_: &str, document: Document| -> BasaltResult<Value> {
            let city = document.get("city").cloned().unwrap_or_default();
            Ok(Value::from(format!("Address({})", city)))
        });

        let value = c
            .find_and_modify(doc! { _id: 1 }, doc! { "$set": { seen: true } })
            .unwrap()
            .unwrap();
        assert_eq!(
            value.as_document().unwrap().get("address"),
            Some(&Value::from("Address(Oslo)"))
        );
    }

    struct CountingFactory(Arc<AtomicUsize>);

    impl DecoderFactory for CountingFactory {
        fn create(&self) -> Box<dyn DocumentDecoder> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::new(DefaultDecoder::new())
        }
    }

    #[test]
    fn test_decoder_created_per_response() {
        let c = collection("c");
        let created = Arc::new(AtomicUsize::new(0));
        c.set_decoder_factory(CountingFactory(created.clone()));
        c.insert(doc! { _id: 1, n: 0 }).unwrap();

        for _ in 0..3 {
            c.find_and_modify(doc! { _id: 1 }, doc! { "$inc": { n: 1 } })
                .unwrap();
        }
        // no match, no response to decode
        c.find_and_modify(doc! { _id: 2 }, doc! { "$inc": { n: 1 } })
            .unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 3);
    }
}
