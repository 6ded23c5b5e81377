use super::catalog::{namespace, CollectionState, DatabaseState};
use super::matcher::{resolve, Filter};
use super::query::{Projection, SortOrder};
use super::reply::{cursor_reply, ok_reply, CommandError, CommandOutcome};
use super::updater::{with_leading_id, Update};
use crate::collection::{Document, ObjectId};
use crate::common::{
    atomic, Atomic, ReadExecutor, Value, WriteExecutor, CODE_BAD_VALUE, CODE_COMMAND_NOT_FOUND,
    CODE_FAILED_TO_PARSE, CODE_ILLEGAL_OPERATION, CODE_INVALID_NAMESPACE,
    CODE_NAMESPACE_EXISTS, CODE_NAMESPACE_NOT_FOUND, DOC_ID,
};
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use crate::store::StoreConnectionProvider;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory implementation of the store command set.
///
/// # Purpose
/// `InMemoryStore` interprets command documents entirely in process. It is
/// the reference backend for tests and temporary data: nothing is
/// persisted and everything is lost when the last handle goes away.
///
/// # Characteristics
/// - **Thread-Safe**: databases live in a concurrent map and each database
///   is guarded by its own read-write lock, so every command is atomic with
///   respect to other commands on the same database
/// - **Command Replies**: rejections come back as `{ok: 0, errmsg, code}`
///   replies, exactly like a remote store would answer
/// - **Lazy Creation**: databases and collections appear on first write
///
/// # Usage
/// ```text
/// let connection = StoreConnection::new(InMemoryStore::new());
/// let reply = connection.execute("app", &doc!{ insert: "users", documents: [{ name: "a" }] })?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore {
            inner: Arc::new(InMemoryStoreInner::new()),
        }
    }
}

impl StoreConnectionProvider for InMemoryStore {
    fn run_command(&self, database: &str, command: &Document) -> BasaltResult<Document> {
        self.inner.run_command(database, command)
    }

    fn database_names(&self) -> BasaltResult<Vec<String>> {
        self.inner.database_names()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    fn close(&self) -> BasaltResult<()> {
        self.inner.close()
    }
}

#[derive(Default)]
struct InMemoryStoreInner {
    closed: AtomicBool,
    databases: DashMap<String, Atomic<DatabaseState>>,
}

impl InMemoryStoreInner {
    fn new() -> Self {
        InMemoryStoreInner {
            closed: AtomicBool::from(false),
            databases: DashMap::new(),
        }
    }

    fn check_opened(&self) -> BasaltResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            log::error!("In-memory store is already closed");
            return Err(BasaltError::new(
                "In-memory store is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn database_names(&self) -> BasaltResult<Vec<String>> {
        self.check_opened()?;
        let mut names: Vec<String> = self.databases.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn close(&self) -> BasaltResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        self.databases.clear();
        Ok(())
    }

    fn database(&self, name: &str) -> Atomic<DatabaseState> {
        // clone the handle out so the map shard is not held while locking
        self.databases
            .entry(name.to_string())
            .or_insert_with(|| atomic(DatabaseState::new()))
            .value()
            .clone()
    }

    /// Runs a read-only command. Unknown databases read as empty and are
    /// not created.
    fn read_database<R>(&self, name: &str, f: impl FnOnce(&DatabaseState) -> R) -> R {
        let existing = self.databases.get(name).map(|e| e.value().clone());
        match existing {
            Some(database) => database.read_with(f),
            None => f(&DatabaseState::new()),
        }
    }

    fn run_command(&self, database: &str, command: &Document) -> BasaltResult<Document> {
        self.check_opened()?;
        let name = command.first_key().ok_or_else(|| {
            log::error!("Command document is empty");
            BasaltError::new("Command document is empty", ErrorKind::InvalidOperation)
        })?;

        let outcome = match name {
            "ping" => Ok(ok_reply(Document::new())),
            "dropDatabase" => Ok(self.drop_database(database)),
            "renameCollection" => self.rename_collection(command),
            "listCollections" | "find" | "count" | "distinct" | "listIndexes" => {
                self.read_database(database, |db| match name {
                    "listCollections" => Ok(list_collections(database, db)),
                    "find" => find(database, db, command),
                    "count" => count(db, command),
                    "distinct" => distinct(db, command),
                    _ => list_indexes(database, db, command),
                })
            }
            "drop" | "create" | "insert" | "update" | "delete" | "findAndModify"
            | "createIndexes" | "dropIndexes" => {
                self.database(database).write_with(|db| match name {
                    "drop" => drop_collection(database, db, command),
                    "create" => create_collection(database, db, command),
                    "insert" => insert(database, db, command),
                    "update" => update(database, db, command),
                    "delete" => delete(db, command),
                    "findAndModify" => find_and_modify(database, db, command),
                    "createIndexes" => create_indexes(database, db, command),
                    _ => drop_indexes(db, command),
                })
            }
            other => Err(CommandError::new(
                CODE_COMMAND_NOT_FOUND,
                format!("no such command: '{}'", other),
            )),
        };

        match outcome {
            Ok(reply) => Ok(reply),
            Err(error) => {
                log::debug!("Command {} on {} rejected: {}", name, database, error);
                Ok(error.to_reply())
            }
        }
    }

    fn drop_database(&self, database: &str) -> Document {
        self.databases.remove(database);
        let mut body = Document::new();
        body.insert("dropped", database);
        ok_reply(body)
    }

    fn rename_collection(&self, command: &Document) -> CommandOutcome<Document> {
        let source = string_arg(command, "renameCollection")?;
        let target = string_arg(command, "to")?;
        let drop_target = flag_arg(command, "dropTarget");

        let (source_db, source_name) = split_namespace(source)?;
        let (target_db, target_name) = split_namespace(target)?;
        if source_db != target_db {
            return Err(CommandError::new(
                CODE_ILLEGAL_OPERATION,
                "renaming a collection across databases is not supported",
            ));
        }
        self.database(source_db).write_with(|db| {
            if !db.contains(source_name) {
                return Err(CommandError::new(
                    CODE_NAMESPACE_NOT_FOUND,
                    "source namespace does not exist",
                ));
            }
            if source_name == target_name && drop_target {
                return Ok(ok_reply(Document::new()));
            }
            if db.contains(target_name) {
                if !drop_target {
                    return Err(CommandError::new(
                        CODE_NAMESPACE_EXISTS,
                        "target namespace exists",
                    ));
                }
                db.remove(target_name);
            }

            if let Some(mut state) = db.remove(source_name) {
                state.set_namespace(target);
                db.put(target_name, state);
            }
            Ok(ok_reply(Document::new()))
        })
    }
}

fn split_namespace(namespace: &str) -> CommandOutcome<(&str, &str)> {
    match namespace.split_once('.') {
        Some((db, collection)) if !db.is_empty() && !collection.is_empty() => {
            Ok((db, collection))
        }
        _ => Err(CommandError::new(
            CODE_INVALID_NAMESPACE,
            format!("Invalid namespace specified '{}'", namespace),
        )),
    }
}

fn string_arg<'a>(command: &'a Document, field: &str) -> CommandOutcome<&'a str> {
    match command.get(field) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(CommandError::new(
            CODE_BAD_VALUE,
            format!("'{}' must be a non-empty string", field),
        )),
    }
}

fn document_arg<'a>(command: &'a Document, field: &str) -> CommandOutcome<Option<&'a Document>> {
    match command.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Document(doc)) => Ok(Some(doc)),
        Some(other) => Err(CommandError::new(
            CODE_BAD_VALUE,
            format!("'{}' must be an object, found {}", field, other.type_name()),
        )),
    }
}

fn array_arg<'a>(command: &'a Document, field: &str) -> CommandOutcome<&'a Vec<Value>> {
    command.get(field).and_then(|v| v.as_array()).ok_or_else(|| {
        CommandError::new(CODE_BAD_VALUE, format!("'{}' must be an array", field))
    })
}

fn documents_of<'a>(values: &'a [Value], field: &str) -> CommandOutcome<Vec<&'a Document>> {
    values
        .iter()
        .map(|v| {
            v.as_document().ok_or_else(|| {
                CommandError::new(
                    CODE_BAD_VALUE,
                    format!("'{}' entries must be objects", field),
                )
            })
        })
        .collect()
}

fn flag_arg(command: &Document, field: &str) -> bool {
    command.get(field).map(|v| v.is_truthy()).unwrap_or(false)
}

fn filter_arg(command: &Document, field: &str) -> CommandOutcome<Filter> {
    match document_arg(command, field)? {
        Some(filter) => Filter::parse(filter),
        None => Ok(Filter::match_all()),
    }
}

fn matching_positions(state: &CollectionState, filter: &Filter) -> Vec<usize> {
    state
        .documents()
        .iter()
        .enumerate()
        .filter(|(_, doc)| filter.matches(doc))
        .map(|(position, _)| position)
        .collect()
}

fn ns_not_found() -> CommandError {
    CommandError::new(CODE_NAMESPACE_NOT_FOUND, "ns not found")
}

fn list_collections(database: &str, db: &DatabaseState) -> Document {
    let collections = db
        .names()
        .into_iter()
        .map(|name| {
            let mut info = Document::new();
            info.insert("name", name);
            info.insert("type", "collection");
            info
        })
        .collect();
    cursor_reply(&format!("{}.$cmd.listCollections", database), collections)
}

fn drop_collection(
    database: &str,
    db: &mut DatabaseState,
    command: &Document,
) -> CommandOutcome<Document> {
    let name = string_arg(command, "drop")?;
    let state = db.remove(name).ok_or_else(ns_not_found)?;

    let mut body = Document::new();
    body.insert("ns", namespace(database, name));
    body.insert("nIndexesWas", state.indexes().len());
    Ok(ok_reply(body))
}

fn create_collection(
    database: &str,
    db: &mut DatabaseState,
    command: &Document,
) -> CommandOutcome<Document> {
    let name = string_arg(command, "create")?;
    if db.contains(name) {
        return Err(CommandError::new(
            CODE_NAMESPACE_EXISTS,
            format!(
                "Collection already exists. NS: {}",
                namespace(database, name)
            ),
        ));
    }
    db.get_or_create(database, name);
    Ok(ok_reply(Document::new()))
}

fn insert(database: &str, db: &mut DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "insert")?;
    let documents = documents_of(array_arg(command, "documents")?, "documents")?;
    let (state, _) = db.get_or_create(database, name);

    let mut inserted = 0;
    for document in documents {
        let document = if document.has_id() {
            document.clone()
        } else {
            with_leading_id(document.clone(), Value::ObjectId(ObjectId::new()))
        };
        // ordered insert: stop at the first failure, keep what went in
        state.insert(document)?;
        inserted += 1;
    }

    let mut body = Document::new();
    body.insert("n", inserted);
    Ok(ok_reply(body))
}

fn find(database: &str, db: &DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "find")?;
    let filter = filter_arg(command, "filter")?;
    let projection = Projection::parse(document_arg(command, "projection")?)?;
    let sort = match document_arg(command, "sort")? {
        Some(sort) => SortOrder::parse(sort)?,
        None => SortOrder::default(),
    };
    let skip = command.get("skip").and_then(|v| v.as_i64()).unwrap_or(0);
    let limit = command.get("limit").and_then(|v| v.as_i64()).unwrap_or(0);
    if skip < 0 {
        return Err(CommandError::new(CODE_BAD_VALUE, "skip value must be non-negative"));
    }

    let mut documents: Vec<Document> = match db.collection(name) {
        Some(state) => state
            .documents()
            .iter()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    sort.sort(&mut documents);

    let limit = if limit == 0 {
        usize::MAX
    } else {
        limit.unsigned_abs() as usize
    };
    let documents = documents
        .into_iter()
        .skip(skip as usize)
        .take(limit)
        .map(|doc| projection.apply(doc))
        .collect();
    Ok(cursor_reply(&namespace(database, name), documents))
}

fn count(db: &DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "count")?;
    let filter = filter_arg(command, "query")?;
    let n = db
        .collection(name)
        .map(|state| matching_positions(state, &filter).len())
        .unwrap_or(0);

    let mut body = Document::new();
    body.insert("n", n);
    Ok(ok_reply(body))
}

fn distinct(db: &DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "distinct")?;
    let key = string_arg(command, "key")?;
    let filter = filter_arg(command, "query")?;

    let mut values = BTreeSet::new();
    if let Some(state) = db.collection(name) {
        for document in state.documents().iter().filter(|doc| filter.matches(doc)) {
            for value in resolve(document, key) {
                match value {
                    Value::Array(items) => values.extend(items.iter().cloned()),
                    other => {
                        values.insert(other.clone());
                    }
                }
            }
        }
    }

    let mut body = Document::new();
    body.insert("values", Value::Array(values.into_iter().collect()));
    Ok(ok_reply(body))
}

fn update(database: &str, db: &mut DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "update")?;
    let statements = documents_of(array_arg(command, "updates")?, "updates")?;

    let mut matched = 0;
    let mut modified = 0;
    let mut upserted = Vec::new();
    for (index, statement) in statements.into_iter().enumerate() {
        let query = document_arg(statement, "q")?.cloned().unwrap_or_default();
        let update_doc = document_arg(statement, "u")?.ok_or_else(|| {
            CommandError::new(CODE_FAILED_TO_PARSE, "update statement is missing 'u'")
        })?;
        let update = Update::parse(update_doc)?;
        let multi = flag_arg(statement, "multi");
        let upsert = flag_arg(statement, "upsert");
        if multi && matches!(update, Update::Replacement(_)) {
            return Err(CommandError::new(
                CODE_FAILED_TO_PARSE,
                "multi update is not supported for replacement-style update",
            ));
        }

        let filter = Filter::parse(&query)?;
        let mut positions = db
            .collection(name)
            .map(|state| matching_positions(state, &filter))
            .unwrap_or_default();
        if !multi {
            positions.truncate(1);
        }

        if positions.is_empty() {
            if upsert {
                let document = update.upsert_document(&query)?;
                let id = document.id().cloned().unwrap_or_default();
                let (state, _) = db.get_or_create(database, name);
                state.insert(document)?;
                matched += 1;

                let mut entry = Document::new();
                entry.insert("index", index);
                entry.insert(DOC_ID, id);
                upserted.push(Value::Document(entry));
            }
            continue;
        }

        if let Some(state) = db.collection_mut(name) {
            for position in positions {
                let mut document = state.documents()[position].clone();
                let changed = update.apply(&mut document, false)?;
                matched += 1;
                if changed {
                    state.replace(position, document)?;
                    modified += 1;
                }
            }
        }
    }

    let mut body = Document::new();
    body.insert("n", matched);
    body.insert("nModified", modified);
    if !upserted.is_empty() {
        body.insert("upserted", Value::Array(upserted));
    }
    Ok(ok_reply(body))
}

fn delete(db: &mut DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "delete")?;
    let statements = documents_of(array_arg(command, "deletes")?, "deletes")?;

    let mut removed = 0;
    for statement in statements {
        let filter = filter_arg(statement, "q")?;
        let limit = statement.get("limit").and_then(|v| v.as_i64()).unwrap_or(0);
        if let Some(state) = db.collection_mut(name) {
            let mut positions = matching_positions(state, &filter);
            if limit == 1 {
                positions.truncate(1);
            }
            removed += state.remove_positions(&positions);
        }
    }

    let mut body = Document::new();
    body.insert("n", removed);
    Ok(ok_reply(body))
}

fn find_and_modify(
    database: &str,
    db: &mut DatabaseState,
    command: &Document,
) -> CommandOutcome<Document> {
    let name = string_arg(command, "findAndModify")?;
    let query = document_arg(command, "query")?.cloned().unwrap_or_default();
    let filter = Filter::parse(&query)?;
    let projection = Projection::parse(document_arg(command, "fields")?)?;
    let sort = match document_arg(command, "sort")? {
        Some(sort) => SortOrder::parse(sort)?,
        None => SortOrder::default(),
    };
    let remove = flag_arg(command, "remove");
    let return_new = flag_arg(command, "new");
    let upsert = flag_arg(command, "upsert");
    let update = match document_arg(command, "update")? {
        Some(update) => Some(Update::parse(update)?),
        None => None,
    };

    match (&update, remove) {
        (Some(_), true) => {
            return Err(CommandError::new(
                CODE_FAILED_TO_PARSE,
                "Cannot specify both an update and remove=true",
            ))
        }
        (None, false) => {
            return Err(CommandError::new(
                CODE_FAILED_TO_PARSE,
                "Either an update or remove=true must be specified",
            ))
        }
        _ => {}
    }
    if remove && (return_new || upsert) {
        return Err(CommandError::new(
            CODE_FAILED_TO_PARSE,
            "Cannot specify new=true or upsert=true together with remove=true",
        ));
    }

    let selected = db.collection(name).and_then(|state| {
        let mut positions = matching_positions(state, &filter);
        if !sort.is_empty() {
            let documents = state.documents();
            positions.sort_by(|a, b| sort.compare(&documents[*a], &documents[*b]));
        }
        positions.first().copied()
    });

    let mut last_error = Document::new();
    let value = match (selected, update) {
        (Some(position), None) => {
            let state = db.collection_mut(name).ok_or_else(ns_not_found)?;
            let removed = state.remove_at(position);
            last_error.insert("n", 1);
            Value::Document(projection.apply(removed))
        }
        (Some(position), Some(update)) => {
            let state = db.collection_mut(name).ok_or_else(ns_not_found)?;
            let original = state.documents()[position].clone();
            let mut updated = original.clone();
            if update.apply(&mut updated, false)? {
                state.replace(position, updated.clone())?;
            }
            last_error.insert("n", 1);
            last_error.insert("updatedExisting", true);
            let returned = if return_new { updated } else { original };
            Value::Document(projection.apply(returned))
        }
        (None, Some(update)) if upsert => {
            let document = update.upsert_document(&query)?;
            let (state, _) = db.get_or_create(database, name);
            state.insert(document.clone())?;
            last_error.insert("n", 1);
            last_error.insert("updatedExisting", false);
            last_error.insert("upserted", document.id().cloned().unwrap_or_default());
            if return_new {
                Value::Document(projection.apply(document))
            } else {
                Value::Null
            }
        }
        (None, _) => {
            last_error.insert("n", 0);
            last_error.insert("updatedExisting", false);
            Value::Null
        }
    };

    let mut body = Document::new();
    body.insert("lastErrorObject", last_error);
    body.insert("value", value);
    Ok(ok_reply(body))
}

fn create_indexes(
    database: &str,
    db: &mut DatabaseState,
    command: &Document,
) -> CommandOutcome<Document> {
    let name = string_arg(command, "createIndexes")?;
    let specs = documents_of(array_arg(command, "indexes")?, "indexes")?;
    if specs.is_empty() {
        return Err(CommandError::new(
            CODE_BAD_VALUE,
            "Must specify at least one index to create",
        ));
    }

    let (state, created_collection) = db.get_or_create(database, name);
    let before = state.indexes().len();
    // all or nothing
    let mut staged = state.clone();
    for spec in specs {
        staged.add_index(spec)?;
    }
    let after = staged.indexes().len();
    *state = staged;

    let mut body = Document::new();
    body.insert("createdCollectionAutomatically", created_collection);
    body.insert("numIndexesBefore", before);
    body.insert("numIndexesAfter", after);
    Ok(ok_reply(body))
}

fn drop_indexes(db: &mut DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "dropIndexes")?;
    let selector = command.get("index").ok_or_else(|| {
        CommandError::new(CODE_BAD_VALUE, "'index' must be specified")
    })?;
    let state = db.collection_mut(name).ok_or_else(ns_not_found)?;
    let before = state.drop_index(selector)?;

    let mut body = Document::new();
    body.insert("nIndexesWas", before);
    Ok(ok_reply(body))
}

fn list_indexes(database: &str, db: &DatabaseState, command: &Document) -> CommandOutcome<Document> {
    let name = string_arg(command, "listIndexes")?;
    let state = db.collection(name).ok_or_else(|| {
        CommandError::new(
            CODE_NAMESPACE_NOT_FOUND,
            format!("ns does not exist: {}", namespace(database, name)),
        )
    })?;
    Ok(cursor_reply(
        &namespace(database, name),
        state.indexes().to_vec(),
    ))
}
