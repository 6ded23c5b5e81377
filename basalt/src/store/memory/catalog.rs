use super::matcher::resolve;
use super::reply::{CommandError, CommandOutcome};
use crate::collection::{index_name, parse_key_pattern, Document};
use crate::common::{
    Value, ALL_INDEXES, CODE_BAD_VALUE, CODE_CANNOT_CREATE_INDEX, CODE_DUPLICATE_KEY,
    CODE_INDEX_NOT_FOUND, CODE_INDEX_OPTIONS_CONFLICT, CODE_INVALID_OPTIONS, DOC_ID,
    ID_INDEX_NAME, INDEX_VERSION,
};
use itertools::Itertools;
use std::collections::BTreeMap;

const KEY: &str = "key";
const NAME: &str = "name";
const NAMESPACE: &str = "ns";
const VERSION: &str = "v";
const UNIQUE: &str = "unique";
const SPARSE: &str = "sparse";

/// Collections of one database, ordered by name.
#[derive(Debug, Default)]
pub(crate) struct DatabaseState {
    collections: BTreeMap<String, CollectionState>,
}

impl DatabaseState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn collection(&self, name: &str) -> Option<&CollectionState> {
        self.collections.get(name)
    }

    pub(crate) fn collection_mut(&mut self, name: &str) -> Option<&mut CollectionState> {
        self.collections.get_mut(name)
    }

    /// Returns the collection, creating it with its `_id_` index if absent.
    /// The flag tells whether it was created.
    pub(crate) fn get_or_create(
        &mut self,
        database: &str,
        name: &str,
    ) -> (&mut CollectionState, bool) {
        let created = !self.collections.contains_key(name);
        let state = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| CollectionState::new(&namespace(database, name)));
        (state, created)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<CollectionState> {
        self.collections.remove(name)
    }

    pub(crate) fn put(&mut self, name: &str, state: CollectionState) {
        self.collections.insert(name.to_string(), state);
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}

pub(crate) fn namespace(database: &str, collection: &str) -> String {
    format!("{}.{}", database, collection)
}

/// Documents and index descriptors of one collection.
#[derive(Debug, Clone)]
pub(crate) struct CollectionState {
    namespace: String,
    documents: Vec<Document>,
    indexes: Vec<Document>,
}

impl CollectionState {
    pub(crate) fn new(namespace: &str) -> Self {
        let mut id_key = Document::new();
        id_key.insert(DOC_ID, 1);

        let mut id_index = Document::new();
        id_index.insert(VERSION, INDEX_VERSION);
        id_index.insert(KEY, id_key);
        id_index.insert(NAME, ID_INDEX_NAME);
        id_index.insert(NAMESPACE, namespace);

        CollectionState {
            namespace: namespace.to_string(),
            documents: Vec::new(),
            indexes: vec![id_index],
        }
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn set_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
        for index in self.indexes.iter_mut() {
            index.insert(NAMESPACE, namespace);
        }
    }

    pub(crate) fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }

    pub(crate) fn indexes(&self) -> &[Document] {
        &self.indexes
    }

    /// Appends a document after checking every unique index.
    pub(crate) fn insert(&mut self, document: Document) -> CommandOutcome<()> {
        self.check_unique(&document, None)?;
        self.documents.push(document);
        Ok(())
    }

    /// Replaces the document at `position` after checking unique indexes
    /// against every other document.
    pub(crate) fn replace(&mut self, position: usize, document: Document) -> CommandOutcome<()> {
        self.check_unique(&document, Some(position))?;
        if let Some(slot) = self.documents.get_mut(position) {
            *slot = document;
        }
        Ok(())
    }

    pub(crate) fn remove_at(&mut self, position: usize) -> Document {
        self.documents.remove(position)
    }

    /// Removes the documents at the given ascending positions.
    pub(crate) fn remove_positions(&mut self, positions: &[usize]) -> usize {
        for position in positions.iter().rev() {
            self.documents.remove(*position);
        }
        positions.len()
    }

    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> CommandOutcome<()> {
        for index in self.indexes.iter().filter(|i| is_unique(i)) {
            let fields = key_fields(index);
            let sparse = index.get(SPARSE).map(|v| v.is_truthy()).unwrap_or(false);
            let key = index_key(candidate, &fields);
            if sparse && key.iter().all(|v| v.is_none()) {
                continue;
            }

            let duplicate = self
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .any(|(_, other)| index_key(other, &fields) == key);
            if duplicate {
                return Err(duplicate_key_error(&self.namespace, index, &fields, &key));
            }
        }
        Ok(())
    }

    /// Adds an index from a `createIndexes` specification. Returns `false`
    /// when an identical index already exists.
    pub(crate) fn add_index(&mut self, spec: &Document) -> CommandOutcome<bool> {
        let key = spec
            .get(KEY)
            .and_then(|v| v.as_document())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CommandError::new(
                    CODE_CANNOT_CREATE_INDEX,
                    format!("Error in specification {} :: index key is missing or empty", spec),
                )
            })?
            .clone();

        parse_key_pattern(&key).map_err(|e| {
            CommandError::new(
                CODE_CANNOT_CREATE_INDEX,
                format!(
                    "Error in specification {} :: caused by :: {}",
                    spec,
                    e.message()
                ),
            )
        })?;

        let name = match spec.get(NAME) {
            Some(Value::String(name)) => name.clone(),
            Some(_) => {
                return Err(CommandError::new(
                    CODE_BAD_VALUE,
                    "The field 'name' must be a string",
                ))
            }
            None => index_name(&key),
        };

        if let Some(existing) = self.indexes.iter().find(|i| index_name_of(i) == name) {
            if same_key(&key_of(existing), &key) && same_options(existing, spec) {
                return Ok(false);
            }
            return Err(CommandError::new(
                CODE_INDEX_OPTIONS_CONFLICT,
                format!(
                    "An existing index has the same name as the requested index. \
                     Requested index: {}, existing index: {}",
                    spec, existing
                ),
            ));
        }

        if let Some(existing) = self.indexes.iter().find(|i| same_key(&key_of(i), &key)) {
            return Err(CommandError::new(
                CODE_INDEX_OPTIONS_CONFLICT,
                format!(
                    "Index already exists with a different name: {}",
                    index_name_of(existing)
                ),
            ));
        }

        let mut descriptor = Document::new();
        descriptor.insert(VERSION, INDEX_VERSION);
        descriptor.insert(KEY, key);
        descriptor.insert(NAME, name.as_str());
        descriptor.insert(NAMESPACE, self.namespace.as_str());
        for (option, value) in spec.iter() {
            if option != KEY && option != NAME && option != NAMESPACE && option != VERSION {
                descriptor.insert(option.clone(), value.clone());
            }
        }

        if is_unique(&descriptor) {
            self.check_existing_unique(&descriptor)?;
        }
        self.indexes.push(descriptor);
        Ok(true)
    }

    fn check_existing_unique(&self, descriptor: &Document) -> CommandOutcome<()> {
        let fields = key_fields(descriptor);
        let sparse = descriptor
            .get(SPARSE)
            .map(|v| v.is_truthy())
            .unwrap_or(false);
        let mut seen = Vec::with_capacity(self.documents.len());
        for document in &self.documents {
            let key = index_key(document, &fields);
            if sparse && key.iter().all(|v| v.is_none()) {
                continue;
            }
            if seen.contains(&key) {
                return Err(duplicate_key_error(
                    &self.namespace,
                    descriptor,
                    &fields,
                    &key,
                ));
            }
            seen.push(key);
        }
        Ok(())
    }

    /// Drops indexes selected by `"*"`, a name or a key pattern, and
    /// returns the number of indexes present before.
    pub(crate) fn drop_index(&mut self, selector: &Value) -> CommandOutcome<usize> {
        let before = self.indexes.len();
        match selector {
            Value::String(name) if name == ALL_INDEXES => {
                self.indexes.retain(|i| index_name_of(i) == ID_INDEX_NAME);
            }
            Value::String(name) => {
                if name == ID_INDEX_NAME {
                    return Err(cannot_drop_id_index());
                }
                let position = self
                    .indexes
                    .iter()
                    .position(|i| index_name_of(i) == *name)
                    .ok_or_else(|| {
                        CommandError::new(
                            CODE_INDEX_NOT_FOUND,
                            format!("index not found with name [{}]", name),
                        )
                    })?;
                self.indexes.remove(position);
            }
            Value::Document(key) => {
                let position = self
                    .indexes
                    .iter()
                    .position(|i| same_key(&key_of(i), key))
                    .ok_or_else(|| {
                        CommandError::new(
                            CODE_INDEX_NOT_FOUND,
                            format!("can't find index with key: {}", key),
                        )
                    })?;
                if index_name_of(&self.indexes[position]) == ID_INDEX_NAME {
                    return Err(cannot_drop_id_index());
                }
                self.indexes.remove(position);
            }
            other => {
                return Err(CommandError::new(
                    CODE_BAD_VALUE,
                    format!(
                        "The field 'index' must be a string or an object, found {}",
                        other.type_name()
                    ),
                ))
            }
        }
        Ok(before)
    }
}

fn cannot_drop_id_index() -> CommandError {
    CommandError::new(CODE_INVALID_OPTIONS, "cannot drop _id index")
}

fn index_name_of(index: &Document) -> &str {
    index.get(NAME).and_then(|v| v.as_str()).unwrap_or_default()
}

fn key_of(index: &Document) -> Document {
    index
        .get(KEY)
        .and_then(|v| v.as_document())
        .cloned()
        .unwrap_or_default()
}

fn key_fields(index: &Document) -> Vec<String> {
    key_of(index).keys().cloned().collect()
}

fn is_unique(index: &Document) -> bool {
    index_name_of(index) == ID_INDEX_NAME
        || index.get(UNIQUE).map(|v| v.is_truthy()).unwrap_or(false)
}

/// Key patterns match when fields, order and kinds are all the same.
pub(crate) fn same_key(a: &Document, b: &Document) -> bool {
    a.size() == b.size() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

fn same_options(existing: &Document, spec: &Document) -> bool {
    [UNIQUE, SPARSE].iter().all(|option| {
        let flag = |d: &Document| d.get(option).map(|v| v.is_truthy()).unwrap_or(false);
        flag(existing) == flag(spec)
    })
}

fn index_key(document: &Document, fields: &[String]) -> Vec<Option<Value>> {
    fields
        .iter()
        .map(|field| resolve(document, field).first().map(|v| (*v).clone()))
        .collect()
}

fn duplicate_key_error(
    namespace: &str,
    index: &Document,
    fields: &[String],
    key: &[Option<Value>],
) -> CommandError {
    let dup_key = fields
        .iter()
        .zip(key.iter())
        .map(|(field, value)| {
            let value = value.clone().unwrap_or(Value::Null);
            format!("{}: {}", field, value.to_json())
        })
        .join(", ");
    CommandError::new(
        CODE_DUPLICATE_KEY,
        format!(
            "E11000 duplicate key error collection: {} index: {} dup key: {{ {} }}",
            namespace,
            index_name_of(index),
            dup_key
        ),
    )
}
