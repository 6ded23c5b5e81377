//! Decoding of raw reply documents into caller-facing values.
//!
//! A store reply arrives as a plain [Document]. Before a `find_and_modify`
//! result is handed back it passes through a [DocumentDecoder], created
//! fresh for every response by the collection's [DecoderFactory]. The
//! default decoder walks the document and asks [TypeBindings] which
//! [ObjectFactory] should materialize each embedded document.

use crate::collection::Document;
use crate::common::{Value, FIELD_SEPARATOR};
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Turns a decoded document found at `path` into a value.
///
/// The root document has the empty path. Closures with the matching
/// signature implement the trait.
pub trait ObjectFactory: Send + Sync {
    fn create(&self, path: &str, document: Document) -> BasaltResult<Value>;
}

impl<F> ObjectFactory for F
where
    F: Fn(&str, Document) -> BasaltResult<Value> + Send + Sync,
{
    fn create(&self, path: &str, document: Document) -> BasaltResult<Value> {
        self(path, document)
    }
}

/// Factory that keeps documents as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFactory;

impl ObjectFactory for DocumentFactory {
    fn create(&self, _path: &str, document: Document) -> BasaltResult<Value> {
        Ok(Value::Document(document))
    }
}

/// Path-keyed table of object factories.
///
/// A binding for `""` applies to the root document, `"address"` to the
/// embedded document at that field, and so on. Documents inside arrays use
/// the array's path. Unbound embedded documents go through the default
/// factory, which is [DocumentFactory] unless replaced.
#[derive(Clone)]
pub struct TypeBindings {
    default_factory: Arc<dyn ObjectFactory>,
    bindings: HashMap<String, Arc<dyn ObjectFactory>>,
}

impl Default for TypeBindings {
    fn default() -> Self {
        TypeBindings {
            default_factory: Arc::new(DocumentFactory),
            bindings: HashMap::new(),
        }
    }
}

impl Debug for TypeBindings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<&String> = self.bindings.keys().collect();
        paths.sort();
        f.debug_struct("TypeBindings")
            .field("paths", &paths)
            .finish()
    }
}

impl TypeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind<F: ObjectFactory + 'static>(&mut self, path: &str, factory: F) {
        self.bindings.insert(path.to_string(), Arc::new(factory));
    }

    pub(crate) fn bind_shared(&mut self, path: &str, factory: Arc<dyn ObjectFactory>) {
        self.bindings.insert(path.to_string(), factory);
    }

    pub fn unbind(&mut self, path: &str) -> bool {
        self.bindings.remove(path).is_some()
    }

    pub fn set_default<F: ObjectFactory + 'static>(&mut self, factory: F) {
        self.default_factory = Arc::new(factory);
    }

    pub(crate) fn set_default_shared(&mut self, factory: Arc<dyn ObjectFactory>) {
        self.default_factory = factory;
    }

    pub fn is_bound(&self, path: &str) -> bool {
        self.bindings.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Factory for `path`: its binding if there is one, else the default.
    pub fn factory_for(&self, path: &str) -> Arc<dyn ObjectFactory> {
        self.bindings
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.default_factory.clone())
    }

    /// Materializes `document` found at `path`, children first.
    ///
    /// The root (empty path) keeps its document form unless a factory is
    /// bound to `""`.
    pub fn materialize(&self, path: &str, document: Document) -> BasaltResult<Value> {
        let mut decoded = Document::with_capacity(document.size());
        for (key, value) in document {
            let child_path = child_path(path, &key);
            let value = self.materialize_value(&child_path, value)?;
            decoded.insert(key, value);
        }

        if path.is_empty() && !self.is_bound(path) {
            return Ok(Value::Document(decoded));
        }
        self.factory_for(path).create(path, decoded)
    }

    fn materialize_value(&self, path: &str, value: Value) -> BasaltResult<Value> {
        match value {
            Value::Document(doc) => self.materialize(path, doc),
            Value::Array(items) => {
                let mut decoded = Vec::with_capacity(items.len());
                for item in items {
                    decoded.push(self.materialize_value(path, item)?);
                }
                Ok(Value::Array(decoded))
            }
            other => Ok(other),
        }
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", parent, FIELD_SEPARATOR, key)
    }
}

/// Decodes one raw reply document.
///
/// Decoders are created per response and may keep state while decoding.
pub trait DocumentDecoder: Send {
    fn decode(&mut self, raw: Document, bindings: &TypeBindings) -> BasaltResult<Value>;
}

/// Creates a decoder for each response.
pub trait DecoderFactory: Send + Sync {
    fn create(&self) -> Box<dyn DocumentDecoder>;
}

/// Decoder applying the configured [TypeBindings].
#[derive(Debug, Default)]
pub struct DefaultDecoder {
    decoded: usize,
}

impl DefaultDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents this decoder has decoded so far.
    pub fn decoded(&self) -> usize {
        self.decoded
    }
}

impl DocumentDecoder for DefaultDecoder {
    fn decode(&mut self, raw: Document, bindings: &TypeBindings) -> BasaltResult<Value> {
        self.decoded += 1;
        bindings.materialize("", raw).map_err(|e| {
            log::error!("Failed to decode document: {}", e);
            BasaltError::new_with_cause(
                "Failed to decode document",
                ErrorKind::ObjectMappingError,
                e,
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecoderFactory;

impl DecoderFactory for DefaultDecoderFactory {
    fn create(&self) -> Box<dyn DocumentDecoder> {
        Box::new(DefaultDecoder::new())
    }
}
