use crate::basalt::Basalt;
use crate::basalt_config::BasaltConfig;
use crate::codec::{DecoderFactory, ObjectFactory};
use crate::collection::ReturnDocument;
use crate::database::Database;
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use crate::store::StoreConnection;
use std::sync::Arc;

/// Fluent builder for a [Basalt] client.
///
/// Configuration errors are captured as they happen and reported by
/// [BasaltBuilder::build] or [BasaltBuilder::open]; after the first error
/// every further setting is skipped.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Basalt::builder()
///     .connection(StoreConnection::new(InMemoryStore::new()))
///     .type_binding("address", |_: &str, doc: Document| -> BasaltResult<Value> {
///         Ok(Value::from(Address::from(doc)))
///     })
///     .return_document(ReturnDocument::After)
///     .open("app")?;
/// ```
#[derive(Default)]
pub struct BasaltBuilder {
    error: Option<BasaltError>,
    config: BasaltConfig,
}

impl BasaltBuilder {
    pub fn new() -> Self {
        BasaltBuilder {
            error: None,
            config: BasaltConfig::new(),
        }
    }

    /// Store connection to run commands on. Defaults to a fresh in-memory
    /// store.
    pub fn connection(mut self, connection: StoreConnection) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_connection(connection) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Decoder factory used for `find_and_modify` results.
    pub fn decoder_factory<F: DecoderFactory + 'static>(mut self, factory: F) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_decoder_factory(Arc::new(factory)) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Binds an object factory to a dotted document path. The empty path
    /// binds the root document.
    pub fn type_binding<F: ObjectFactory + 'static>(mut self, path: &str, factory: F) -> Self {
        if self.error.is_none() {
            if !path.is_empty() && path.split('.').any(|segment| segment.is_empty()) {
                log::error!("Invalid type binding path '{}'", path);
                self.error = Some(BasaltError::new(
                    &format!("Invalid type binding path '{}'", path),
                    ErrorKind::ValidationError,
                ));
            } else if let Err(e) = self.config.add_type_binding(path, Arc::new(factory)) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Factory for embedded documents without a binding.
    pub fn default_type<F: ObjectFactory + 'static>(mut self, factory: F) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_default_type(Arc::new(factory)) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn return_document(mut self, return_document: ReturnDocument) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_return_document(return_document) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Freezes the configuration and returns the client.
    pub fn build(self) -> BasaltResult<Basalt> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let basalt = Basalt::new(self.config);
        basalt.initialize()?;
        Ok(basalt)
    }

    /// Builds the client and opens `database_name` on it.
    pub fn open(self, database_name: &str) -> BasaltResult<Database> {
        self.build()?.database(database_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DocumentFactory;
    use crate::collection::Document;
    use crate::common::Value;
    use crate::store::memory::InMemoryStore;

    #[test]
    fn test_defaults() {
        let basalt = BasaltBuilder::new().build().unwrap();
        assert!(basalt.config().is_initialized());
        assert_eq!(basalt.config().return_document(), ReturnDocument::Before);
    }

    #[test]
    fn test_settings_reach_collections() {
        let db = BasaltBuilder::new()
            .type_binding("address", DocumentFactory)
            .return_document(ReturnDocument::After)
            .open("app")
            .unwrap();
        let collection = db.collection("c").unwrap();
        assert_eq!(collection.return_document(), ReturnDocument::After);
        assert!(collection.type_bindings().is_bound("address"));
    }

    #[test]
    fn test_second_connection_error_captured() {
        let result = BasaltBuilder::new()
            .connection(StoreConnection::new(InMemoryStore::new()))
            .connection(StoreConnection::new(InMemoryStore::new()))
            .build();
        assert_eq!(
            result.err().unwrap().kind(),
            &ErrorKind::InvalidOperation
        );
    }

    #[test]
    fn test_first_error_wins() {
        let result = BasaltBuilder::new()
            .type_binding("a..b", DocumentFactory)
            .connection(StoreConnection::new(InMemoryStore::new()))
            .connection(StoreConnection::new(InMemoryStore::new()))
            .build();
        let error = result.err().unwrap();
        assert_eq!(error.kind(), &ErrorKind::ValidationError);
        assert!(error.message().contains("a..b"));
    }

    #[test]
    fn test_root_binding_allowed() {
        let result = BasaltBuilder::new()
            .type_binding("", |_: &str, doc: Document| -> BasaltResult<Value> {
                Ok(Value::from(doc.size()))
            })
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_open_invalid_database() {
        let error = BasaltBuilder::new().open("bad.name").err().unwrap();
        assert_eq!(error.kind(), &ErrorKind::ValidationError);
    }
}
