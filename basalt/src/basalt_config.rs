//! Configuration shared by a client and every handle created from it.

use crate::codec::{DecoderFactory, DefaultDecoderFactory, ObjectFactory, TypeBindings};
use crate::collection::ReturnDocument;
use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use crate::store::memory::InMemoryStore;
use crate::store::StoreConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Client configuration.
///
/// Settings can be changed until the client is opened; after that they are
/// frozen and every setter fails with [ErrorKind::InvalidOperation].
/// Collections copy the decoding settings when they are created and may
/// override them individually.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Basalt::builder()
///     .return_document(ReturnDocument::After)
///     .open("app")?;
/// ```
#[derive(Clone)]
pub struct BasaltConfig {
    inner: Arc<BasaltConfigInner>,
}

impl Default for BasaltConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BasaltConfig {
    pub fn new() -> Self {
        BasaltConfig {
            inner: Arc::new(BasaltConfigInner::new()),
        }
    }

    /// The configured store connection. Falls back to a fresh
    /// [InMemoryStore] when none was set.
    pub fn connection(&self) -> StoreConnection {
        self.inner.connection()
    }

    /// Sets the store connection (once, before initialization).
    pub fn set_connection(&self, connection: StoreConnection) -> BasaltResult<()> {
        self.inner.set_connection(connection)
    }

    pub fn decoder_factory(&self) -> Arc<dyn DecoderFactory> {
        self.inner.decoder_factory.read_with(|it| it.clone())
    }

    pub fn set_decoder_factory(&self, factory: Arc<dyn DecoderFactory>) -> BasaltResult<()> {
        self.inner.check_not_configured("decoder factory")?;
        self.inner.decoder_factory.write_with(|it| *it = factory);
        Ok(())
    }

    pub fn type_bindings(&self) -> TypeBindings {
        self.inner.type_bindings.read_with(|it| it.clone())
    }

    pub fn add_type_binding(&self, path: &str, factory: Arc<dyn ObjectFactory>) -> BasaltResult<()> {
        self.inner.check_not_configured("type binding")?;
        self.inner
            .type_bindings
            .write_with(|it| it.bind_shared(path, factory));
        Ok(())
    }

    pub fn set_default_type(&self, factory: Arc<dyn ObjectFactory>) -> BasaltResult<()> {
        self.inner.check_not_configured("default type")?;
        self.inner
            .type_bindings
            .write_with(|it| it.set_default_shared(factory));
        Ok(())
    }

    pub fn return_document(&self) -> ReturnDocument {
        self.inner.return_document.read_with(|it| *it)
    }

    pub fn set_return_document(&self, return_document: ReturnDocument) -> BasaltResult<()> {
        self.inner.check_not_configured("return document mode")?;
        self.inner
            .return_document
            .write_with(|it| *it = return_document);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Freezes the configuration.
    pub(crate) fn initialize(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }
}

struct BasaltConfigInner {
    configured: AtomicBool,
    connection: OnceLock<StoreConnection>,
    decoder_factory: Atomic<Arc<dyn DecoderFactory>>,
    type_bindings: Atomic<TypeBindings>,
    return_document: Atomic<ReturnDocument>,
}

impl BasaltConfigInner {
    fn new() -> Self {
        BasaltConfigInner {
            configured: AtomicBool::from(false),
            connection: OnceLock::new(),
            decoder_factory: atomic(Arc::new(DefaultDecoderFactory) as Arc<dyn DecoderFactory>),
            type_bindings: atomic(TypeBindings::new()),
            return_document: atomic(ReturnDocument::default()),
        }
    }

    fn check_not_configured(&self, setting: &str) -> BasaltResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("The {} cannot be changed after initialization", setting);
            return Err(BasaltError::new(
                &format!("The {} cannot be changed after initialization", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn connection(&self) -> StoreConnection {
        self.connection
            .get_or_init(|| StoreConnection::new(InMemoryStore::new()))
            .clone()
    }

    fn set_connection(&self, connection: StoreConnection) -> BasaltResult<()> {
        self.check_not_configured("store connection")?;
        if self.connection.set(connection).is_err() {
            log::error!("Store connection is already configured");
            return Err(BasaltError::new(
                "Store connection is already configured",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
