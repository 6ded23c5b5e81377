use crate::basalt_builder::BasaltBuilder;
use crate::basalt_config::BasaltConfig;
use crate::database::Database;
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use std::ops::Deref;
use std::sync::Arc;

/// Client entry point: a configured store connection from which databases
/// are opened.
///
/// `Basalt` is cheap to clone; clones share the configuration and the
/// connection. Closing any clone closes the connection for all of them.
///
/// # Examples
///
/// ```rust,ignore
/// let basalt = Basalt::builder().build()?;
/// let db = basalt.database("app")?;
/// db.collection("users")?.insert(doc!{ name: "Alice" })?;
///
/// assert_eq!(basalt.database_names()?, vec!["app".to_string()]);
/// basalt.close()?;
/// ```
#[derive(Clone)]
pub struct Basalt {
    inner: Arc<BasaltInner>,
}

impl Basalt {
    pub fn builder() -> BasaltBuilder {
        BasaltBuilder::new()
    }

    pub(crate) fn new(config: BasaltConfig) -> Self {
        Basalt {
            inner: Arc::new(BasaltInner { config }),
        }
    }
}

impl Deref for Basalt {
    type Target = Arc<BasaltInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct BasaltInner {
    config: BasaltConfig,
}

impl BasaltInner {
    pub(crate) fn initialize(&self) -> BasaltResult<()> {
        if self.config.connection().is_closed() {
            log::error!("Store connection is already closed");
            return Err(BasaltError::new(
                "Store connection is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        self.config.initialize();
        Ok(())
    }

    pub fn config(&self) -> &BasaltConfig {
        &self.config
    }

    /// Opens a database handle. Names must be non-empty and free of
    /// `/ \ . " $`, spaces and NUL.
    pub fn database(&self, name: &str) -> BasaltResult<Database> {
        self.check_opened()?;
        Database::new(name, self.config.clone())
    }

    /// Databases known to the store.
    pub fn database_names(&self) -> BasaltResult<Vec<String>> {
        self.check_opened()?;
        let mut names = self.config.connection().database_names()?;
        names.sort();
        Ok(names)
    }

    pub fn is_closed(&self) -> bool {
        self.config.connection().is_closed()
    }

    pub fn close(&self) -> BasaltResult<()> {
        let connection = self.config.connection();
        if connection.is_closed() {
            return Ok(());
        }
        connection.close()
    }

    fn check_opened(&self) -> BasaltResult<()> {
        if self.is_closed() {
            log::error!("Client is already closed");
            return Err(BasaltError::new(
                "Client is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }
}
