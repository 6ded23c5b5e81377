use crate::basalt_config::BasaltConfig;
use crate::collection::{validate_collection_name, Collection, Document};
use crate::common::INVALID_DATABASE_CHARS;
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use crate::store::{CommandResult, StoreConnection};
use std::ops::Deref;
use std::sync::Arc;

/// A named database on a store connection.
///
/// `Database` is a cheap handle: clones share the connection and the
/// configuration, and collection handles created from it inherit the
/// decoding settings of the configuration.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Basalt::builder().open("app")?;
/// let users = db.collection("users")?;
/// users.insert(doc!{ name: "Alice" })?;
/// assert!(db.has_collection("users")?);
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub(crate) fn new(name: &str, config: BasaltConfig) -> BasaltResult<Database> {
        validate_database_name(name)?;
        let connection = config.connection();
        Ok(Database {
            inner: Arc::new(DatabaseInner {
                name: name.to_string(),
                connection,
                config,
            }),
        })
    }

    /// Another database on the same connection, with the same configuration.
    pub fn sibling(&self, name: &str) -> BasaltResult<Database> {
        if name == self.name {
            return Ok(self.clone());
        }
        Database::new(name, self.config.clone())
    }

    /// Drops the database with all its collections.
    pub fn drop(&self) -> BasaltResult<()> {
        let mut command = Document::new();
        command.insert("dropDatabase", 1);
        self.inner.run_command(&command)?;
        Ok(())
    }
}

impl Deref for Database {
    type Target = Arc<DatabaseInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct DatabaseInner {
    name: String,
    connection: StoreConnection,
    config: BasaltConfig,
}

impl DatabaseInner {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BasaltConfig {
        &self.config
    }

    pub fn connection(&self) -> &StoreConnection {
        &self.connection
    }

    /// Returns a handle to the named collection. No store call is made; the
    /// collection appears on the first write.
    pub fn collection(&self, name: &str) -> BasaltResult<Collection> {
        self.check_opened()?;
        Collection::new(&self.name, name, self.connection.clone(), &self.config)
    }

    /// Names of the collections in this database, sorted.
    pub fn collection_names(&self) -> BasaltResult<Vec<String>> {
        let mut command = Document::new();
        command.insert("listCollections", 1);
        let payload = self.run_command(&command)?;
        Ok(CommandResult::first_batch(&payload)
            .iter()
            .filter_map(|info| info.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect())
    }

    pub fn has_collection(&self, name: &str) -> BasaltResult<bool> {
        Ok(self.collection_names()?.iter().any(|it| it == name))
    }

    /// Explicitly creates an empty collection.
    ///
    /// # Errors
    ///
    /// [ErrorKind::NameConflict] when the collection already exists.
    pub fn create_collection(&self, name: &str) -> BasaltResult<Collection> {
        validate_collection_name(name)?;
        let mut command = Document::new();
        command.insert("create", name);
        self.run_command(&command)?;
        self.collection(name)
    }

    /// Runs an arbitrary command against this database and returns the
    /// reply payload.
    pub fn run_command(&self, command: &Document) -> BasaltResult<Document> {
        self.check_opened()?;
        self.connection.execute(&self.name, command)?.into_result()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Closes the underlying store connection. Every handle sharing the
    /// connection is closed with it.
    pub fn close(&self) -> BasaltResult<()> {
        if self.connection.is_closed() {
            return Ok(());
        }
        self.connection.close()
    }

    fn check_opened(&self) -> BasaltResult<()> {
        if self.connection.is_closed() {
            log::error!("Database {} is already closed", self.name);
            return Err(BasaltError::new(
                &format!("Database {} is already closed", self.name),
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }
}

/// Rejects empty names and names with characters the store reserves.
pub(crate) fn validate_database_name(name: &str) -> BasaltResult<()> {
    if name.is_empty() {
        log::error!("Database name cannot be empty");
        return Err(BasaltError::new(
            "Database name cannot be empty",
            ErrorKind::ValidationError,
        ));
    }
    if let Some(c) = name.chars().find(|c| INVALID_DATABASE_CHARS.contains(c)) {
        log::error!("Database name '{}' contains invalid character {:?}", name, c);
        return Err(BasaltError::new(
            &format!("Database name '{}' contains invalid character {:?}", name, c),
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}
