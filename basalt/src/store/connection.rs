use crate::collection::Document;
use crate::errors::BasaltResult;
use crate::store::CommandResult;
use std::ops::Deref;
use std::sync::Arc;

/// Low-level contract of a document store connection.
///
/// # Purpose
/// The collection layer never talks to a server directly. It formats
/// command documents and hands them to a provider, which executes them
/// against a named database and returns the reply document. Transport,
/// encoding, authentication and timeouts are the provider's business.
///
/// # Reply shape
/// A reply is a document carrying `ok` (`1` on success, `0` on failure)
/// and, on failure, `errmsg` and a numeric `code`. Providers should report
/// store-side rejections through the reply rather than through `Err`, and
/// reserve `Err` for failures to reach the store at all.
///
/// # Implementations
/// - `InMemoryStore`: interprets the command set in process
///
/// # Thread Safety
/// Implementers must be `Send + Sync`; a connection is shared by every
/// collection handle created from a database.
pub trait StoreConnectionProvider: Send + Sync {
    /// Executes `command` against `database` and returns the raw reply.
    fn run_command(&self, database: &str, command: &Document) -> BasaltResult<Document>;

    /// Names of the databases known to the store.
    fn database_names(&self) -> BasaltResult<Vec<String>>;

    /// Checks whether the connection has been closed.
    fn is_closed(&self) -> bool;

    /// Closes the connection. Further commands fail.
    fn close(&self) -> BasaltResult<()>;
}

/// Shared handle to a [StoreConnectionProvider].
///
/// Cloning is cheap; all clones talk to the same provider.
///
/// # Examples
///
/// ```rust,ignore
/// let connection = StoreConnection::new(InMemoryStore::new());
/// let result = connection.execute("app", &doc!{ listCollections: 1 })?;
/// assert!(result.is_ok());
/// ```
#[derive(Clone)]
pub struct StoreConnection {
    inner: Arc<dyn StoreConnectionProvider>,
}

impl StoreConnection {
    pub fn new<T: StoreConnectionProvider + 'static>(inner: T) -> Self {
        StoreConnection {
            inner: Arc::new(inner),
        }
    }

    /// Runs `command` and wraps the reply in a [CommandResult].
    pub fn execute(&self, database: &str, command: &Document) -> BasaltResult<CommandResult> {
        log::debug!(
            "Running {} on {}",
            command.first_key().unwrap_or("<empty>"),
            database
        );
        let reply = self.inner.run_command(database, command)?;
        Ok(CommandResult::from_reply(reply))
    }
}

impl Deref for StoreConnection {
    type Target = Arc<dyn StoreConnectionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
