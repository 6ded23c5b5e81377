use basalt::basalt::Basalt;
use basalt::collection::{Collection, Document};
use basalt::database::Database;
use basalt::errors::BasaltResult;
use basalt::store::memory::InMemoryStore;
use basalt::store::StoreConnection;
use std::backtrace::Backtrace;
use std::thread;
use std::time::{Duration, Instant};

/// Runs a test between a setup and a teardown step, retrying on failure.
/// Teardown runs even when the test body fails.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> BasaltResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> BasaltResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> BasaltResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();
        let error = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_backtrace = Some(bt);
                e
            }
            Err(panic_err) => {
                let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                last_backtrace = Some(Backtrace::capture().to_string());
                format!("Panic: {}", message)
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("Error: {}", error);
            thread::sleep(Duration::from_millis(50 * attempt as u64));
        }
        last_error = Some(error);
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    client: Basalt,
    db: Database,
}

impl TestContext {
    pub fn new(client: Basalt, db: Database) -> Self {
        Self { client, db }
    }

    pub fn client(&self) -> Basalt {
        self.client.clone()
    }

    pub fn db(&self) -> Database {
        self.db.clone()
    }

    pub fn collection(&self, name: &str) -> BasaltResult<Collection> {
        self.db.collection(name)
    }
}

pub fn random_database_name() -> String {
    format!("test_{}", uuid::Uuid::new_v4().simple())
}

/// A uniquely named database on a fresh in-memory store.
pub fn create_test_context() -> BasaltResult<TestContext> {
    let client = Basalt::builder()
        .connection(StoreConnection::new(InMemoryStore::new()))
        .build()?;
    let db = client.database(&random_database_name())?;
    Ok(TestContext::new(client, db))
}

pub fn cleanup(ctx: TestContext) -> BasaltResult<()> {
    if ctx.client().is_closed() {
        return Ok(());
    }
    if let Err(e) = ctx.db().drop() {
        eprintln!("Warning: Failed to drop database: {:?}", e);
    }
    ctx.client().close()
}

/// Inserts `count` documents built by `builder` from their sequence number.
pub fn insert_sequence<F>(collection: &Collection, count: usize, builder: F) -> BasaltResult<()>
where
    F: Fn(usize) -> Document,
{
    let documents = (0..count).map(builder).collect();
    collection.insert_many(documents)?;
    Ok(())
}
