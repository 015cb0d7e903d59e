//! Startup: open the store and seed an empty collection.

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::square::SquareFields;
use crate::storage::{SqliteStore, SquareStore};

/// What [`seed_if_empty`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The collection was empty and the sample squares were inserted.
    Seeded(usize),
    /// The collection already held this many squares; nothing was written.
    AlreadyPopulated(u64),
}

/// The three sample squares inserted into an empty collection.
#[must_use]
pub fn seed_squares() -> Vec<SquareFields> {
    vec![
        SquareFields::new(5, "red")
            .filled(true)
            .text("Square 1")
            .text_color("white"),
        SquareFields::new(10, "blue")
            .filled(false)
            .text("Square 2")
            .text_color("black"),
        SquareFields::new(7, "green")
            .filled(true)
            .text("Square 3")
            .text_color("yellow"),
    ]
}

/// Open the configured document store.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated. Callers
/// treat this as fatal.
pub fn connect(config: &Config) -> Result<SqliteStore> {
    let path = config.database_path();
    match SqliteStore::open(&path, config.storage.collection.as_str()) {
        Ok(store) => {
            info!("Connected to document store at {}", path.display());
            Ok(store)
        }
        Err(e) => {
            warn!("Could not open document store at {}: {}", path.display(), e);
            Err(e)
        }
    }
}

/// Insert the sample squares in one batch if the store holds none.
///
/// # Errors
///
/// Returns an error if counting or inserting fails.
pub async fn seed_if_empty<S: SquareStore + ?Sized>(store: &S) -> Result<SeedOutcome> {
    let count = store.count().await?;
    if count > 0 {
        return Ok(SeedOutcome::AlreadyPopulated(count));
    }

    let ids = store.insert_many(&seed_squares()).await?;
    info!("Seeded {} sample squares", ids.len());
    Ok(SeedOutcome::Seeded(ids.len()))
}
