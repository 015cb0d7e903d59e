//! `squares` - an interactive record manager for a collection of squares
//!
//! This library provides the document store, the menu-driven session that
//! adds, lists, updates and deletes squares, and the configuration and
//! logging that surround them.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod session;
pub mod square;
pub mod storage;
pub mod terminal;

pub use bootstrap::{connect, seed_if_empty, seed_squares, SeedOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use render::{MessageLevel, Renderer};
pub use session::{Session, State};
pub use square::{Square, SquareFields, SquareId};
pub use storage::{SqliteStore, SquareStore};
pub use terminal::{ScriptedTerminal, StdTerminal, Terminal};
