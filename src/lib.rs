//! # emberkv
//!
//! A safe, typed handle layer over an embedded LSM key-value engine.
//!
//! ## Features
//!
//! - **Owned Handles**: Every engine object is released exactly once, when
//!   its wrapper is dropped or consumed
//! - **Typed Options**: About seventy setters, enum-valued settings and a
//!   textual `name=value` form that reads back [`Options::dump`]
//! - **Snapshots**: Point-in-time reads that survive later writes and
//!   compactions
//! - **Shared Resources**: A block cache, filter policy or environment can
//!   back several databases; the borrow checker keeps them alive long enough
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emberkv::{Database, Options, ReadOptions, WriteOptions};
//!
//! # fn main() -> emberkv::Result<()> {
//! let mut opts = Options::new();
//! opts.set_create_if_missing(true);
//!
//! let db = Database::open(&opts, "./my_data")?;
//! let (ro, wo) = (ReadOptions::new(), WriteOptions::new());
//!
//! db.put(&wo, b"hello", b"world")?;
//! assert_eq!(db.get(&ro, b"hello")?.as_deref(), Some(&b"world"[..]));
//! db.delete(&wo, b"hello")?;
//!
//! let snapshot = db.snapshot();
//! let mut at = ReadOptions::new();
//! at.set_snapshot(&snapshot);
//! assert_eq!(db.get(&at, b"hello")?, None);
//! # drop(at);
//! # drop(snapshot);
//! db.close();
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod error;
pub mod options;

// Handle wrappers
mod cache;
mod db;
mod env;
mod filter;
mod handle;
mod snapshot;

// Engine
mod sys;
mod types;
mod util;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{
    AccessHint, CompactionStyle, Compression, InfoLogLevel, MemtableRep, Options, ReadOptions,
    UniversalCompactionOptions, UniversalStopStyle, WriteOptions, DEFAULT_BLOCK_RESTART_INTERVAL,
    DEFAULT_BLOCK_SIZE, DEFAULT_INTERNAL_CACHE_SIZE, DEFAULT_LEVEL0_FILE_NUM_COMPACTION_TRIGGER,
    DEFAULT_MAX_OPEN_FILES, DEFAULT_MAX_WRITE_BUFFER_NUMBER, DEFAULT_NUM_LEVELS,
    DEFAULT_WRITE_BUFFER_SIZE,
};

// Database
pub use db::Database;
pub use snapshot::Snapshot;

// Shared resources
pub use cache::Cache;
pub use env::Env;
pub use filter::FilterPolicy;

// Resource accounting
pub use sys::{live_objects, LiveObjects};
