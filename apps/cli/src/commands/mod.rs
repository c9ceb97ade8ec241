//! # CLI Commands
//!
//! ```text
//! commands/
//! ├── scan.rs     ◄─── decode a scan, price/portion lookup, relations
//! ├── session.rs  ◄─── add, feed, manual, update, remove, commit
//! ├── sync.rs     ◄─── one-shot and periodic sync, queue inspection
//! └── store.rs    ◄─── export, backups, price cache
//! ```
//!
//! Each command returns a serializable value; `main` prints it as JSON.

pub mod scan;
pub mod session;
pub mod store;
pub mod sync;
