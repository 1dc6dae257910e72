//! Durable offline action queue.
//!
//! Mutations attempted while the device is offline are appended to a queue
//! that is persisted before the enqueue call returns, then replayed in order
//! once connectivity is back.
//!
//! ```text
//! ConnectivityMonitor ──events──▶ SyncCoordinator ──replay──▶ ReplayHandler
//!                                      │
//!                                      ▼
//!                                KeyValueStore (memory / file / redb)
//! ```

pub mod action;
pub mod codec;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod io;
pub mod lock;
pub mod monitor;
pub mod paths;
pub mod replay;
pub mod store;

pub use action::PendingAction;
pub use config::SyncConfig;
pub use connectivity::ConnectivityState;
pub use coordinator::{SkipReason, SyncCoordinator, SyncReport, SyncStats};
pub use error::{Result, SyncError};
pub use lock::RootLock;
pub use monitor::{ConnectivityMonitor, ManualMonitor, ProbeMonitor, Subscription};
pub use replay::{FnReplay, HttpReplay, ReplayError, ReplayHandler};
pub use store::{FileStore, KeyValueStore, MemoryStore, RedbStore};
