//! Bidirectional favorites sync.
//!
//! One [`SyncEngine`] per favorite domain reconciles the local libSQL table
//! with the user's remote rows: snapshots of both sides are planned into
//! upload, download, conflict and unchanged sets, conflicts are settled by
//! last-write-wins, and the pass reports a [`SyncResult`].

mod engine;
mod planner;
mod resolver;
mod result;
mod suite;

pub use engine::SyncEngine;
pub use planner::{plan, RecordPair, SyncPlan};
pub use resolver::{arbitrate, ConflictResolver, Resolution};
pub use result::{SyncError, SyncResult, SyncStats};
pub use suite::{SyncSuite, SyncSuiteReport};
