//! Integration tests for pcsync-sync
//!
//! Runs the sync algorithms against an in-memory remote double, a real
//! local directory and an in-memory SQLite metadata store.

mod common;

mod test_backup;
mod test_compare;
mod test_engine;
mod test_restore;
mod test_update;
