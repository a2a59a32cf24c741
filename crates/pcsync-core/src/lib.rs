//! pcsync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemotePath`, `CacheEntry`, `ActionRecord`, `TaskRecord`, `CompareReport`
//! - **Schedule arithmetic** - parsing `HH:MM:SS` offsets and `DD:HH:MM:SS` intervals
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`, `ILocalFileSystem`,
//!   `ICacheRepository`, `IActionLedger`, `ITaskRepository`
//! - **Configuration** - the service configuration file and its validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
