//! Stockbridge Ledger - the stock ledger engine.
//!
//! This crate ingests batches of stock movements reported by disconnected
//! mobile clients, reconciles them against the server-side authoritative
//! ledger, and answers "what was the stock on hand after each movement"
//! queries against that ledger.
//!
//! # Pipeline
//!
//! One submitted batch flows through, end to end, inside one unit of work:
//!
//! 1. [`engine::dedup`] - drop movements whose key was already committed
//! 2. [`engine::lots`] - resolve lot identities, flag expiration conflicts
//! 3. [`engine::projector`] - stage events, cards, line items, and snapshots
//! 4. [`store::LedgerStore::persist_batch`] - write the whole batch atomically
//!
//! Read queries go the other way: stored line items plus periodic snapshots
//! are walked backwards by [`engine::history::StockOnHandTrace`] to recover
//! the stock level immediately after every historical movement.
//!
//! # Concurrency
//!
//! A [`engine::BatchContext`] is created fresh for every batch and must never
//! be shared across concurrent batches; cross-batch safety for the same
//! facility relies on the store's transaction isolation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;

pub use engine::{LedgerService, SubmitOutcome};
pub use error::{LedgerError, ReferenceKind};
