//! # Corpus Studio
//!
//! The client-side state engine of a corpus preparation studio: source
//! texts and derived datasets live in a canonical in-memory store with
//! linear undo/redo, persist to a single JSON state file, and reconcile
//! against an external processing backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   mutations    ┌──────────────┐
//! │ UI / CLI /   │───────────────▶│ EntityStore  │◀──── snapshots ────┐
//! │ IPC callers  │   selectors    │ (canonical)  │                    │
//! └──────────────┘◀───────────────└──────┬───────┘             ┌──────┴──────┐
//!                                        │                     │   History   │
//!                          save/load/    │    push/pull/jobs   │ (undo/redo) │
//!                          export/import │                     └─────────────┘
//!                                 ┌──────┴───────┐   ┌─────────────┐
//!                                 │ Persistence  │   │ SyncService │──▶ Backend
//!                                 └──────────────┘   └─────────────┘
//! ```
//!
//! Every mutation funnels through a named `EntityStore` entry point.
//! User-intent mutations snapshot state into history first; background
//! observations (processing status flips, full reloads) apply directly
//! and cannot be undone.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Source text, dataset, and chunk data types |
//! | [`settings`] | Singleton app settings + validation |
//! | [`error`] | Typed validation/settings errors |
//! | [`history`] | Bounded snapshot list with undo/redo |
//! | [`store`] | Canonical entity store and mutation entry points |
//! | [`persist`] | State file save/load, versioned export/import |
//! | [`backend`] | Backend trait, wire format, conversions |
//! | [`sync`] | Reconciliation, job orchestration, auto-sync timer |

pub mod backend;
pub mod error;
pub mod history;
pub mod models;
pub mod persist;
pub mod settings;
pub mod store;
pub mod sync;
