//! # Repo Indexer Core
//!
//! Runtime-agnostic building blocks shared by the dispatcher, the backend
//! adapters, and embedding hosts: notification and content models, the
//! error taxonomy, and the [`IndexBackend`](backend::IndexBackend) trait
//! with an in-memory implementation.
//!
//! This crate contains no HTTP client, database driver, or async runtime.

pub mod backend;
pub mod error;
pub mod models;
