//! # Repo Indexer
//!
//! Keeps external indexes in sync with a linked-data repository.
//!
//! The repository announces every change as a notification naming a
//! resource and an event type. For each notification the indexer fetches
//! whatever representation each configured backend needs, once per
//! representation, and pushes it to every backend concurrently. Removals
//! go straight to every backend without touching the repository.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ Notification │──▶│  Dispatcher  │──▶│  Backends      │
//! │ HTTP / CLI   │   │ classify +   │   │ Solr / SPARQL  │
//! └──────────────┘   │ fetch once   │   │ / SQLite       │
//!                    └──────┬───────┘   └────────────────┘
//!                           │ RDF / named fields
//!                           ▼
//!                    ┌──────────────┐
//!                    │  Repository  │
//!                    └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`notification`] | Header parsing and event classification |
//! | [`retriever`] | Memoizing content retrieval (RDF, named fields) |
//! | [`rdf`] | Transformation-marker lookup in RDF/XML |
//! | [`dispatcher`] | Per-notification fan-out to backends |
//! | [`registry`] | Building backends and the dispatcher from config |
//! | [`backend_solr`] | Solr JSON update backend |
//! | [`backend_sparql`] | SPARQL Graph Store backend |
//! | [`backend_sqlite`] | Local SQLite FTS5 backend |
//! | [`fields`] | Named-fields document parsing |
//! | [`search`] | Keyword search over a SQLite index |
//! | [`server`] | HTTP notification endpoint |
//! | [`signature`] | HMAC request signing |
//! | [`logging`] | tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod backend_solr;
pub mod backend_sparql;
pub mod backend_sqlite;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod fields;
pub mod logging;
pub mod migrate;
pub mod notification;
pub mod rdf;
pub mod registry;
pub mod retriever;
pub mod search;
pub mod server;
pub mod signature;
