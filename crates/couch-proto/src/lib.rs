//! # couch-proto
//!
//! Document protocol layer for CouchDB-compatible stores.
//!
//! ## Features
//!
//! - [`Document`] and [`Revision`] types matching the `_id` / `_rev` wire format
//! - Mango equality queries ([`FindQuery`])
//! - The [`DocumentStore`] trait with optimistic-concurrency write semantics
//! - [`HttpStore`], a `reqwest` client for a CouchDB server (feature `http`)
//! - [`MemoryStore`], an in-process store with the same revision rules
//!
//! ## Quick Start
//!
//! ```rust
//! use couch_proto::{Document, DocumentStore, MemoryStore};
//! use serde_json::json;
//!
//! # async fn demo() -> couch_proto::Result<()> {
//! let store = MemoryStore::new();
//! let mut doc = Document::new("7f1c6b7e-0000-4000-8000-000000000001");
//! doc.set("value", json!(null));
//!
//! let rev = store.insert(&doc).await?;
//! let mut current = store.get(doc.id()).await?.expect("just inserted");
//! assert_eq!(current.revision(), Some(&rev));
//!
//! current.set("value", json!("21.5"));
//! store.update(&current).await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod document;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod query;
mod store;

pub use self::document::{Document, ID_KEY, REV_KEY, Revision};
pub use self::error::{CouchError, Result};
#[cfg(feature = "http")]
pub use self::http::{HttpStore, HttpStoreBuilder};
pub use self::memory::MemoryStore;
pub use self::query::FindQuery;
pub use self::store::DocumentStore;
