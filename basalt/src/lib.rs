#![allow(
    dead_code,
    unused_imports,
)]
//! # Basalt - Document Collection Operation Layer
//!
//! Basalt is the collection-level half of a document database client. It
//! turns typed requests into command documents, runs them over a pluggable
//! store connection and interprets the replies: CRUD, index lifecycle,
//! `distinct`, `rename`, `findAndModify`, client-side grouping and
//! cross-collection references.
//!
//! ## Key Features
//!
//! - **Document model**: closed [common::Value] variants and insertion-ordered
//!   [collection::Document]s with dotted-path access and the [doc!] macro
//! - **Index lifecycle**: `ensure_index`, `drop_index`, `drop_indexes` and
//!   `list_indexes` with passthrough options
//! - **findAndModify**: atomic select-and-update returning the pre-update
//!   document by default, decoded through pluggable type bindings
//! - **Grouping**: reduce and finalize closures over matching documents
//! - **References**: `{ $ref, $id }` pointers resolved by `_id` lookup
//! - **In-memory store**: a complete reference backend for tests and
//!   temporary data
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use basalt::basalt::Basalt;
//! use basalt::collection::IndexOptions;
//! use basalt::doc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Basalt::builder().open("app")?;
//! let users = db.collection("users")?;
//!
//! users.insert(doc!{ name: "Alice", age: 30 })?;
//! users.ensure_index(doc!{ name: 1 }, IndexOptions::new().unique(true))?;
//!
//! let before = users.find_and_modify(doc!{ name: "Alice" }, doc!{ "$inc": { age: 1 } })?;
//! let names = users.distinct("name", None)?;
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`basalt`] - Client entry point
//! - [`basalt_builder`] - Fluent client configuration
//! - [`basalt_config`] - Shared configuration
//! - [`codec`] - Decoders and type bindings
//! - [`collection`] - Documents, indexes and collection operations
//! - [`common`] - Values, constants and utilities
//! - [`database`] - Database handles
//! - [`errors`] - Error types and result definitions
//! - [`group`] - Grouped aggregation
//! - [`reference`] - Document references
//! - [`store`] - Store connection contract and the in-memory store

pub mod basalt;
pub mod basalt_builder;
pub mod basalt_config;
pub mod codec;
pub mod collection;
pub mod common;
pub mod database;
pub mod errors;
pub mod group;
pub mod reference;
pub mod store;
