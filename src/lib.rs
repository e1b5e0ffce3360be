//! Web file manager for S3-compatible object stores.
//!
//! Lists buckets, browses objects folder by folder, and uploads, downloads
//! and deletes objects through a JSON API. Folder navigation is a view
//! derived from `/`-delimited keys; see [`namespace`].

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod namespace;
pub mod routes;
pub mod services;
pub mod state;
