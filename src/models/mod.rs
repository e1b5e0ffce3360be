//! Data models exchanged between the object store gateway and the HTTP
//! layer.
//!
//! All of them are transient: re-derived from the store on every request
//! and serialized as JSON via `serde`.

pub mod bucket;
pub mod object;
