//! Object store gateway: the `ObjectStore` trait and its implementations.

pub mod memory_store;
pub mod object_store;
pub mod s3_store;
