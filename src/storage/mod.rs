//! Storage layer for FlowKey Vault
//!
//! Atomic file writes, the preferences key-value store, and secure erasure.

pub mod file_io;
pub mod kv;
pub mod secure_erase;

pub use file_io::{read_json, write_atomic, write_json_atomic};
pub use kv::KeyValueStore;
pub use secure_erase::SecureEraser;
