//! Implementations of the capability traits.
//!
//! - [`rest`]: a live project over HTTP
//! - `memory`: an in-process project with failure injection, built for tests
//!   and behind the `memory` feature

#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod rest;

#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryBackend;
pub use rest::{RestQueryClient, RestStorageClient};
