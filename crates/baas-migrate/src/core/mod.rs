//! Core abstractions shared by every migration phase.
//!
//! - [`value`]: records, record sets and object-storage types
//! - [`traits`]: the query and storage capability traits
//! - [`identifier`]: identifier validation and quoting for generated SQL

pub mod identifier;
pub mod traits;
pub mod value;

pub use traits::{Filter, QueryClient, SelectQuery, StorageClient};
pub use value::{
    Bucket, BucketOptions, FileMetadata, ListOptions, Record, SortColumn, StorageEntry,
    TableRecordSet,
};
