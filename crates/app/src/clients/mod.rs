//! Clients for collaborating services.

pub mod authority;
pub mod storage;

pub use authority::{Authority, AuthorityConfig, AuthorityError, HttpAuthorityClient};
pub use storage::{
    HttpObjectMetadataClient, ObjectInfo, ObjectMetadata, ObjectMetadataError, StorageConfig,
};
