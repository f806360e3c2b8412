//! Products

pub mod access;
pub mod batch;
pub mod cache;
pub mod data;
pub mod errors;
pub mod models;
pub mod pagination;
pub mod permissions;
pub mod repository;
pub mod search;
pub mod service;
pub mod store;

pub use errors::{ErrorStatus, ProductsServiceError};
pub use service::*;
