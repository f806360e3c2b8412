//! Product Service Domain Concerns

pub mod products;
pub mod repair;
