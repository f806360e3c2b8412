//! Product catalogue service: access-checked product storage with cache and
//! search propagation, plus the repair pipeline that keeps thumbnail
//! references consistent.

pub mod clients;
pub mod context;
pub mod database;
pub mod domain;

#[cfg(test)]
mod test;

pub use domain::{products, repair};
