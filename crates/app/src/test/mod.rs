//! Shared test infrastructure.

pub mod db;

mod scenarios;

pub use context::TestContext;
