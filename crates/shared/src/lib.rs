//! LiveDesk Shared Types and Utilities
//!
//! Domain types, channel naming and database helpers shared by the LiveDesk crates.

pub mod db;
pub mod error;
pub mod timeline;
pub mod types;

pub use db::*;
pub use error::*;
pub use timeline::MessageTimeline;
pub use types::*;
