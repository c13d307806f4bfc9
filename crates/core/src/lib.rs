//! Domain types and pure logic shared by every atelier crate.
//!
//! Nothing in here touches the database or the filesystem.

pub mod blob;
pub mod error;
pub mod reconcile;
pub mod sweep;
pub mod types;
