//! clibs - native library acquisition and caching
//!
//! Resolves each native C library a project depends on to a directory of
//! build output, taking the cheapest option that is still valid: a cached
//! build, a cached or downloaded prebuilt archive, or a fresh build from
//! fetched source.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod pipeline;
pub mod prebuilt;
pub mod process;
pub mod project;
pub mod spec;
pub mod target;
pub mod ui;

pub use error::{ClibsError, ClibsResult};
