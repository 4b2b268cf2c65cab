//! Columnar vectors with list-view layouts and explicit buffer ownership.

pub mod arrays;
pub mod buffer;
pub mod config;
pub mod testutil;
