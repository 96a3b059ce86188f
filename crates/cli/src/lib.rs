//! Shared pieces of the `sentralert` and `sentralert-apply` binaries

pub mod commands;
pub mod git;
pub mod logging;
pub mod output;
