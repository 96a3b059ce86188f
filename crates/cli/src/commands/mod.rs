//! Command implementations shared by the binaries

pub mod analyze;
pub mod apply;
