//! CLI command implementations.

pub mod compare;
pub mod init;
pub mod run;
