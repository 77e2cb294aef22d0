//! CLI subcommand implementations.

pub mod flip;
pub mod init;
pub mod sides;
pub mod status;
pub mod watch;
