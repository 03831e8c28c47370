//! CLI commands implementation

pub mod init;
pub mod migrate;
pub mod status;
pub mod verify;

pub use init::*;
pub use migrate::*;
pub use status::*;
pub use verify::*;
