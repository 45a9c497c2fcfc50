//! CLI commands implementation

pub mod backfill;
pub mod chunk;
pub mod chunks;
pub mod init;
pub mod keywords;
pub mod retrieve;
pub mod route;
pub mod status;

pub use backfill::*;
pub use chunk::*;
pub use chunks::*;
pub use init::*;
pub use keywords::*;
pub use retrieve::*;
pub use route::*;
pub use status::*;
