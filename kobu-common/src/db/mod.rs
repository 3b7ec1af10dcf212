//! Database models and queries

pub mod assets;
pub mod collectors;
pub mod init;
pub mod models;
pub mod reports;
pub mod settings;
pub(crate) mod rows;

pub use assets::*;
pub use collectors::*;
pub use init::*;
pub use models::*;
pub use reports::*;
pub use settings::*;
