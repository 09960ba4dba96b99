pub mod config;
pub mod error;
pub mod mime;
pub mod path;
pub mod types;

pub use error::{XdbpError, XdbpResult};
pub use types::{Content, FileRecord};
