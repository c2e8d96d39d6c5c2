pub mod config;
pub mod error;
pub mod extract;
pub mod io;
pub mod materialize;
pub mod paths;
pub mod project;
pub mod status;

pub use error::{ProjgenError, Result};
