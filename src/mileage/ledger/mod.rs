pub mod bootstrap;
pub mod config;
pub mod error;
pub mod geo;
pub mod io;
pub mod model;
pub mod postcode;
pub mod session;
pub mod workflow;

pub use error::{Result, ToolError};
