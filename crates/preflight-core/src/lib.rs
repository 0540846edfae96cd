pub mod config;
pub mod extract;
pub mod persist;

pub use config::*;
pub use extract::*;

pub use persist::*;
