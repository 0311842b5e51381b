pub mod bins;
pub mod buffer;
pub mod client;
pub mod common;
pub mod config;
pub mod errors;
pub mod filters;
pub mod sync;
pub mod wire;
