//! Configuration for generated code

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{InjectionConfig, Visibility};
