//! Service configuration: YAML schema plus the layered loader.

pub mod loader;
pub mod schema;
