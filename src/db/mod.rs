//! Persistence: schema, row conversion, loading and the connection pool.

pub mod converters;
pub mod loader;
pub mod pool;
pub mod schema;
