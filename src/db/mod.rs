//! Database module for PostgreSQL connectivity and catalog introspection

pub mod connection;
pub mod introspect;

pub use connection::init_pool;
pub use introspect::SchemaIntrospector;
