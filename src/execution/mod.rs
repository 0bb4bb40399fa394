//! Execution of validated queries against PostgreSQL.

pub mod gateway;
pub mod result;

pub use gateway::{ExecutionGateway, ExecutionLimits, QueryExecutor};
pub use result::{ResultSet, Row};
