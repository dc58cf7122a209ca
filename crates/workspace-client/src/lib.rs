//! Client for the workspace repos and SQL query-history REST APIs.

pub mod context;
pub mod error;
pub mod repos;
pub mod session;
pub mod sql;
