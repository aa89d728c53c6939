//! HTTP API for the rankprof application.

pub mod comments;
pub mod error;
pub mod identity;
pub mod professors;
pub mod profile;
pub mod ranking;
pub mod routes;
pub mod status;

pub use routes::*;
