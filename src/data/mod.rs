//! Data service access and the core flows built on it.

pub mod comments;
pub mod faculty;
pub mod memory;
pub mod models;
pub mod names;
pub mod postgres;
pub mod professors;
pub mod profiles;
pub mod ranking;
pub mod ratings;
pub mod service;
