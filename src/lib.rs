//! Professor rating and ranking service.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod display;
pub mod logging;
pub mod state;
pub mod utils;
pub mod view;
pub mod web;
