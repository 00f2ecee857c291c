pub mod catalog;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod producer;
pub mod views;
