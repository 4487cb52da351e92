pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod spiders;
