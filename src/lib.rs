pub mod api;
pub mod config;
pub mod rollup;
pub mod server;
pub mod sheet;
