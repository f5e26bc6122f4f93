pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod device;
pub mod feed;
pub mod logging;
pub mod parsers;
pub mod reconcile;
pub mod services;
pub mod state;
pub mod sync;
pub mod utils;
pub mod web;
