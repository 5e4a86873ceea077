pub mod app;
pub mod client;
pub mod config;
pub mod console;
pub mod engine;
pub mod enqueue;
pub mod error;
pub mod filter;
pub mod flatten;
pub mod logging;
pub mod poller;
pub mod selection;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod view;
