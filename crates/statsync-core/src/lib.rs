pub mod config;
pub mod logging;

pub mod api;
pub mod checkpoint;
pub mod control;
pub mod error;
pub mod model;
pub mod processor;
pub mod quota;
pub mod ratelimit;
pub mod retry;
pub mod scheduler;
pub mod statsdb;
