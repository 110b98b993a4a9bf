pub mod cache;
pub mod core;
pub mod ctp;
pub mod engine;
pub mod model;
pub mod pubsub;
