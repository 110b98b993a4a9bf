pub mod data_publisher;
pub mod execution_engine;

pub use data_publisher::DataPublisher;
pub use execution_engine::ExecutionEngine;
