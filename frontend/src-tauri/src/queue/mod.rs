pub mod lane;
pub mod processing_queue;

pub use processing_queue::ProcessingQueue;
