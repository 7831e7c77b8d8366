pub use receptor_core::QueueError;
