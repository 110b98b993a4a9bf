pub use order_lifecycle_cache::{
    ApplyOutcome, CompletionCallback, ExecutionListener, OrderEvents, OrderLifecycleCache,
};

mod order_lifecycle_cache;
