mod limiter;
mod pool;
mod task;

pub use limiter::{ConcurrencyLimiter, Ticket};
pub use pool::TaskRunner;
pub use task::JobHandle;
