mod delivery;
mod scheduler;
mod worker;

pub use delivery::{Notifier, render_message};
pub use scheduler::{DEFAULT_POLL_INTERVAL, DispatchScheduler, IterationReport, SchedulerState};
pub use worker::{DispatchReport, DispatchWorkerPool};
