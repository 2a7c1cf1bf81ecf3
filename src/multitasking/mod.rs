//! Cooperative multitasking: resumable microtasks, the budgeted scheduler
//! that steps them, and the run-later queue they publish results through.

pub mod later;
pub mod micro_task;
pub mod scheduler;
pub mod time;

pub use later::{run_later_channel, LaterCommand, LaterQueue, RunLaterSystem};
pub use micro_task::{
    constant, fold, join, lazy, pair, BoxedMicroTask, MicroTask, MicroTaskExt,
};
pub use scheduler::{MicroThreadComponent, SchedulerSystem};
pub use time::{FrameClock, ManualTime, MonotonicTime, SystemTime};
