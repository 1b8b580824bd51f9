//! The batch scheduler.
//!
//! Orchestrates one work cycle: reconcile with the checkpoint store, compute
//! the remaining entity set, partition it into fixed-size batches, and run
//! each batch under bounded parallelism with a pre-batch quota gate and a
//! post-batch durable checkpoint. Only one batch is in flight at a time, so
//! checkpoint state always reflects a complete prefix of the plan.

mod plan;
mod progress;
mod report;
mod run;

pub use plan::{dedupe_tasks, partition_batches, remaining_tasks};
pub use progress::ProgressStats;
pub use report::CycleReport;
pub use run::{CycleOptions, CycleRunner};
