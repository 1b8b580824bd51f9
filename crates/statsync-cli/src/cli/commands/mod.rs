mod add;
mod plan;
mod remove;
mod run;
mod status;

pub use add::run_add;
pub use plan::run_plan;
pub use remove::run_remove;
pub use run::run_cycle_cmd;
pub use status::run_status;
