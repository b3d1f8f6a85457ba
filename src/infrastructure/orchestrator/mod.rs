//! Startup orchestration and backend supervision

mod initializer;
mod join;
mod supervisor;

pub use initializer::{Initializer, ProvisionReport};
pub use join::join_all_tasks;
pub use supervisor::SupervisedProcess;
