pub mod command_executor;
pub mod os_profile;

pub use command_executor::{ExecutionEngine, ExecutionError};
pub use os_profile::resolve;
