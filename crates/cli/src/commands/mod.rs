pub mod config;
pub mod invoke;
pub mod utils;

pub use config::{handle_config_command, ConfigCommands};
pub use invoke::{run_invocation, Invocation, InvokeOptions, RpcVersionArg};
