use courier_core::errors::{EngineBuildError, InvocationError};
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    Config(String),
    Io(String),
    Usage(String),
    Invocation(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Usage(msg) => write!(f, "Invalid arguments: {msg}"),
            Self::Invocation(msg) => write!(f, "Invocation failed: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Usage(error.to_string())
    }
}

impl From<EngineBuildError> for CliError {
    fn from(error: EngineBuildError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<InvocationError> for CliError {
    fn from(error: InvocationError) -> Self {
        Self::Invocation(error.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

pub fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub fn print_info(message: &str) {
    println!("[INFO] {message}");
}
