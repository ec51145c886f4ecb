//! Application error type.
//!
//! Every fallible operation in the crate returns `AppError`. The exit code is
//! carried alongside the message so the binary can map failures to a process
//! status without inspecting strings:
//!
//! - `2`: invalid input (arguments, files, configuration)
//! - `3`: insufficient data (too few bins, no centroids, nothing finite)
//! - `4`: numerical failure (non-finite objective, failed solve)

/// Exit code for invalid input.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for insufficient data.
pub const EXIT_DATA: u8 = 3;
/// Exit code for numerical failures.
pub const EXIT_NUMERIC: u8 = 4;

#[derive(Clone, PartialEq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(EXIT_DATA, message)
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::new(EXIT_NUMERIC, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
