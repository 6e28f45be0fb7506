use thiserror::Error;

use crate::expr::ExprError;

/// Main error type for the yuv-hue library
#[derive(Error, Debug)]
pub enum HueError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frame processing error: {0}")]
    Frame(#[from] FrameError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised while configuring the filter, either from option text or
/// from a configuration file.
///
/// Every variant is local to the call that produced it: the filter keeps its
/// previous, valid parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("H and h options are incompatible and cannot be specified at the same time")]
    IncompatibleOptions,

    #[error("Invalid value for saturation {value:.1}: must be included between range {min} and +{max}")]
    OutOfRange { value: f32, min: f32, max: f32 },

    #[error("Parsing failed for expression {name}='{expr}': {source}")]
    ExpressionCompile {
        name: String,
        expr: String,
        #[source]
        source: ExprError,
    },

    #[error("Invalid syntax for argument '{args}': must be in the form 'hue[:saturation]'")]
    InvalidSyntax { args: String },

    #[error("Option not found: {key}")]
    UnknownOption { key: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Errors raised by the frame plumbing around the chroma transform.
///
/// The transform itself never fails; these only report misuse of the
/// row-range protocol or malformed buffers.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Filter input has not been configured")]
    NotConfigured,

    #[error("Unsupported pixel format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid row range {start}..{end} (next row {next}, height {height})")]
    InvalidRowRange {
        start: usize,
        end: usize,
        next: usize,
        height: usize,
    },

    #[error("Frame geometry mismatch: expected {expected}, got {actual}")]
    GeometryMismatch { expected: String, actual: String },

    #[error("Plane buffer too small: need {needed} bytes, have {available}")]
    PlaneTooSmall { needed: usize, available: usize },

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Errors raised by runtime commands sent to a running filter.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command '{name}' is not supported")]
    NotSupported { name: String },

    #[error("Invalid scheduled command: {entry}")]
    InvalidSchedule { entry: String },
}

/// Non-fatal notices recorded while resolving parameters for a frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeWarning {
    #[error("Saturation value {value} not in range [{min},{max}]: clipping value to {clamped:.1}")]
    SaturationClamped {
        value: f64,
        clamped: f32,
        min: f32,
        max: f32,
    },

    #[error("Expression {name} evaluated to a non-finite value, keeping {kept}")]
    NonFiniteValue { name: &'static str, kept: f32 },
}

/// Convenience type alias for Results using HueError
pub type Result<T> = std::result::Result<T, HueError>;

impl HueError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if the filter is still usable after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Configuration failures roll back and leave the old parameters active
            Self::Config(_) => true,
            Self::Command(_) => true,
            Self::Io(_) => false,
            Self::Frame(FrameError::InvalidRowRange { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(ConfigError::IncompatibleOptions) => {
                "Use either 'h' (degrees) or 'H' (radians) for the hue, not both.".to_string()
            }
            Self::Config(ConfigError::ExpressionCompile { name, expr, .. }) => {
                format!("Could not parse the '{}' expression '{}'. Valid variables are n, pts, r, t and tb.", name, expr)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Frame(FrameError::UnsupportedFormat { format }) => {
                format!(
                    "Pixel format '{}' is not supported. Use one of: yuv444p, yuv422p, yuv420p, yuv411p, yuv410p, yuv440p, yuva420p",
                    format
                )
            }
            _ => self.to_string(),
        }
    }
}
