//! Error taxonomy and exit-code mapping.
//!
//! - Only startup, resolution and setup failures end the process by themselves.
//! - Recoverable problems (pull, network creation, persistence, single mounts) are
//!   printed as warnings and never become a `BoxError` on the main path.
//! - Exit codes: 1 for every error, 130 for an interrupt.
use std::fmt;
use std::io;

pub const EXIT_ERROR: u8 = 1;
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug)]
pub enum BoxError {
    /// Neither docker nor podman was found (or the forced runtime is missing).
    RuntimeNotFound(String),
    /// The runtime binary exists but `version` failed.
    RuntimeUnavailable { runtime: String, remediation: String },
    /// A named image was requested that has no saved configuration.
    UnknownImage { name: String, known: Vec<String> },
    /// The setup command of a named image failed; nothing was committed.
    SetupFailed { name: String, detail: String },
    /// A single mount spec could not be resolved.
    Mount { spec: String, detail: String },
    Config(String),
    Interrupted,
    Io(io::Error),
}

impl BoxError {
    pub fn exit_code(&self) -> u8 {
        match self {
            BoxError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_ERROR,
        }
    }
}

impl fmt::Display for BoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxError::RuntimeNotFound(msg) => write!(f, "{msg}"),
            BoxError::RuntimeUnavailable {
                runtime,
                remediation,
            } => write!(f, "{runtime} is installed but not responding. {remediation}"),
            BoxError::UnknownImage { name, known } => {
                if known.is_empty() {
                    write!(f, "named image '{name}' not found; no named images are saved")
                } else {
                    write!(
                        f,
                        "named image '{name}' not found; available: {}",
                        known.join(", ")
                    )
                }
            }
            BoxError::SetupFailed { name, detail } => {
                write!(f, "failed to create named image '{name}': {detail}")
            }
            BoxError::Mount { spec, detail } => write!(f, "cannot mount '{spec}': {detail}"),
            BoxError::Config(msg) => write!(f, "{msg}"),
            BoxError::Interrupted => write!(f, "interrupted by user"),
            BoxError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BoxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoxError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BoxError {
    fn from(e: io::Error) -> Self {
        BoxError::Io(e)
    }
}
