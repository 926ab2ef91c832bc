use std::{error, fmt};

/// The kinds of errors this simulator distinguishes. All of them are fatal: the simulator
/// guarantees a timestep is never partially applied, so there's no recoverable variant that
/// crosses a timestep boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dangling IDs, mismatched endpoints, probabilities not summing to 1, and other faults
    /// discovered while building a `Simulator` from specs.
    Configuration,
    /// A lane was asked to operate before its upstream or downstream was attached.
    MissingConnection,
    /// A core invariant was violated: a vehicle section found in two places, an exited vehicle
    /// still resident, a speed-limit clip gone negative, and so on.
    InvariantViolation,
    /// The reservation engine's mock loop found the outgoing road too short to finish a test
    /// sequence. This is a configuration fault, not an engine rejection.
    OutgoingRoadTooShort,
}

#[derive(Debug, Clone)]
pub struct AimError {
    kind: ErrorKind,
    message: String,
    context: Vec<String>,
}

impl AimError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> AimError {
        AimError {
            kind,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> AimError {
        AimError::new(ErrorKind::Configuration, message)
    }

    pub fn missing_connection(message: impl Into<String>) -> AimError {
        AimError::new(ErrorKind::MissingConnection, message)
    }

    pub fn invariant(message: impl Into<String>) -> AimError {
        AimError::new(ErrorKind::InvariantViolation, message)
    }

    pub fn outgoing_road_too_short(message: impl Into<String>) -> AimError {
        AimError::new(ErrorKind::OutgoingRoadTooShort, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(mut self, msg: impl Into<String>) -> AimError {
        self.context.push(msg.into());
        self
    }

    /// Exit code: 0 clean, 1 configuration error, 2 assertion failure.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::Configuration | ErrorKind::OutgoingRoadTooShort => 1,
            ErrorKind::MissingConnection | ErrorKind::InvariantViolation => 2,
        }
    }
}

impl fmt::Display for AimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        for c in &self.context {
            write!(f, "\n  - {}", c)?;
        }
        Ok(())
    }
}

impl error::Error for AimError {}

pub type Result<T> = std::result::Result<T, AimError>;
