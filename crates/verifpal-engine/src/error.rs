use thiserror::Error;
use verifpal_model::ModelError;

/// Analysis error. Attacker-caused rewrite failures are not errors; they
/// prune the mutated state instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A checked primitive fails in an honest run of the protocol.
    #[error("checked primitive fails: {primitive}")]
    CheckedPrimitiveFails { primitive: String },

    #[error("phase {phase} has no recorded values for constant ({constant})")]
    MissingPhase { phase: u32, constant: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
