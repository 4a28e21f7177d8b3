//! Errors raised while lowering and sanity checking a model.

use verifpal_syntax::Span;
use thiserror::Error;

/// A model construction or sanity error.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown primitive ({name})")]
    UnknownPrimitive { name: String, span: Span },

    #[error("principal does not exist ({principal})")]
    UnknownPrincipal { principal: String, span: Span },

    #[error("more than 64 principals ({count}) declared")]
    TooManyPrincipals { count: usize },

    #[error("phase being declared ({phase}) must be superior to last declared phase ({last})")]
    PhaseNotIncreasing { phase: u32, last: u32, span: Span },

    #[error("phase being declared ({phase}) skips phases since last declared phase ({last})")]
    PhaseSkipped { phase: u32, last: u32, span: Span },

    #[error("constant is known more than once and in different ways ({constant})")]
    KnownInDifferentWays { constant: String, span: Span },

    #[error("generated constant already exists ({constant})")]
    GeneratedTwice { constant: String, span: Span },

    #[error("constant assigned twice ({constant})")]
    AssignedTwice { constant: String, span: Span },

    #[error("constant does not exist ({constant})")]
    UnknownConstant { constant: String, span: Span },

    #[error("{principal} is using constant ({constant}) despite not knowing it")]
    UsingUnknown {
        principal: String,
        constant: String,
        span: Span,
    },

    #[error("primitive {primitive} has no inputs")]
    NoInputs { primitive: String, span: Span },

    #[error("primitive {primitive} has {found} inputs, expecting {expected}")]
    InputCount {
        primitive: String,
        found: usize,
        expected: String,
        span: Span,
    },

    #[error("primitive {primitive} has {found} outputs, expecting {expected}")]
    OutputCount {
        primitive: String,
        found: usize,
        expected: String,
        span: Span,
    },

    #[error("primitive {primitive} is checked but does not support checking")]
    CheckUnsupported { primitive: String, span: Span },

    #[error("leaked constant does not exist ({constant})")]
    LeakUnknown { constant: String, span: Span },

    #[error("{principal} leaks a constant that they do not know ({constant})")]
    LeakNotKnown {
        principal: String,
        constant: String,
        span: Span,
    },

    #[error("{sender} sends unknown constant to {recipient} ({constant})")]
    SendUnknown {
        sender: String,
        recipient: String,
        constant: String,
        span: Span,
    },

    #[error("{sender} is sending constant ({constant}) despite not knowing it")]
    SendNotKnown {
        sender: String,
        constant: String,
        span: Span,
    },

    #[error("{recipient} is receiving constant ({constant}) despite already knowing it")]
    ReceiveKnown {
        recipient: String,
        constant: String,
        span: Span,
    },

    #[error("{kind} query ({query}) refers to unknown constant ({constant})")]
    QueryUnknownConstant {
        kind: &'static str,
        query: String,
        constant: String,
        span: Span,
    },

    #[error("authentication query ({query}) has more than one constant")]
    QueryMultipleConstants { query: String, span: Span },

    #[error("precondition option message ({query}) has more than one constant")]
    OptionMultipleConstants { query: String, span: Span },

    #[error("{kind} query ({query}) must specify at least two constants")]
    QueryTooFewConstants {
        kind: &'static str,
        query: String,
        span: Span,
    },

    #[error(
        "authentication query ({query}) depends on {principal} sending a constant ({constant}) that they do not know"
    )]
    QuerySenderUnaware {
        query: String,
        principal: String,
        constant: String,
        span: Span,
    },

    #[error(
        "authentication query ({query}) depends on {principal} receiving a constant ({constant}) that they never receive"
    )]
    QueryRecipientUnaware {
        query: String,
        principal: String,
        constant: String,
        span: Span,
    },

    #[error(
        "authentication query ({query}) depends on {principal} using a constant ({constant}) in a primitive, but this never happens"
    )]
    QueryConstantUnused {
        query: String,
        principal: String,
        constant: String,
        span: Span,
    },

    #[error("too many layers in equation ({equation}), maximum is 2")]
    EquationTooDeep { equation: String },

    #[error("equation ({equation}) does not use 'g' as generator")]
    EquationGenerator { equation: String },

    #[error("equation ({equation}) uses 'g' not as a generator")]
    EquationMisplacedGenerator { equation: String },

    #[error("invalid principal state index for constant ({constant})")]
    InvalidIndex { constant: String },

    #[error("value resolution exceeded depth limit")]
    DepthExceeded,
}

impl ModelError {
    /// Source span of the construct that triggered the error, when it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            ModelError::UnknownPrimitive { span, .. }
            | ModelError::UnknownPrincipal { span, .. }
            | ModelError::PhaseNotIncreasing { span, .. }
            | ModelError::PhaseSkipped { span, .. }
            | ModelError::KnownInDifferentWays { span, .. }
            | ModelError::GeneratedTwice { span, .. }
            | ModelError::AssignedTwice { span, .. }
            | ModelError::UnknownConstant { span, .. }
            | ModelError::UsingUnknown { span, .. }
            | ModelError::NoInputs { span, .. }
            | ModelError::InputCount { span, .. }
            | ModelError::OutputCount { span, .. }
            | ModelError::CheckUnsupported { span, .. }
            | ModelError::LeakUnknown { span, .. }
            | ModelError::LeakNotKnown { span, .. }
            | ModelError::SendUnknown { span, .. }
            | ModelError::SendNotKnown { span, .. }
            | ModelError::ReceiveKnown { span, .. }
            | ModelError::QueryUnknownConstant { span, .. }
            | ModelError::QueryMultipleConstants { span, .. }
            | ModelError::OptionMultipleConstants { span, .. }
            | ModelError::QueryTooFewConstants { span, .. }
            | ModelError::QuerySenderUnaware { span, .. }
            | ModelError::QueryRecipientUnaware { span, .. }
            | ModelError::QueryConstantUnused { span, .. } => Some(*span),
            ModelError::TooManyPrincipals { .. }
            | ModelError::EquationTooDeep { .. }
            | ModelError::EquationGenerator { .. }
            | ModelError::EquationMisplacedGenerator { .. }
            | ModelError::InvalidIndex { .. }
            | ModelError::DepthExceeded => None,
        }
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
