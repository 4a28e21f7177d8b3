//! Library surface of the `verifpal` command: model loading with rich
//! diagnostics, result rendering and the JSON bridge.

pub mod json;
pub mod report;

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use verifpal_model::Model;

/// CLI error with source context for pretty printing.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to read file: {message}")]
    IoError { message: String },

    #[error("parse error: {message}")]
    #[diagnostic(code(verifpal::parse_error))]
    ParseError {
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(verifpal::model_error))]
    ModelError {
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("verification error: {message}")]
    #[diagnostic(code(verifpal::engine_error))]
    EngineError { message: String },

    #[error("invalid JSON request: {message}")]
    JsonError { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl CliError {
    pub fn from_parse_error(e: verifpal_syntax::ParseError, source: Arc<String>, filename: &str) -> Self {
        let span = e.span();
        CliError::ParseError {
            message: e.to_string(),
            src: NamedSource::new(filename, source),
            span: (span.start, span.len()).into(),
        }
    }

    pub fn from_model_error(e: verifpal_model::ModelError, source: Arc<String>, filename: &str) -> Self {
        CliError::ModelError {
            span: e.span().map(|s| (s.start, s.len()).into()),
            message: e.to_string(),
            src: NamedSource::new(filename, source),
        }
    }
}

impl From<verifpal_engine::EngineError> for CliError {
    fn from(e: verifpal_engine::EngineError) -> Self {
        CliError::EngineError { message: e.to_string() }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::JsonError { message: e.to_string() }
    }
}

pub type CliResult<T> = Result<T, CliError>;

/// Parse and lower model source. `file_name` must be a valid model file
/// name; only its final path component is checked.
pub fn load_source(source: Arc<String>, file_name: &str) -> CliResult<Model> {
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    verifpal_syntax::validate_file_name(&base)
        .map_err(|e| CliError::from_parse_error(e, source.clone(), file_name))?;
    let ast = verifpal_syntax::parse(&source)
        .map_err(|e| CliError::from_parse_error(e, source.clone(), file_name))?;
    verifpal_model::lower(&ast, &base).map_err(|e| CliError::from_model_error(e, source.clone(), file_name))
}

/// Read and load a model file.
pub fn load_model(path: &Path) -> CliResult<(Model, Arc<String>)> {
    let filename = path.display().to_string();
    let source = Arc::new(fs::read_to_string(path).map_err(|e| CliError::IoError {
        message: format!("{filename}: {e}"),
    })?);
    let model = load_source(source.clone(), &filename)?;
    Ok((model, source))
}

/// Run the sanity pass, attaching source context to its errors.
pub fn check_model(
    model: &Model,
    source: Arc<String>,
    filename: &str,
) -> CliResult<(verifpal_model::KnowledgeMap, Vec<verifpal_model::PrincipalState>)> {
    verifpal_model::sanity(model).map_err(|e| CliError::from_model_error(e, source, filename))
}
