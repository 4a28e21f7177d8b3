//! Active and passive attacker analysis of Verifpal models.

mod active;
mod analysis;
pub mod attacker;
pub mod config;
pub mod error;
pub mod inject;
pub mod mutation;
pub mod possible;
pub mod query;
pub mod results;
pub mod rewrite;
pub mod verify;

pub use attacker::{Attacker, AttackerView};
pub use config::{ProgressCounters, VerifyConfig};
pub use error::{EngineError, EngineResult};
pub use mutation::MutationMap;
pub use results::{results_code, MutationRecord, QueryOptionResult, VerifyResult};
pub use rewrite::{perform_all_rewrites, possible_to_rewrite, possible_to_rewrite_within, MAX_DEPTH};
pub use verify::{verify, VerifyOutcome, Verifier};
