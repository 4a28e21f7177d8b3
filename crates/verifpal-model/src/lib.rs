//! Symbolic model of a Verifpal protocol: values and their equivalence, the
//! primitive registry, the knowledge map and per-principal states.

pub mod error;
pub mod hash;
pub mod intern;
pub mod ir;
pub mod knowledge;
pub mod lower;
pub mod pretty;
pub mod primitive;
pub mod principal;
pub mod resolve;
pub mod sanity;
pub mod value;

pub use error::{ModelError, ModelResult};
pub use hash::{value_hash, ValueIndex};
pub use intern::Interner;
pub use ir::*;
pub use knowledge::{KnowledgeMap, KnownBy};
pub use lower::lower;
pub use pretty::{pretty_constants, pretty_message, pretty_query, pretty_values};
pub use primitive::{pretty_arity, PrimitiveId, PrimitiveSpec};
pub use principal::{PrincipalState, SlotMeta};
pub use sanity::{check_equation_generators, sanity};
pub use value::*;
