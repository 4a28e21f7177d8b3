//! Static checks run before analysis, and construction of the knowledge map
//! and principal states for a model that passes them.

use crate::error::{ModelError, ModelResult};
use crate::ir::{Block, Message, Model, Query, QueryKind};
use crate::knowledge::KnowledgeMap;
use crate::principal::PrincipalState;
use crate::value::{Constant, Value};
use tracing::debug;

/// Check the model and build its knowledge map and principal states.
pub fn sanity(model: &Model) -> ModelResult<(KnowledgeMap, Vec<PrincipalState>)> {
    check_phases(model)?;
    let km = KnowledgeMap::build(model)?;
    check_queries(model, &km)?;
    let states = PrincipalState::construct_all(model, &km);
    debug!(
        file = %model.file_name,
        constants = km.len(),
        principals = states.len(),
        "model passed sanity checks"
    );
    Ok((km, states))
}

fn check_phases(model: &Model) -> ModelResult<()> {
    let mut last = 0u32;
    for block in &model.blocks {
        let Block::Phase(p) = block else { continue };
        if p.number <= last {
            return Err(ModelError::PhaseNotIncreasing {
                phase: p.number,
                last,
                span: p.span,
            });
        }
        if p.number > last + 1 {
            return Err(ModelError::PhaseSkipped {
                phase: p.number,
                last,
                span: p.span,
            });
        }
        last = p.number;
    }
    Ok(())
}

fn check_queries(model: &Model, km: &KnowledgeMap) -> ModelResult<()> {
    for query in &model.queries {
        let text = crate::pretty::pretty_query(query);
        let unknown = |c: &Constant| ModelError::QueryUnknownConstant {
            kind: query.kind.as_str(),
            query: text.clone(),
            constant: c.name.to_string(),
            span: query.span,
        };
        match query.kind {
            QueryKind::Confidentiality | QueryKind::Freshness => {
                for c in &query.constants {
                    km.index_of(c.id).ok_or_else(|| unknown(c))?;
                }
            }
            QueryKind::Unlinkability | QueryKind::Equivalence => {
                if query.constants.len() < 2 {
                    return Err(ModelError::QueryTooFewConstants {
                        kind: query.kind.as_str(),
                        query: text,
                        span: query.span,
                    });
                }
                for c in &query.constants {
                    km.index_of(c.id).ok_or_else(|| unknown(c))?;
                }
            }
            QueryKind::Authentication => {
                let Some(message) = &query.message else { continue };
                let Some(c) = message.constants.first() else { continue };
                km.index_of(c.id).ok_or_else(|| unknown(c))?;
                if message.constants.len() != 1 {
                    return Err(ModelError::QueryMultipleConstants {
                        query: text,
                        span: query.span,
                    });
                }
                check_known(query, &text, message, c, km)?;
            }
        }
        for option in &query.options {
            let message = &option.message;
            if message.constants.len() != 1 {
                return Err(ModelError::OptionMultipleConstants {
                    query: text,
                    span: query.span,
                });
            }
            let c = &message.constants[0];
            km.index_of(c.id).ok_or_else(|| unknown(c))?;
            check_known(query, &text, message, c, km)?;
        }
    }
    Ok(())
}

/// The sender must know `c`, the recipient must receive it and the recipient
/// must use it inside some primitive or equation.
fn check_known(query: &Query, text: &str, m: &Message, c: &Constant, km: &KnowledgeMap) -> ModelResult<()> {
    let Some(i) = km.index_of(c.id) else {
        return Ok(());
    };
    if !km.knows(i, m.sender.id) {
        return Err(ModelError::QuerySenderUnaware {
            query: text.to_string(),
            principal: m.sender.name.to_string(),
            constant: c.name.to_string(),
            span: query.span,
        });
    }
    if !km.knows(i, m.recipient.id) {
        return Err(ModelError::QueryRecipientUnaware {
            query: text.to_string(),
            principal: m.recipient.name.to_string(),
            constant: c.name.to_string(),
            span: query.span,
        });
    }
    if !km.constant_used_by(m.recipient.id, c) {
        return Err(ModelError::QueryConstantUnused {
            query: text.to_string(),
            principal: m.recipient.name.to_string(),
            constant: c.name.to_string(),
            span: query.span,
        });
    }
    Ok(())
}

/// Every equation reachable in `v` must be `g` raised to at most two
/// exponents, none of which is `g`.
pub fn check_equation_generators(v: &Value) -> ModelResult<()> {
    match v {
        Value::Constant(_) => Ok(()),
        Value::Primitive(p) => p.arguments.iter().try_for_each(check_equation_generators),
        Value::Equation(e) => {
            let text = v.to_string();
            if e.values.len() > 3 {
                return Err(ModelError::EquationTooDeep { equation: text });
            }
            for (i, element) in e.values.iter().enumerate() {
                match (i, element) {
                    (0, x) if !x.is_g() => {
                        return Err(ModelError::EquationGenerator { equation: text })
                    }
                    (1.., x) if x.is_g() => {
                        return Err(ModelError::EquationMisplacedGenerator { equation: text })
                    }
                    _ => {}
                }
            }
            Ok(())
        }
    }
}
