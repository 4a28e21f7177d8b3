//! Lowering from the parsed AST to the model IR.

use crate::error::{ModelError, ModelResult};
use crate::intern::Interner;
use crate::ir::*;
use crate::primitive::PrimitiveId;
use crate::value::{Constant, Declaration, PrincipalId, Primitive, Qualifier, Value};
use std::sync::Arc;
use tracing::debug;
use verifpal_syntax as ast;

/// Lower a parsed model. Principals get ids in declaration order; every
/// principal named by a message or an authentication query must have been
/// declared with a principal block.
pub fn lower(model: &ast::Model, file_name: &str) -> ModelResult<Model> {
    let mut lowerer = Lowerer {
        names: Interner::new(),
        principals: vec![Arc::from("Attacker")],
    };

    for block in &model.blocks {
        if let ast::Block::Principal(p) = block {
            if !lowerer.principals.iter().skip(1).any(|n| **n == *p.name.name) {
                lowerer.principals.push(Arc::from(p.name.name.as_str()));
            }
        }
    }
    let declared = lowerer.principals.len() - 1;
    if declared > MAX_PRINCIPALS {
        return Err(ModelError::TooManyPrincipals { count: declared });
    }

    let blocks = model
        .blocks
        .iter()
        .map(|b| lowerer.block(b))
        .collect::<ModelResult<Vec<_>>>()?;
    let queries = model
        .queries
        .iter()
        .map(|q| lowerer.query(q))
        .collect::<ModelResult<Vec<_>>>()?;

    debug!(
        principals = declared,
        constants = lowerer.names.len(),
        blocks = blocks.len(),
        queries = queries.len(),
        "lowered model"
    );

    Ok(Model {
        file_name: file_name.to_string(),
        attacker: match model.attacker {
            ast::AttackerKind::Passive => AttackerKind::Passive,
            ast::AttackerKind::Active => AttackerKind::Active,
        },
        blocks,
        queries,
        principals: lowerer.principals,
        names: lowerer.names,
    })
}

struct Lowerer {
    names: Interner,
    principals: Vec<Arc<str>>,
}

impl Lowerer {
    fn principal(&self, ident: &ast::Ident) -> ModelResult<Principal> {
        self.principals
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, n)| ***n == *ident.name)
            .map(|(i, n)| Principal {
                id: PrincipalId(i as u8),
                name: n.clone(),
            })
            .ok_or_else(|| ModelError::UnknownPrincipal {
                principal: ident.name.clone(),
                span: ident.span,
            })
    }

    fn constant(&self, ident: &ast::Ident) -> Constant {
        self.names.constant(&ident.name)
    }

    fn block(&self, block: &ast::Block) -> ModelResult<Block> {
        Ok(match block {
            ast::Block::Principal(p) => Block::Principal(PrincipalBlock {
                principal: self.principal(&p.name)?,
                expressions: p
                    .expressions
                    .iter()
                    .map(|e| self.expression(e))
                    .collect::<ModelResult<_>>()?,
                span: p.span,
            }),
            ast::Block::Message(m) => Block::Message(Message {
                sender: self.principal(&m.sender)?,
                recipient: self.principal(&m.recipient)?,
                constants: m
                    .constants
                    .iter()
                    .map(|c| Constant {
                        guard: c.guard,
                        ..self.constant(&c.ident)
                    })
                    .collect(),
                span: m.span,
            }),
            ast::Block::Phase(p) => Block::Phase(PhaseBlock {
                number: p.number,
                span: p.span,
            }),
        })
    }

    fn expression(&self, expr: &ast::Expression) -> ModelResult<Expression> {
        let declared = |idents: &[ast::Ident], declaration, qualifier, fresh| {
            idents
                .iter()
                .map(|i| Constant {
                    fresh,
                    declaration: Some(declaration),
                    qualifier: Some(qualifier),
                    ..self.constant(i)
                })
                .collect::<Vec<_>>()
        };
        Ok(match expr {
            ast::Expression::Knows {
                qualifier,
                constants,
                span,
            } => {
                let qualifier = Qualifier::from(*qualifier);
                Expression {
                    kind: ExpressionKind::Knows,
                    qualifier: Some(qualifier),
                    constants: declared(constants, Declaration::Knows, qualifier, false),
                    assigned: None,
                    span: *span,
                }
            }
            ast::Expression::Generates { constants, span } => Expression {
                kind: ExpressionKind::Generates,
                qualifier: None,
                constants: declared(constants, Declaration::Generates, Qualifier::Private, true),
                assigned: None,
                span: *span,
            },
            ast::Expression::Leaks { constants, span } => Expression {
                kind: ExpressionKind::Leaks,
                qualifier: None,
                constants: constants.iter().map(|c| self.constant(c)).collect(),
                assigned: None,
                span: *span,
            },
            ast::Expression::Assignment { left, right, span } => Expression {
                kind: ExpressionKind::Assignment,
                qualifier: None,
                constants: declared(left, Declaration::Assignment, Qualifier::Private, false),
                assigned: Some(self.value(right)?),
                span: *span,
            },
        })
    }

    fn value(&self, value: &ast::ValueExpr) -> ModelResult<Value> {
        Ok(match value {
            ast::ValueExpr::Constant(ident) => Value::Constant(self.constant(ident)),
            ast::ValueExpr::Primitive {
                name,
                arguments,
                check,
                ..
            } => {
                let id = PrimitiveId::from_name(&name.name).ok_or_else(|| {
                    ModelError::UnknownPrimitive {
                        name: name.name.clone(),
                        span: name.span,
                    }
                })?;
                let arguments = arguments
                    .iter()
                    .map(|a| self.value(a))
                    .collect::<ModelResult<Vec<_>>>()?;
                Value::primitive(Primitive::new(id, arguments, 0, *check))
            }
            ast::ValueExpr::Equation { values, .. } => Value::equation(
                values
                    .iter()
                    .map(|v| Value::Constant(self.constant(v)))
                    .collect(),
            ),
        })
    }

    fn message_ref(&self, m: &ast::MessageRef) -> ModelResult<Message> {
        Ok(Message {
            sender: self.principal(&m.sender)?,
            recipient: self.principal(&m.recipient)?,
            constants: m.constants.iter().map(|c| self.constant(c)).collect(),
            span: m.span,
        })
    }

    fn query(&self, query: &ast::Query) -> ModelResult<Query> {
        Ok(Query {
            kind: match query.kind {
                ast::QueryKind::Confidentiality => QueryKind::Confidentiality,
                ast::QueryKind::Authentication => QueryKind::Authentication,
                ast::QueryKind::Freshness => QueryKind::Freshness,
                ast::QueryKind::Unlinkability => QueryKind::Unlinkability,
                ast::QueryKind::Equivalence => QueryKind::Equivalence,
            },
            constants: query.constants.iter().map(|c| self.constant(c)).collect(),
            message: query.message.as_ref().map(|m| self.message_ref(m)).transpose()?,
            options: query
                .options
                .iter()
                .map(|o| {
                    Ok(QueryOption {
                        kind: QueryOptionKind::Precondition,
                        message: self.message_ref(&o.message)?,
                    })
                })
                .collect::<ModelResult<_>>()?,
            span: query.span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower_src(src: &str) -> ModelResult<Model> {
        lower(&verifpal_syntax::parse(src).expect("parse"), "test.vp")
    }

    #[test]
    fn test_principals_in_declaration_order() {
        let model = lower_src(
            "attacker[active]\nprincipal Bob[knows public x]\nprincipal Alice[]\nprincipal Bob[]\nAlice -> Bob: x\nqueries[confidentiality? x]",
        )
        .unwrap();
        assert_eq!(model.principals.len(), 3);
        assert_eq!(model.principal_id("Bob"), Some(PrincipalId(1)));
        assert_eq!(model.principal_id("Alice"), Some(PrincipalId(2)));
        assert_eq!(model.principal_name(PrincipalId::ATTACKER), "Attacker");
    }

    #[test]
    fn test_undeclared_principal() {
        let err = lower_src("attacker[active]\nprincipal A[knows public x]\nA -> B: x\nqueries[confidentiality? x]")
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownPrincipal { ref principal, .. } if principal == "B"));
    }

    #[test]
    fn test_values_are_interned() {
        let model = lower_src(
            "attacker[passive]\nprincipal A[knows private k\ngenerates m\nc = ENC(k, m)\ngx = G^k]\nqueries[confidentiality? m]",
        )
        .unwrap();
        let Block::Principal(block) = &model.blocks[0] else {
            panic!("expected principal block");
        };
        let generates = &block.expressions[1];
        assert!(generates.constants[0].fresh);
        let Some(Value::Primitive(enc)) = &block.expressions[2].assigned else {
            panic!("expected primitive");
        };
        assert_eq!(enc.id, PrimitiveId::Enc);
        assert_eq!(enc.arguments[1].as_constant().unwrap().id, generates.constants[0].id);
        let Some(Value::Equation(eq)) = &block.expressions[3].assigned else {
            panic!("expected equation");
        };
        assert!(eq.values[0].is_g());
    }
}
