//! Textual rendering of values, messages and queries.

use crate::ir::{Message, Query};
use crate::value::{Constant, Equation, Primitive, Value};
use std::fmt;

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = if self.is_g() { "G" } else { &self.name };
        if self.guard {
            write!(f, "[{name}]")
        } else {
            f.write_str(name)
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.id.name())?;
        for (i, a) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{a}")?;
        }
        f.write_str(")")?;
        if self.check {
            f.write_str("?")?;
        }
        Ok(())
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str("^")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(c) => c.fmt(f),
            Value::Primitive(p) => p.fmt(f),
            Value::Equation(e) => e.fmt(f),
        }
    }
}

/// `a, b, c`
pub fn pretty_constants(constants: &[Constant]) -> String {
    constants
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Alice -> Bob: a, [b]`
pub fn pretty_message(m: &Message) -> String {
    format!(
        "{} -> {}: {}",
        m.sender.name,
        m.recipient.name,
        pretty_constants(&m.constants)
    )
}

/// Single-line rendering of a query, options included.
pub fn pretty_query(query: &Query) -> String {
    let mut out = format!("{}? ", query.kind.as_str());
    match &query.message {
        Some(m) => out.push_str(&pretty_message(m)),
        None => out.push_str(&pretty_constants(&query.constants)),
    }
    if !query.options.is_empty() {
        out.push('[');
        for option in &query.options {
            out.push_str(&format!("precondition[{}]", pretty_message(&option.message)));
        }
        out.push(']');
    }
    out
}

/// One value per line with the constant it is bound to.
pub fn pretty_values(constants: &[Constant], values: &[Value]) -> String {
    constants
        .iter()
        .zip(values)
        .map(|(c, v)| format!("{} = {v}", c.name))
        .collect::<Vec<_>>()
        .join("\n")
}
