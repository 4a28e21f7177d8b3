//! Pretty printer for the model AST.
//!
//! The printed form is canonical: parsing it back and printing again yields
//! the same text.

use crate::ast::*;

/// Pretty print a model to a string.
pub fn pretty_print(model: &Model) -> String {
    let mut printer = PrettyPrinter::new();
    printer.print_model(model);
    printer.output
}

/// Render a model as sequence-diagram source: one note per principal block,
/// one arrow per message and one note per phase marker.
pub fn pretty_diagram(model: &Model) -> String {
    let mut printer = PrettyPrinter::new();
    let first_principal = model.blocks.iter().find_map(|b| match b {
        Block::Principal(p) => Some(p.name.name.as_str()),
        _ => None,
    });
    for block in &model.blocks {
        match block {
            Block::Principal(p) => {
                printer.write("Note over ");
                printer.write(&p.name.name);
                printer.write(":");
                for expr in &p.expressions {
                    printer.write(" ");
                    printer.print_expression(expr);
                    printer.write("\\n");
                }
                printer.newline();
            }
            Block::Message(m) => {
                printer.write(&m.sender.name);
                printer.write("->");
                printer.write(&m.recipient.name);
                printer.write(": ");
                printer.print_message_constants(&m.constants);
                printer.newline();
            }
            Block::Phase(phase) => {
                printer.write("Note left of ");
                printer.write(first_principal.unwrap_or_default());
                printer.writeln(&format!(": phase[{}]", phase.number));
            }
        }
    }
    printer.output
}

/// Pretty print a single value expression.
pub fn pretty_value(value: &ValueExpr) -> String {
    let mut printer = PrettyPrinter::new();
    printer.print_value(value);
    printer.output
}

/// Pretty print a single query, options included.
pub fn pretty_query(query: &Query) -> String {
    let mut printer = PrettyPrinter::new();
    printer.print_query(query);
    printer.output
}

struct PrettyPrinter {
    output: String,
    indent: usize,
}

impl PrettyPrinter {
    fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn writeln(&mut self, s: &str) {
        self.output.push_str(s);
        self.output.push('\n');
    }

    fn newline(&mut self) {
        self.output.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.output.push('\t');
        }
    }

    fn print_model(&mut self, model: &Model) {
        self.writeln(&format!("attacker[{}]", model.attacker.as_str()));
        self.newline();

        for block in &model.blocks {
            self.print_block(block);
            self.newline();
        }

        self.writeln("queries[");
        self.indent += 1;
        for query in &model.queries {
            self.write_indent();
            self.print_query(query);
            self.newline();
        }
        self.indent -= 1;
        self.writeln("]");
    }

    fn print_block(&mut self, block: &Block) {
        match block {
            Block::Principal(p) => {
                self.writeln(&format!("principal {}[", p.name.name));
                self.indent += 1;
                for expr in &p.expressions {
                    self.write_indent();
                    self.print_expression(expr);
                    self.newline();
                }
                self.indent -= 1;
                self.writeln("]");
            }
            Block::Message(m) => {
                self.write(&format!("{} -> {}: ", m.sender.name, m.recipient.name));
                self.print_message_constants(&m.constants);
                self.newline();
            }
            Block::Phase(phase) => {
                self.writeln(&format!("phase[{}]", phase.number));
            }
        }
    }

    fn print_message_constants(&mut self, constants: &[GuardedIdent]) {
        for (i, c) in constants.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if c.guard {
                self.write(&format!("[{}]", c.ident.name));
            } else {
                self.write(&c.ident.name);
            }
        }
    }

    fn print_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Knows {
                qualifier,
                constants,
                ..
            } => {
                self.write(&format!("knows {} ", qualifier.as_str()));
                self.print_ident_list(constants);
            }
            Expression::Generates { constants, .. } => {
                self.write("generates ");
                self.print_ident_list(constants);
            }
            Expression::Leaks { constants, .. } => {
                self.write("leaks ");
                self.print_ident_list(constants);
            }
            Expression::Assignment { left, right, .. } => {
                for (i, ident) in left.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if ident.name.starts_with("unnamed") {
                        self.write("_");
                    } else {
                        self.write(&ident.name);
                    }
                }
                self.write(" = ");
                self.print_value(right);
            }
        }
    }

    fn print_ident_list(&mut self, idents: &[Ident]) {
        let names: Vec<&str> = idents.iter().map(|i| i.name.as_str()).collect();
        self.write(&names.join(", "));
    }

    fn print_value(&mut self, value: &ValueExpr) {
        match value {
            ValueExpr::Constant(ident) => self.print_constant_name(&ident.name),
            ValueExpr::Primitive {
                name,
                arguments,
                check,
                ..
            } => {
                self.write(&name.name);
                self.write("(");
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.print_value(arg);
                }
                self.write(")");
                if *check {
                    self.write("?");
                }
            }
            ValueExpr::Equation { values, .. } => {
                for (i, ident) in values.iter().enumerate() {
                    if i > 0 {
                        self.write("^");
                    }
                    self.print_constant_name(&ident.name);
                }
            }
        }
    }

    fn print_constant_name(&mut self, name: &str) {
        if name == "g" {
            self.write("G");
        } else {
            self.write(name);
        }
    }

    fn print_message_ref(&mut self, message: &MessageRef) {
        self.write(&format!(
            "{} -> {}: ",
            message.sender.name, message.recipient.name
        ));
        self.print_ident_list(&message.constants);
    }

    fn print_query(&mut self, query: &Query) {
        self.write(query.kind.as_str());
        self.write("? ");
        match &query.message {
            Some(message) => self.print_message_ref(message),
            None => self.print_ident_list(&query.constants),
        }
        if query.options.is_empty() {
            return;
        }
        self.writeln("[");
        self.indent += 1;
        for option in &query.options {
            self.write_indent();
            self.write("precondition[");
            self.print_message_ref(&option.message);
            self.writeln("]");
        }
        self.indent -= 1;
        self.write_indent();
        self.write("]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const MODEL: &str = "attacker[active]

principal Alice[
\tknows private k
\tgenerates m, n
\tga = G^m
\t_ = ASSERT(k, k)?
\te = ENC(k, HASH(m, ga))
]

Alice -> Bob: [ga], e

phase[1]

queries[
\tconfidentiality? m
\tauthentication? Alice -> Bob: e[
\t\tprecondition[Alice -> Bob: e]
\t]
\tunlinkability? m, n
]
";

    #[test]
    fn test_pretty_print_is_canonical() {
        let model = parse(MODEL).unwrap();
        assert_eq!(pretty_print(&model), MODEL);
    }

    #[test]
    fn test_pretty_print_roundtrip() {
        let source = "attacker [ passive ] principal a [ knows public X generates Y ] a → b : y queries [ freshness? y ]";
        let first = pretty_print(&parse(source).unwrap());
        let second = pretty_print(&parse(&first).unwrap());
        assert_eq!(first, second);
        assert!(first.contains("principal A["));
        assert!(first.contains("A -> B: y"));
    }

    #[test]
    fn test_pretty_diagram() {
        let model = parse(MODEL).unwrap();
        let diagram = pretty_diagram(&model);
        let lines: Vec<&str> = diagram.lines().collect();
        assert!(lines[0].starts_with("Note over Alice: knows private k\\n"));
        assert_eq!(lines[1], "Alice->Bob: [ga], e");
        assert_eq!(lines[2], "Note left of Alice: phase[1]");
    }

    #[test]
    fn test_pretty_value_generator() {
        let model = parse(MODEL).unwrap();
        let Block::Principal(p) = &model.blocks[0] else {
            panic!("expected principal block");
        };
        let Expression::Assignment { right, .. } = &p.expressions[2] else {
            panic!("expected assignment");
        };
        assert_eq!(pretty_value(right), "G^m");
    }
}
