//! Indented text rendering of a tree, for logs.

use std::fmt::{Display, Write};

use super::visitor::Visitor;
use super::{Part, Type};

const INDENT: &str = "  ";

/// Renders either the schema or the current values of a tree
#[derive(Debug)]
pub struct PrettyPrinter {
    out: String,
    indent: usize,
    with_data: bool,
}

impl PrettyPrinter {
    /// Prints names and types
    pub fn schema() -> Self {
        Self {
            out: String::new(),
            indent: 0,
            with_data: false,
        }
    }

    /// Prints names and values
    pub fn data() -> Self {
        Self {
            with_data: true,
            ..Self::schema()
        }
    }

    pub fn print(mut self, part: &Part) -> String {
        part.visit(&mut self);
        self.out
    }

    fn start_line(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn leaf(&mut self, name: &str, t: Type, value: impl Display) {
        self.start_line();
        // Writing to a String can not fail
        let _ = if self.with_data {
            write!(self.out, "{name}:\t{value}")
        } else {
            write!(self.out, "{name}:\t{t}")
        };
    }
}

impl Visitor for PrettyPrinter {
    fn visit_record(&mut self, name: &str, fields: &[Part]) {
        self.start_line();
        let _ = writeln!(self.out, "{name}: record[{}]{{", fields.len());

        self.indent += 1;
        for field in fields {
            field.visit(self);
            self.out.push('\n');
        }
        self.indent -= 1;

        self.start_line();
        self.out.push_str("}\n");
    }

    fn visit_string(&mut self, name: &str, value: &str) {
        self.start_line();
        let _ = if self.with_data {
            write!(self.out, "{name}:\t{value}")
        } else {
            write!(self.out, "{name}: string")
        };
    }

    fn visit_float(&mut self, name: &str, value: f32) {
        self.leaf(name, Type::Float, value);
    }
    fn visit_double(&mut self, name: &str, value: f64) {
        self.leaf(name, Type::Double, value);
    }

    fn visit_uint8(&mut self, name: &str, value: u8) {
        self.leaf(name, Type::Uint8, value);
    }
    fn visit_uint16(&mut self, name: &str, value: u16) {
        self.leaf(name, Type::Uint16, value);
    }
    fn visit_uint32(&mut self, name: &str, value: u32) {
        self.leaf(name, Type::Uint32, value);
    }
    fn visit_uint64(&mut self, name: &str, value: u64) {
        self.leaf(name, Type::Uint64, value);
    }

    fn visit_int8(&mut self, name: &str, value: i8) {
        self.leaf(name, Type::Int8, value);
    }
    fn visit_int16(&mut self, name: &str, value: i16) {
        self.leaf(name, Type::Int16, value);
    }
    fn visit_int32(&mut self, name: &str, value: i32) {
        self.leaf(name, Type::Int32, value);
    }
    fn visit_int64(&mut self, name: &str, value: i64) {
        self.leaf(name, Type::Int64, value);
    }
}
