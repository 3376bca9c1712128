//! Walking a [`Part`] tree without matching on it.

use super::Part;

/// Receives every node of a tree, one method per type.
///
/// Records are not descended into automatically. An implementation that
/// wants the children calls [`visit_fields`] from `visit_record`.
pub trait Visitor {
    fn visit_record(&mut self, name: &str, fields: &[Part]);
    fn visit_string(&mut self, name: &str, value: &str);

    fn visit_float(&mut self, name: &str, value: f32);
    fn visit_double(&mut self, name: &str, value: f64);

    fn visit_uint8(&mut self, name: &str, value: u8);
    fn visit_uint16(&mut self, name: &str, value: u16);
    fn visit_uint32(&mut self, name: &str, value: u32);
    fn visit_uint64(&mut self, name: &str, value: u64);

    fn visit_int8(&mut self, name: &str, value: i8);
    fn visit_int16(&mut self, name: &str, value: i16);
    fn visit_int32(&mut self, name: &str, value: i32);
    fn visit_int64(&mut self, name: &str, value: i64);
}

/// Visits each of `fields` in order
pub fn visit_fields(visitor: &mut dyn Visitor, fields: &[Part]) {
    for field in fields {
        field.visit(visitor);
    }
}

/// A coarser visitor that sees every number at its widest type.
///
/// Wrap one in [`Upcast`] to use it wherever a [`Visitor`] is wanted.
pub trait UpcastNumbersVisitor {
    /// Called before the fields of a record are visited
    fn enter_record(&mut self, name: &str, field_count: usize);

    /// Called after the last field of a record
    fn leave_record(&mut self, _name: &str) {}

    fn visit_string(&mut self, name: &str, value: &str);
    fn visit_any_float(&mut self, name: &str, value: f64);
    fn visit_any_int(&mut self, name: &str, value: i64);
    fn visit_any_uint(&mut self, name: &str, value: u64);
}

/// Adapts an [`UpcastNumbersVisitor`] into a full [`Visitor`]
#[derive(Debug)]
pub struct Upcast<V>(pub V);

impl<V> Upcast<V> {
    pub fn into_inner(self) -> V {
        self.0
    }
}

impl<V: UpcastNumbersVisitor> Visitor for Upcast<V> {
    fn visit_record(&mut self, name: &str, fields: &[Part]) {
        self.0.enter_record(name, fields.len());
        visit_fields(self, fields);
        self.0.leave_record(name);
    }

    fn visit_string(&mut self, name: &str, value: &str) {
        self.0.visit_string(name, value);
    }

    fn visit_float(&mut self, name: &str, value: f32) {
        self.0.visit_any_float(name, value as f64);
    }
    fn visit_double(&mut self, name: &str, value: f64) {
        self.0.visit_any_float(name, value);
    }

    fn visit_uint8(&mut self, name: &str, value: u8) {
        self.0.visit_any_uint(name, value as u64);
    }
    fn visit_uint16(&mut self, name: &str, value: u16) {
        self.0.visit_any_uint(name, value as u64);
    }
    fn visit_uint32(&mut self, name: &str, value: u32) {
        self.0.visit_any_uint(name, value as u64);
    }
    fn visit_uint64(&mut self, name: &str, value: u64) {
        self.0.visit_any_uint(name, value);
    }

    fn visit_int8(&mut self, name: &str, value: i8) {
        self.0.visit_any_int(name, value as i64);
    }
    fn visit_int16(&mut self, name: &str, value: i16) {
        self.0.visit_any_int(name, value as i64);
    }
    fn visit_int32(&mut self, name: &str, value: i32) {
        self.0.visit_any_int(name, value as i64);
    }
    fn visit_int64(&mut self, name: &str, value: i64) {
        self.0.visit_any_int(name, value);
    }
}

/// A leaf value after upcasting
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    String(String),
    Float(f64),
    Int(i64),
    Uint(u64),
}

impl std::fmt::Display for FlatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlatValue::String(v) => write!(f, "{v:?}"),
            FlatValue::Float(v) => write!(f, "{v}"),
            FlatValue::Int(v) => write!(f, "{v}"),
            FlatValue::Uint(v) => write!(f, "{v}"),
        }
    }
}

/// Collects leaves under dotted paths, e.g. `motor.rpm`
#[derive(Debug, Default)]
struct Flattener {
    path: Vec<String>,
    values: Vec<(String, FlatValue)>,
}

impl Flattener {
    fn push(&mut self, name: &str, value: FlatValue) {
        let mut key = self.path.join(".");
        if !key.is_empty() {
            key.push('.');
        }
        key.push_str(name);
        self.values.push((key, value));
    }
}

impl UpcastNumbersVisitor for Flattener {
    fn enter_record(&mut self, name: &str, _field_count: usize) {
        self.path.push(name.to_string());
    }

    fn leave_record(&mut self, _name: &str) {
        self.path.pop();
    }

    fn visit_string(&mut self, name: &str, value: &str) {
        self.push(name, FlatValue::String(value.to_string()));
    }

    fn visit_any_float(&mut self, name: &str, value: f64) {
        self.push(name, FlatValue::Float(value));
    }

    fn visit_any_int(&mut self, name: &str, value: i64) {
        self.push(name, FlatValue::Int(value));
    }

    fn visit_any_uint(&mut self, name: &str, value: u64) {
        self.push(name, FlatValue::Uint(value));
    }
}

/// Lists every leaf of `part` with its dotted path, in wire order
pub fn flatten(part: &Part) -> Vec<(String, FlatValue)> {
    let mut visitor = Upcast(Flattener::default());
    part.visit(&mut visitor);
    visitor.into_inner().values
}
