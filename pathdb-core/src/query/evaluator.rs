//! Predicate evaluation against stored records.
//!
//! Literals arrive untyped from the parser and are converted to the type of
//! the field they are compared with. Text fields compare against the
//! literal's source text, numbers included. A missing field never matches;
//! a literal that cannot take the field's type is an error.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::query::ast::{Literal, Property, Relop};
use crate::record::{Edge, Node, Value};

/// A field read off a record.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    Value(&'a Value),
    /// Synthetic text fields such as `id`.
    Text(&'a str),
}

pub trait Record {
    fn field(&self, name: &str) -> Option<Field<'_>>;
}

impl Record for Node {
    fn field(&self, name: &str) -> Option<Field<'_>> {
        match name {
            "id" => Some(Field::Text(&self.id)),
            _ => self.properties.get(name).map(Field::Value),
        }
    }
}

impl Record for Edge {
    fn field(&self, name: &str) -> Option<Field<'_>> {
        match name {
            "id" => Some(Field::Text(&self.id)),
            "from" => Some(Field::Text(&self.from)),
            "to" => Some(Field::Text(&self.to)),
            _ => self.properties.get(name).map(Field::Value),
        }
    }
}

pub fn matches<R: Record + ?Sized>(record: &R, property: &Property) -> Result<bool> {
    let Some(field) = record.field(&property.name) else {
        return Ok(false);
    };
    let ordering = compare(field, property)?;
    Ok(match (ordering, property.relop) {
        (Some(Ordering::Less), Relop::Less)
        | (Some(Ordering::Equal), Relop::Equal)
        | (Some(Ordering::Greater), Relop::Greater) => true,
        _ => false,
    })
}

pub fn matches_all<R: Record + ?Sized>(record: &R, properties: &[Property]) -> Result<bool> {
    for property in properties {
        if !matches(record, property)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Orders the field relative to the literal. `None` means unordered (NaN).
fn compare(field: Field<'_>, property: &Property) -> Result<Option<Ordering>> {
    let ordering = match field {
        Field::Text(text) => Some(text.cmp(property.literal.text())),
        Field::Value(value) => match value {
            Value::String(s) => Some(s.as_str().cmp(property.literal.text())),
            Value::Bool(b) => Some(b.cmp(&as_bool(property)?)),
            Value::Int32(v) => Some(v.cmp(&as_number::<i32>(property, value)?)),
            Value::Int64(v) => Some(v.cmp(&as_number::<i64>(property, value)?)),
            Value::UInt32(v) => Some(v.cmp(&as_number::<u32>(property, value)?)),
            Value::UInt64(v) => Some(v.cmp(&as_number::<u64>(property, value)?)),
            Value::Float(v) => v.partial_cmp(&as_number::<f32>(property, value)?),
            Value::Double(v) => v.partial_cmp(&as_number::<f64>(property, value)?),
        },
    };
    Ok(ordering)
}

fn type_error(property: &Property, expected: &'static str) -> Error {
    Error::PredicateType {
        field: property.name.clone(),
        literal: property.literal.to_string(),
        expected,
    }
}

fn as_bool(property: &Property) -> Result<bool> {
    match &property.literal {
        Literal::String(s) if s == "true" => Ok(true),
        Literal::String(s) if s == "false" => Ok(false),
        Literal::Number(n) => match n.trim_start_matches('+') {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(type_error(property, "bool")),
        },
        Literal::String(_) => Err(type_error(property, "bool")),
    }
}

fn as_number<T: FromStr>(property: &Property, field: &Value) -> Result<T> {
    match &property.literal {
        Literal::Number(n) => n.parse().map_err(|_| type_error(property, field.type_name())),
        Literal::String(_) => Err(type_error(property, field.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str, relop: Relop, literal: Literal) -> Property {
        Property {
            name: name.into(),
            relop,
            literal,
        }
    }

    fn num(n: &str) -> Literal {
        Literal::Number(n.into())
    }

    fn text(s: &str) -> Literal {
        Literal::String(s.into())
    }

    #[test]
    fn compares_in_the_field_type() {
        let node = Node::new("A")
            .with_property("len", 3)
            .with_property("big", u64::MAX)
            .with_property("imp", 0.25f64)
            .with_property("name", "alpha");

        assert!(matches(&node, &prop("len", Relop::Equal, num("3"))).unwrap());
        assert!(matches(&node, &prop("len", Relop::Greater, num("-2"))).unwrap());
        assert!(!matches(&node, &prop("len", Relop::Less, num("+3"))).unwrap());
        assert!(matches(&node, &prop("big", Relop::Equal, num("18446744073709551615"))).unwrap());
        assert!(matches(&node, &prop("imp", Relop::Less, num(".5"))).unwrap());
        assert!(matches(&node, &prop("name", Relop::Less, text("beta"))).unwrap());
        assert!(matches(&node, &prop("id", Relop::Equal, text("A"))).unwrap());
    }

    #[test]
    fn missing_field_never_matches() {
        let node = Node::new("A");
        assert!(!matches(&node, &prop("len", Relop::Equal, num("3"))).unwrap());
        assert!(!matches(&node, &prop("from", Relop::Equal, text("A"))).unwrap());
    }

    #[test]
    fn edges_expose_their_endpoints() {
        let edge = Edge::new("E", "A", "B").with_property("w", 1.5f32);
        let props = [
            prop("from", Relop::Equal, text("A")),
            prop("to", Relop::Equal, text("B")),
            prop("w", Relop::Greater, num("1")),
        ];
        assert!(matches_all(&edge, &props).unwrap());
        assert!(!matches_all(&edge, &[prop("to", Relop::Equal, text("A"))]).unwrap());
    }

    #[test]
    fn bool_fields_take_numbers_or_words() {
        let node = Node::new("A").with_property("ok", true);
        assert!(matches(&node, &prop("ok", Relop::Equal, num("1"))).unwrap());
        assert!(matches(&node, &prop("ok", Relop::Equal, text("true"))).unwrap());
        assert!(matches(&node, &prop("ok", Relop::Greater, text("false"))).unwrap());
        assert!(matches(&node, &prop("ok", Relop::Equal, num("2"))).is_err());
        assert!(matches(&node, &prop("ok", Relop::Equal, text("yes"))).is_err());
    }

    #[test]
    fn unconvertible_literals_are_type_errors() {
        let node = Node::new("A")
            .with_property("len", 3u32)
            .with_property("name", "alpha");

        let err = matches(&node, &prop("len", Relop::Equal, text("3"))).unwrap_err();
        assert!(matches!(
            err,
            Error::PredicateType { ref field, expected: "uint32", .. } if field == "len"
        ));
        assert!(matches(&node, &prop("len", Relop::Equal, num("-1"))).is_err());
        assert!(matches(&node, &prop("len", Relop::Equal, num("1.5"))).is_err());
    }

    #[test]
    fn number_literals_compare_as_text_against_text_fields() {
        let node = Node::new("1").with_property("code", "007");
        assert!(matches(&node, &prop("id", Relop::Equal, num("1"))).unwrap());
        assert!(!matches(&node, &prop("id", Relop::Equal, num("2"))).unwrap());
        assert!(matches(&node, &prop("code", Relop::Equal, num("007"))).unwrap());
        // Source text is kept, so `7` is not `007`.
        assert!(!matches(&node, &prop("code", Relop::Equal, num("7"))).unwrap());

        let edge = Edge::new("10", "1", "2");
        assert!(matches(&edge, &prop("to", Relop::Equal, num("2"))).unwrap());
        assert!(matches(&edge, &prop("id", Relop::Greater, num("1"))).unwrap());
    }

    #[test]
    fn nan_compares_false() {
        let node = Node::new("A").with_property("x", f64::NAN);
        for relop in [Relop::Less, Relop::Equal, Relop::Greater] {
            assert!(!matches(&node, &prop("x", relop, num("0"))).unwrap());
        }
    }

    #[test]
    fn conjunction_stops_at_first_mismatch() {
        let node = Node::new("A").with_property("len", 3);
        // The second predicate would fail to convert, but is never reached.
        let props = [
            prop("len", Relop::Equal, num("4")),
            prop("len", Relop::Equal, text("x")),
        ];
        assert!(!matches_all(&node, &props).unwrap());
    }
}
