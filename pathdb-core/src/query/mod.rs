//! Path-pattern queries: parsing, planning and matching.

pub mod ast;
pub mod cache;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;

pub use ast::{Direction, GraphQuery, Literal, Property, Relop};
pub use executor::{Binding, MatchIterator};
pub use parser::Parser;
pub use planner::{Constraint, DeductionStep, QueryPlan};
