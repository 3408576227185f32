//! The configuration language: `[name]` blocks of `key=value` properties and
//! `^name=value` constants, checked against a binding and encoded per property.

pub mod ast;
pub mod binding;
pub mod check;
pub mod codegen;
pub mod parser;
