//! Compiler for a small RuneScript-style scripting language and its companion
//! configuration language.
//!
//! The pipeline lives under [`dsl`]; the top-level modules carry the thin
//! collaborators around it (settings, source loading, output paths).

pub mod dsl;
pub mod error;
pub mod paths;
pub mod project;
pub mod settings;
