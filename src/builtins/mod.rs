//! # Built-in Registration Surface
//!
//! Everything the interpreter exposes to user code beyond the language
//! itself is installed here, through exactly two value shapes:
//!
//! - **Callables** — [`crate::callable::NativeFunction`] values defined as
//!   top-level names (`clock`, `len`, `range`, ...).
//! - **Class-like namespaces** — [`crate::class::Class`] values with only
//!   static properties, grouping related natives (`Math.sqrt`, `JSON.parse`).
//!
//! Each category is a sub-module with its own `register` function writing
//! into the globals environment. Natives may look up other globals through
//! the interpreter they receive at call time, so registration order does not
//! matter as long as everything is installed before user code runs.

use crate::eval::Interpreter;

pub mod core;
pub mod json;
pub mod math;

/// Register all built-ins in the interpreter's globals environment.
pub fn register(interpreter: &Interpreter) {
    core::register(interpreter);
    math::register(interpreter);
    json::register(interpreter);
}
