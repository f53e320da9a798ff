//! The `Math` namespace: a class-like global with static constants and
//! static native methods.

use crate::callable::NativeFunction;
use crate::class::Class;
use crate::error::NativeError;
use crate::eval::Interpreter;
use crate::value::Value;
use std::collections::HashMap;

pub fn register(interpreter: &Interpreter) {
    let mut statics = HashMap::new();
    statics.insert("pi".to_string(), Value::Float(std::f64::consts::PI));
    statics.insert("e".to_string(), Value::Float(std::f64::consts::E));
    statics.insert("abs".to_string(), NativeFunction::value("abs", 1, native_abs));
    statics.insert(
        "floor".to_string(),
        NativeFunction::value("floor", 1, native_floor),
    );
    statics.insert(
        "ceil".to_string(),
        NativeFunction::value("ceil", 1, native_ceil),
    );
    statics.insert(
        "sqrt".to_string(),
        NativeFunction::value("sqrt", 1, native_sqrt),
    );
    statics.insert("pow".to_string(), NativeFunction::value("pow", 2, native_pow));
    statics.insert("min".to_string(), NativeFunction::value("min", -1, native_min));
    statics.insert("max".to_string(), NativeFunction::value("max", -1, native_max));
    statics.insert(
        "random".to_string(),
        NativeFunction::value("random", 0, native_random),
    );

    interpreter.define_global("Math", Value::Class(Class::namespace("Math", statics)));
}

fn number(function: &str, value: &Value) -> Result<f64, NativeError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(format!(
            "Math.{function}: expected a number, got {}.",
            other.type_name()
        )
        .into()),
    }
}

fn native_abs(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(format!("Math.abs: expected a number, got {}.", other.type_name()).into()),
    }
}

fn native_floor(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Float(f.floor())),
        other => Err(format!("Math.floor: expected a number, got {}.", other.type_name()).into()),
    }
}

fn native_ceil(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Float(f.ceil())),
        other => Err(format!("Math.ceil: expected a number, got {}.", other.type_name()).into()),
    }
}

fn native_sqrt(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::Float(number("sqrt", &args[0])?.sqrt()))
}

fn native_pow(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    let base = number("pow", &args[0])?;
    let exponent = number("pow", &args[1])?;
    Ok(Value::Float(base.powf(exponent)))
}

fn native_min(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    extremum("min", args, |a, b| a < b)
}

fn native_max(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    extremum("max", args, |a, b| a > b)
}

/// Returns the original argument, so int inputs stay ints.
fn extremum(
    function: &str,
    args: &[Value],
    wins: fn(f64, f64) -> bool,
) -> Result<Value, NativeError> {
    if args.is_empty() {
        return Err(format!("Math.{function}: expected at least 1 argument.").into());
    }
    let mut best = args[0].clone();
    let mut best_num = number(function, &best)?;
    for arg in &args[1..] {
        let candidate = number(function, arg)?;
        if wins(candidate, best_num) {
            best = arg.clone();
            best_num = candidate;
        }
    }
    Ok(best)
}

fn native_random(_: &mut Interpreter, _: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::Float(rand::random::<f64>()))
}
