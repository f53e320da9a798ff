//! Free-function built-ins: clock, type, len, conversions, constructors,
//! ranges, and scope introspection.

use crate::callable::NativeFunction;
use crate::error::NativeError;
use crate::eval::Interpreter;
use crate::value::{Key, Value};
use indexmap::IndexSet;
use std::collections::VecDeque;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Register the free-function built-ins in the globals environment.
pub fn register(interpreter: &Interpreter) {
    interpreter.define_global("clock", NativeFunction::value("clock", 0, native_clock));
    interpreter.define_global("type", NativeFunction::value("type", 1, native_type));
    interpreter.define_global("len", NativeFunction::value("len", 1, native_len));
    interpreter.define_global("str", NativeFunction::value("str", 1, native_str));
    interpreter.define_global("num", NativeFunction::value("num", 1, native_num));
    interpreter.define_global("chr", NativeFunction::value("chr", 1, native_chr));
    interpreter.define_global("ord", NativeFunction::value("ord", 1, native_ord));
    interpreter.define_global("list", NativeFunction::value("list", -1, native_list));
    interpreter.define_global("buffer", NativeFunction::value("buffer", -1, native_buffer));
    interpreter.define_global("set", NativeFunction::value("set", -1, native_set));
    interpreter.define_global("queue", NativeFunction::value("queue", -1, native_queue));
    interpreter.define_global("stack", NativeFunction::value("stack", -1, native_stack));
    interpreter.define_global("range", NativeFunction::value("range", -1, native_range));
    interpreter.define_global("globals", NativeFunction::value("globals", 0, native_globals));
    interpreter.define_global("locals", NativeFunction::value("locals", 0, native_locals));

    if interpreter.unsafe_mode() {
        interpreter.define_global("input", NativeFunction::value("input", -1, native_input));
    }
}

fn native_clock(_: &mut Interpreter, _: &[Value]) -> Result<Value, NativeError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Value::Float(now.as_secs_f64()))
}

fn native_type(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::from_text(args[0].type_name()))
}

fn native_len(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    let length = match &args[0] {
        Value::Str(s) => s.text.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Buffer(bytes) => bytes.borrow().len(),
        Value::Dict(entries) => entries.borrow().len(),
        Value::Set(members) => members.borrow().len(),
        Value::Queue(items) => items.borrow().len(),
        Value::Stack(items) => items.borrow().len(),
        other => {
            return Err(format!("len: object of type {} has no length.", other.type_name()).into())
        }
    };
    Ok(Value::Int(length as i64))
}

fn native_str(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::from_text(args[0].display()))
}

fn native_num(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    match &args[0] {
        Value::Int(_) | Value::Float(_) => Ok(args[0].clone()),
        Value::Str(s) => {
            let text = s.text.trim();
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| format!("num: cannot convert '{}' to a number.", s.text).into())
        }
        other => Err(format!("num: cannot convert {} to a number.", other.type_name()).into()),
    }
}

fn native_chr(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    match &args[0] {
        Value::Int(code) if *code >= 0 => u32::try_from(*code)
            .ok()
            .and_then(char::from_u32)
            .map(Value::single_char)
            .ok_or_else(|| "chr: invalid character code.".into()),
        _ => Err("chr: invalid character code.".into()),
    }
}

fn native_ord(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    match &args[0] {
        Value::Str(s) => {
            let mut chars = s.text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(Value::Int(ch as u32 as i64)),
                _ => Err("ord: expected a single-character string.".into()),
            }
        }
        other => Err(format!("ord: expected a string, got {}.", other.type_name()).into()),
    }
}

fn native_list(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::list(args.to_vec()))
}

fn native_buffer(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    let mut bytes = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Int(i) if (0..=255).contains(i) => bytes.push(*i as u8),
            _ => return Err("Buffer elements must be integers between 0 and 255.".into()),
        }
    }
    Ok(Value::buffer(bytes))
}

fn native_set(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    let mut members = IndexSet::new();
    for arg in args {
        let key = Key::from_value(arg).ok_or_else(|| {
            NativeError(format!(
                "Only strings, numbers, booleans, and nil can be used as keys, got {}.",
                arg.type_name()
            ))
        })?;
        members.insert(key);
    }
    Ok(Value::set(members))
}

fn native_queue(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::queue(args.iter().cloned().collect::<VecDeque<_>>()))
}

fn native_stack(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::stack(args.to_vec()))
}

/// `range(stop)`, `range(start, stop)`, `range(start, stop, step)`.
fn native_range(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    fn int_arg(value: &Value) -> Result<i64, NativeError> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(format!("range: expected an integer, got {}.", other.type_name()).into()),
        }
    }

    let (start, stop, step) = match args.len() {
        1 => (0, int_arg(&args[0])?, 1),
        2 => (int_arg(&args[0])?, int_arg(&args[1])?, 1),
        3 => (int_arg(&args[0])?, int_arg(&args[1])?, int_arg(&args[2])?),
        n => return Err(format!("Expected 1 to 3 arguments but got {n}.").into()),
    };
    if step == 0 {
        return Err("range: step must not be zero.".into());
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        current += step;
    }
    Ok(Value::list(items))
}

fn native_globals(interpreter: &mut Interpreter, _: &[Value]) -> Result<Value, NativeError> {
    let names = interpreter
        .global_scope_names()
        .into_iter()
        .map(Value::from_text)
        .collect();
    Ok(Value::list(names))
}

fn native_locals(interpreter: &mut Interpreter, _: &[Value]) -> Result<Value, NativeError> {
    let names = interpreter
        .local_scope_names()
        .into_iter()
        .map(Value::from_text)
        .collect();
    Ok(Value::list(names))
}

/// Only registered in unsafe mode.
fn native_input(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    if args.len() > 1 {
        return Err(format!("Expected 0 or 1 arguments but got {}.", args.len()).into());
    }
    if let Some(Value::Str(prompt)) = args.first() {
        print!("{}", prompt.text);
        let _ = std::io::stdout().flush();
    }
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| NativeError(format!("input: {e}")))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Value::from_text(line))
}
