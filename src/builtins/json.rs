//! The `JSON` namespace: parse and stringify between JSON text and values.
//!
//! JSON objects map onto dicts (insertion order preserved both ways),
//! arrays onto lists. Integers survive the round trip when they fit i64.

use crate::callable::NativeFunction;
use crate::class::Class;
use crate::error::NativeError;
use crate::eval::Interpreter;
use crate::value::{Key, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

pub fn register(interpreter: &Interpreter) {
    let mut statics = HashMap::new();
    statics.insert(
        "parse".to_string(),
        NativeFunction::value("parse", 1, native_parse),
    );
    statics.insert(
        "stringify".to_string(),
        NativeFunction::value("stringify", 1, native_stringify),
    );
    interpreter.define_global("JSON", Value::Class(Class::namespace("JSON", statics)));
}

fn native_parse(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    let text = match &args[0] {
        Value::Str(s) => &s.text,
        other => {
            return Err(format!("JSON.parse: expected a string, got {}.", other.type_name()).into())
        }
    };
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| NativeError(format!("JSON.parse: {e}.")))?;
    Ok(from_json(parsed))
}

fn native_stringify(_: &mut Interpreter, args: &[Value]) -> Result<Value, NativeError> {
    let json = to_json(&args[0], &mut Vec::new())?;
    let text =
        serde_json::to_string(&json).map_err(|e| NativeError(format!("JSON.stringify: {e}.")))?;
    Ok(Value::from_text(text))
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::from_text(s),
        serde_json::Value::Array(items) => {
            Value::list(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut dict = IndexMap::new();
            for (key, value) in entries {
                dict.insert(Key::Str(key), from_json(value));
            }
            Value::dict(dict)
        }
    }
}

fn to_json(value: &Value, seen: &mut Vec<usize>) -> Result<serde_json::Value, NativeError> {
    match value {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Int(i) => Ok(serde_json::Value::Number((*i).into())),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| "JSON.stringify: cannot serialize a non-finite number.".into()),
        Value::Str(s) => Ok(serde_json::Value::String(s.text.clone())),
        Value::List(items) => {
            let ptr = Rc::as_ptr(items) as usize;
            guard_cycle(seen, ptr)?;
            let result = items
                .borrow()
                .iter()
                .map(|item| to_json(item, seen))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array);
            seen.pop();
            result
        }
        Value::Stack(items) => {
            let ptr = Rc::as_ptr(items) as usize;
            guard_cycle(seen, ptr)?;
            let result = items
                .borrow()
                .iter()
                .map(|item| to_json(item, seen))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array);
            seen.pop();
            result
        }
        Value::Queue(items) => {
            let ptr = Rc::as_ptr(items) as usize;
            guard_cycle(seen, ptr)?;
            let result = items
                .borrow()
                .iter()
                .map(|item| to_json(item, seen))
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array);
            seen.pop();
            result
        }
        Value::Buffer(bytes) => Ok(serde_json::Value::Array(
            bytes
                .borrow()
                .iter()
                .map(|b| serde_json::Value::Number((*b as i64).into()))
                .collect(),
        )),
        Value::Set(members) => Ok(serde_json::Value::Array(
            members
                .borrow()
                .iter()
                .map(|k| to_json(&k.to_value(), &mut Vec::new()))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Dict(entries) => {
            let ptr = Rc::as_ptr(entries) as usize;
            guard_cycle(seen, ptr)?;
            let mut object = serde_json::Map::new();
            let mut failure = None;
            for (key, item) in entries.borrow().iter() {
                let name = match key {
                    Key::Str(s) => s.clone(),
                    other => other.to_value().display(),
                };
                match to_json(item, seen) {
                    Ok(json) => {
                        object.insert(name, json);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            seen.pop();
            match failure {
                Some(e) => Err(e),
                None => Ok(serde_json::Value::Object(object)),
            }
        }
        other => Err(format!(
            "JSON.stringify: cannot serialize a {} value.",
            other.type_name()
        )
        .into()),
    }
}

fn guard_cycle(seen: &mut Vec<usize>, ptr: usize) -> Result<(), NativeError> {
    if seen.contains(&ptr) {
        return Err("JSON.stringify: cannot serialize a cyclic value.".into());
    }
    seen.push(ptr);
    Ok(())
}
