// ABOUTME: Bound built-in methods exposed through property access on aggregates

use crate::callable::NativeFunction;
use crate::error::NativeError;
use crate::value::{eq_value, Key, Value, VeldStr};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::rc::Rc;

/// Looks up a built-in method on a list, buffer, dict, set, queue, stack, or
/// string receiver. Returns a native already bound to the receiver.
pub fn lookup(receiver: &Value, name: &str) -> Option<Value> {
    match receiver {
        Value::List(items) => list_method(items, name),
        Value::Buffer(bytes) => buffer_method(bytes, name),
        Value::Dict(entries) => dict_method(entries, name),
        Value::Set(members) => set_method(members, name),
        Value::Queue(items) => queue_method(items, name),
        Value::Stack(items) => stack_method(items, name),
        Value::Str(s) => string_method(s, name),
        _ => None,
    }
}

/// Ordering used by `sort`: numbers with each other, strings with each other.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => Some(x.text.cmp(&y.text)),
        _ => None,
    }
}

/// Resolves a possibly-negative index against `len`, Python style, for the
/// methods that allow counting from the end.
fn adjusted_index(index: i64, len: usize) -> usize {
    if index < 0 {
        let from_end = len as i64 + index;
        from_end.max(0) as usize
    } else {
        (index as usize).min(len)
    }
}

fn expect_int(value: &Value, what: &str) -> Result<i64, NativeError> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(format!("{what} must be an integer, got {}.", other.type_name()).into()),
    }
}

fn byte_value(value: &Value) -> Result<u8, NativeError> {
    match value {
        Value::Int(i) if (0..=255).contains(i) => Ok(*i as u8),
        _ => Err("Buffer elements must be integers between 0 and 255.".into()),
    }
}

fn list_method(items: &Rc<RefCell<Vec<Value>>>, name: &str) -> Option<Value> {
    let items = Rc::clone(items);
    let method = match name {
        "append" => NativeFunction::value("append", 1, move |_, args| {
            items.borrow_mut().push(args[0].clone());
            Ok(Value::Nil)
        }),
        "clear" => NativeFunction::value("clear", 0, move |_, _| {
            items.borrow_mut().clear();
            Ok(Value::Nil)
        }),
        "contains" => NativeFunction::value("contains", 1, move |_, args| {
            let found = items.borrow().iter().any(|item| eq_value(item, &args[0]));
            Ok(Value::Bool(found))
        }),
        "copy" => NativeFunction::value("copy", 0, move |_, _| {
            Ok(Value::list(items.borrow().clone()))
        }),
        "extend" => NativeFunction::value("extend", 1, move |_, args| {
            let other: Vec<Value> = match &args[0] {
                Value::List(other) => other.borrow().clone(),
                other => {
                    return Err(
                        format!("Can only extend a list with a list, got {}.", other.type_name())
                            .into(),
                    )
                }
            };
            items.borrow_mut().extend(other);
            Ok(Value::Nil)
        }),
        "index" => NativeFunction::value("index", 1, move |_, args| {
            let position = items
                .borrow()
                .iter()
                .position(|item| eq_value(item, &args[0]));
            Ok(Value::Int(position.map(|p| p as i64).unwrap_or(-1)))
        }),
        "insert" => NativeFunction::value("insert", 2, move |_, args| {
            let index = expect_int(&args[0], "Insert index")?;
            let mut borrowed = items.borrow_mut();
            let at = adjusted_index(index, borrowed.len());
            borrowed.insert(at, args[1].clone());
            Ok(Value::Nil)
        }),
        "pop" => NativeFunction::value("pop", -1, move |_, args| {
            if args.len() > 1 {
                return Err(format!("Expected 0 or 1 arguments but got {}.", args.len()).into());
            }
            let mut borrowed = items.borrow_mut();
            match args.first() {
                None => borrowed
                    .pop()
                    .ok_or_else(|| "Cannot pop from an empty list.".into()),
                Some(index) => {
                    let index = expect_int(index, "Pop index")?;
                    if index < 0 || index as usize >= borrowed.len() {
                        return Err("List index out of range.".into());
                    }
                    Ok(borrowed.remove(index as usize))
                }
            }
        }),
        "remove" => NativeFunction::value("remove", 1, move |_, args| {
            let position = items
                .borrow()
                .iter()
                .position(|item| eq_value(item, &args[0]));
            match position {
                Some(index) => {
                    items.borrow_mut().remove(index);
                    Ok(Value::Bool(true))
                }
                None => Ok(Value::Bool(false)),
            }
        }),
        "reverse" => NativeFunction::value("reverse", 0, move |_, _| {
            items.borrow_mut().reverse();
            Ok(Value::Nil)
        }),
        "sort" => NativeFunction::value("sort", 0, move |_, _| {
            let mut sorted = items.borrow().clone();
            for pair in sorted.windows(2) {
                if compare(&pair[0], &pair[1]).is_none() {
                    return Err("Cannot sort a list of mixed element types.".into());
                }
            }
            sorted.sort_by(|a, b| compare(a, b).unwrap_or(Ordering::Equal));
            *items.borrow_mut() = sorted;
            Ok(Value::Nil)
        }),
        "join" => NativeFunction::value("join", 1, move |_, args| {
            let separator = match &args[0] {
                Value::Str(s) => s.text.clone(),
                other => {
                    return Err(
                        format!("Join separator must be a string, got {}.", other.type_name())
                            .into(),
                    )
                }
            };
            let parts: Vec<String> = items.borrow().iter().map(|v| v.display()).collect();
            Ok(Value::from_text(parts.join(&separator)))
        }),
        "with" => NativeFunction::value("with", 2, move |_, args| {
            let index = expect_int(&args[0], "Index")?;
            let borrowed = items.borrow();
            let len = borrowed.len();
            let at = if index < 0 { len as i64 + index } else { index };
            if at < 0 || at as usize >= len {
                return Err("List index out of range.".into());
            }
            let mut copy = borrowed.clone();
            copy[at as usize] = args[1].clone();
            Ok(Value::list(copy))
        }),
        _ => return None,
    };
    Some(method)
}

fn buffer_method(bytes: &Rc<RefCell<Vec<u8>>>, name: &str) -> Option<Value> {
    let bytes = Rc::clone(bytes);
    let method = match name {
        "append" => NativeFunction::value("append", 1, move |_, args| {
            let byte = byte_value(&args[0])?;
            bytes.borrow_mut().push(byte);
            Ok(Value::Nil)
        }),
        "clear" => NativeFunction::value("clear", 0, move |_, _| {
            bytes.borrow_mut().clear();
            Ok(Value::Nil)
        }),
        "contains" => NativeFunction::value("contains", 1, move |_, args| {
            let byte = byte_value(&args[0])?;
            Ok(Value::Bool(bytes.borrow().contains(&byte)))
        }),
        "index" => NativeFunction::value("index", 1, move |_, args| {
            let byte = byte_value(&args[0])?;
            let position = bytes.borrow().iter().position(|b| *b == byte);
            Ok(Value::Int(position.map(|p| p as i64).unwrap_or(-1)))
        }),
        "pop" => NativeFunction::value("pop", 0, move |_, _| {
            bytes
                .borrow_mut()
                .pop()
                .map(|b| Value::Int(b as i64))
                .ok_or_else(|| "Cannot pop from an empty buffer.".into())
        }),
        "toList" => NativeFunction::value("toList", 0, move |_, _| {
            let list = bytes.borrow().iter().map(|b| Value::Int(*b as i64)).collect();
            Ok(Value::list(list))
        }),
        _ => return None,
    };
    Some(method)
}

fn dict_method(entries: &Rc<RefCell<IndexMap<Key, Value>>>, name: &str) -> Option<Value> {
    let entries = Rc::clone(entries);
    let method = match name {
        "get" => NativeFunction::value("get", -1, move |_, args| {
            if args.is_empty() || args.len() > 2 {
                return Err(format!("Expected 1 or 2 arguments but got {}.", args.len()).into());
            }
            let key = dict_key(&args[0])?;
            let fallback = args.get(1).cloned().unwrap_or(Value::Nil);
            Ok(entries.borrow().get(&key).cloned().unwrap_or(fallback))
        }),
        "keys" => NativeFunction::value("keys", 0, move |_, _| {
            let keys = entries.borrow().keys().map(Key::to_value).collect();
            Ok(Value::list(keys))
        }),
        "values" => NativeFunction::value("values", 0, move |_, _| {
            let values = entries.borrow().values().cloned().collect();
            Ok(Value::list(values))
        }),
        "items" => NativeFunction::value("items", 0, move |_, _| {
            let items = entries
                .borrow()
                .iter()
                .map(|(k, v)| Value::list(vec![k.to_value(), v.clone()]))
                .collect();
            Ok(Value::list(items))
        }),
        "clear" => NativeFunction::value("clear", 0, move |_, _| {
            entries.borrow_mut().clear();
            Ok(Value::Nil)
        }),
        "removeKey" => NativeFunction::value("removeKey", 1, move |_, args| {
            let key = dict_key(&args[0])?;
            Ok(Value::Bool(entries.borrow_mut().shift_remove(&key).is_some()))
        }),
        "copy" => NativeFunction::value("copy", 0, move |_, _| {
            Ok(Value::dict(entries.borrow().clone()))
        }),
        _ => return None,
    };
    Some(method)
}

fn set_method(members: &Rc<RefCell<IndexSet<Key>>>, name: &str) -> Option<Value> {
    let members = Rc::clone(members);
    let method = match name {
        "add" => NativeFunction::value("add", 1, move |_, args| {
            let key = dict_key(&args[0])?;
            members.borrow_mut().insert(key);
            Ok(Value::Nil)
        }),
        "clear" => NativeFunction::value("clear", 0, move |_, _| {
            members.borrow_mut().clear();
            Ok(Value::Nil)
        }),
        "contains" => NativeFunction::value("contains", 1, move |_, args| {
            let key = dict_key(&args[0])?;
            Ok(Value::Bool(members.borrow().contains(&key)))
        }),
        "remove" => NativeFunction::value("remove", 1, move |_, args| {
            let key = dict_key(&args[0])?;
            Ok(Value::Bool(members.borrow_mut().shift_remove(&key)))
        }),
        "union" => NativeFunction::value("union", 1, move |_, args| {
            let other = expect_set(&args[0])?;
            let mut result = members.borrow().clone();
            for key in other.borrow().iter() {
                result.insert(key.clone());
            }
            Ok(Value::set(result))
        }),
        "intersect" => NativeFunction::value("intersect", 1, move |_, args| {
            let other = expect_set(&args[0])?;
            let other = other.borrow();
            let result = members
                .borrow()
                .iter()
                .filter(|key| other.contains(*key))
                .cloned()
                .collect();
            Ok(Value::set(result))
        }),
        "toList" => NativeFunction::value("toList", 0, move |_, _| {
            let list = members.borrow().iter().map(Key::to_value).collect();
            Ok(Value::list(list))
        }),
        _ => return None,
    };
    Some(method)
}

fn queue_method(items: &Rc<RefCell<VecDeque<Value>>>, name: &str) -> Option<Value> {
    let items = Rc::clone(items);
    let method = match name {
        "enqueue" => NativeFunction::value("enqueue", 1, move |_, args| {
            items.borrow_mut().push_back(args[0].clone());
            Ok(Value::Nil)
        }),
        "dequeue" => NativeFunction::value("dequeue", 0, move |_, _| {
            items
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| "Cannot dequeue from an empty queue.".into())
        }),
        "peek" => NativeFunction::value("peek", 0, move |_, _| {
            Ok(items.borrow().front().cloned().unwrap_or(Value::Nil))
        }),
        "clear" => NativeFunction::value("clear", 0, move |_, _| {
            items.borrow_mut().clear();
            Ok(Value::Nil)
        }),
        "toList" => NativeFunction::value("toList", 0, move |_, _| {
            Ok(Value::list(items.borrow().iter().cloned().collect()))
        }),
        _ => return None,
    };
    Some(method)
}

fn stack_method(items: &Rc<RefCell<Vec<Value>>>, name: &str) -> Option<Value> {
    let items = Rc::clone(items);
    let method = match name {
        "push" => NativeFunction::value("push", 1, move |_, args| {
            items.borrow_mut().push(args[0].clone());
            Ok(Value::Nil)
        }),
        "pop" => NativeFunction::value("pop", 0, move |_, _| {
            items
                .borrow_mut()
                .pop()
                .ok_or_else(|| "Cannot pop from an empty stack.".into())
        }),
        "peek" => NativeFunction::value("peek", 0, move |_, _| {
            Ok(items.borrow().last().cloned().unwrap_or(Value::Nil))
        }),
        "clear" => NativeFunction::value("clear", 0, move |_, _| {
            items.borrow_mut().clear();
            Ok(Value::Nil)
        }),
        "toList" => NativeFunction::value("toList", 0, move |_, _| {
            Ok(Value::list(items.borrow().clone()))
        }),
        _ => return None,
    };
    Some(method)
}

fn string_method(s: &Rc<VeldStr>, name: &str) -> Option<Value> {
    let s = Rc::clone(s);
    let method = match name {
        "upper" => NativeFunction::value("upper", 0, move |_, _| {
            Ok(Value::str_with_quote(s.text.to_uppercase(), s.quote))
        }),
        "lower" => NativeFunction::value("lower", 0, move |_, _| {
            Ok(Value::str_with_quote(s.text.to_lowercase(), s.quote))
        }),
        "strip" => NativeFunction::value("strip", 0, move |_, _| {
            Ok(Value::str_with_quote(s.text.trim().to_string(), s.quote))
        }),
        "split" => NativeFunction::value("split", 1, move |_, args| {
            let separator = expect_str(&args[0], "Separator")?;
            if separator.is_empty() {
                return Err("Separator must not be empty.".into());
            }
            let parts = s
                .text
                .split(&separator)
                .map(Value::from_text)
                .collect();
            Ok(Value::list(parts))
        }),
        "replace" => NativeFunction::value("replace", 2, move |_, args| {
            let from = expect_str(&args[0], "Pattern")?;
            let to = expect_str(&args[1], "Replacement")?;
            if from.is_empty() {
                return Err("Pattern must not be empty.".into());
            }
            Ok(Value::from_text(s.text.replace(&from, &to)))
        }),
        "find" => NativeFunction::value("find", 1, move |_, args| {
            let needle = expect_str(&args[0], "Search text")?;
            match s.text.find(&needle) {
                // Convert the byte offset into a code-point index
                Some(byte) => Ok(Value::Int(s.text[..byte].chars().count() as i64)),
                None => Ok(Value::Int(-1)),
            }
        }),
        "startsWith" => NativeFunction::value("startsWith", 1, move |_, args| {
            let prefix = expect_str(&args[0], "Prefix")?;
            Ok(Value::Bool(s.text.starts_with(&prefix)))
        }),
        "endsWith" => NativeFunction::value("endsWith", 1, move |_, args| {
            let suffix = expect_str(&args[0], "Suffix")?;
            Ok(Value::Bool(s.text.ends_with(&suffix)))
        }),
        "toNum" => NativeFunction::value("toNum", 0, move |_, _| {
            let text = s.text.trim();
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            match text.parse::<f64>() {
                Ok(f) => Ok(Value::Float(f)),
                Err(_) => Ok(Value::Nil),
            }
        }),
        "chars" => NativeFunction::value("chars", 0, move |_, _| {
            let chars = s.text.chars().map(Value::single_char).collect();
            Ok(Value::list(chars))
        }),
        _ => return None,
    };
    Some(method)
}

fn dict_key(value: &Value) -> Result<Key, NativeError> {
    Key::from_value(value).ok_or_else(|| {
        format!(
            "Only strings, numbers, booleans, and nil can be used as keys, got {}.",
            value.type_name()
        )
        .into()
    })
}

fn expect_set(value: &Value) -> Result<Rc<RefCell<IndexSet<Key>>>, NativeError> {
    match value {
        Value::Set(members) => Ok(Rc::clone(members)),
        other => Err(format!("Expected a set, got {}.", other.type_name()).into()),
    }
}

fn expect_str(value: &Value, what: &str) -> Result<String, NativeError> {
    match value {
        Value::Str(s) => Ok(s.text.clone()),
        other => Err(format!("{what} must be a string, got {}.", other.type_name()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_misses_on_scalars() {
        assert!(lookup(&Value::Int(1), "append").is_none());
        assert!(lookup(&Value::Nil, "get").is_none());
    }

    #[test]
    fn test_lookup_finds_list_methods() {
        let xs = Value::list(vec![]);
        assert!(lookup(&xs, "append").is_some());
        assert!(lookup(&xs, "sort").is_some());
        assert!(lookup(&xs, "nope").is_none());
    }

    #[test]
    fn test_adjusted_index() {
        assert_eq!(adjusted_index(0, 3), 0);
        assert_eq!(adjusted_index(5, 3), 3);
        assert_eq!(adjusted_index(-1, 3), 2);
        assert_eq!(adjusted_index(-9, 3), 0);
    }

    #[test]
    fn test_compare_rejects_mixed() {
        assert!(compare(&Value::Int(1), &Value::from_text("a")).is_none());
        assert_eq!(
            compare(&Value::Int(1), &Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare(&Value::from_text("a"), &Value::from_text("b")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_byte_value_range() {
        assert!(byte_value(&Value::Int(0)).is_ok());
        assert!(byte_value(&Value::Int(255)).is_ok());
        assert!(byte_value(&Value::Int(256)).is_err());
        assert!(byte_value(&Value::Int(-1)).is_err());
        assert!(byte_value(&Value::Float(1.0)).is_err());
    }
}
