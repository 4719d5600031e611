use std::rc::Rc;
use std::sync::LazyLock;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::{number::Number, value::Value};

use super::error::EvalError;

type BuiltinFn = fn(&[Value]) -> Result<Value, EvalError>;
type BuiltinMethodFn = fn(&Value, &[Value]) -> Result<Option<Value>, EvalError>;

#[derive(Clone, Debug)]
pub enum ParamNum {
    None,
    Fixed(u8),
    Range(u8, u8),
}

impl ParamNum {
    pub fn to_num(&self) -> u8 {
        match self {
            ParamNum::None => 0,
            ParamNum::Fixed(n) => *n,
            ParamNum::Range(min, _) => *min,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self, num_args: u8) -> bool {
        match self {
            ParamNum::None => num_args == 0,
            ParamNum::Fixed(n) => num_args == *n,
            ParamNum::Range(min, max) => num_args >= *min && num_args <= *max,
        }
    }
}

/// A host-global function such as `Math.max` or `String`.
#[derive(Clone, Debug)]
pub struct BuiltinFunction {
    pub num_params: ParamNum,
    pub func: BuiltinFn,
}

impl BuiltinFunction {
    pub fn new(num_params: ParamNum, func: BuiltinFn) -> Self {
        BuiltinFunction { num_params, func }
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn math(args: &[Value], f: fn(f64) -> f64) -> Result<Value, EvalError> {
    Ok(Value::Number(Number::new(f(arg(args, 0).to_number().value()))))
}

pub static BUILTIN_FUNCTIONS: LazyLock<FxHashMap<SmolStr, BuiltinFunction>> =
    LazyLock::new(|| {
        let mut map = FxHashMap::default();

        map.insert(
            SmolStr::new("Math.min"),
            BuiltinFunction::new(ParamNum::Range(0, u8::MAX), |args| {
                Ok(Value::Number(Number::new(args.iter().fold(f64::INFINITY, |acc, v| {
                    let n = v.to_number().value();
                    if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) }
                }))))
            }),
        );
        map.insert(
            SmolStr::new("Math.max"),
            BuiltinFunction::new(ParamNum::Range(0, u8::MAX), |args| {
                Ok(Value::Number(Number::new(args.iter().fold(f64::NEG_INFINITY, |acc, v| {
                    let n = v.to_number().value();
                    if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) }
                }))))
            }),
        );
        map.insert(
            SmolStr::new("Math.floor"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| math(args, f64::floor)),
        );
        map.insert(
            SmolStr::new("Math.ceil"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| math(args, f64::ceil)),
        );
        map.insert(
            SmolStr::new("Math.round"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| math(args, |n| (n + 0.5).floor())),
        );
        map.insert(
            SmolStr::new("Math.abs"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| math(args, f64::abs)),
        );
        map.insert(
            SmolStr::new("String"),
            BuiltinFunction::new(ParamNum::Range(0, 1), |args| match args {
                [] => Ok(Value::from("")),
                [value, ..] => Ok(Value::from(value.to_string())),
            }),
        );
        map.insert(
            SmolStr::new("Number"),
            BuiltinFunction::new(ParamNum::Range(0, 1), |args| match args {
                [] => Ok(Value::from(0.0)),
                [value, ..] => Ok(Value::Number(value.to_number())),
            }),
        );
        map.insert(
            SmolStr::new("Boolean"),
            BuiltinFunction::new(ParamNum::Range(0, 1), |args| {
                Ok(Value::Bool(arg(args, 0).truthy()))
            }),
        );
        map.insert(
            SmolStr::new("JSON.stringify"),
            BuiltinFunction::new(ParamNum::Range(1, 3), |args| match &args[0] {
                Value::Undefined | Value::Function(_) => Ok(Value::Undefined),
                value => serde_json::to_string(&value.to_json())
                    .map(Value::from)
                    .map_err(|e| EvalError::InvalidJson(e.to_string())),
            }),
        );
        map.insert(
            SmolStr::new("JSON.parse"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| {
                serde_json::from_str::<serde_json::Value>(&args[0].to_string())
                    .map(Value::from)
                    .map_err(|e| EvalError::InvalidJson(e.to_string()))
            }),
        );
        map.insert(
            SmolStr::new("Array.isArray"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| Ok(Value::Bool(args[0].is_array()))),
        );
        map.insert(
            SmolStr::new("Object.keys"),
            BuiltinFunction::new(ParamNum::Fixed(1), |args| match &args[0] {
                Value::Object(entries) => Ok(Value::array(
                    entries.keys().cloned().map(Value::String).collect(),
                )),
                Value::Array(items) => Ok(Value::array(
                    (0..items.len()).map(|i| Value::from(i.to_string())).collect(),
                )),
                Value::Undefined | Value::Null => Err(EvalError::RuntimeError(
                    "Cannot convert undefined or null to object".to_string(),
                )),
                _ => Ok(Value::array(Vec::new())),
            }),
        );
        map.insert(
            SmolStr::new("console.log"),
            BuiltinFunction::new(ParamNum::Range(0, u8::MAX), |args| {
                tracing::info!(target: "weft::console", "{}", args.iter().join(" "));
                Ok(Value::Undefined)
            }),
        );

        map
    });

pub fn call_global(name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let function = BUILTIN_FUNCTIONS.get(name)?;
    let num_args = args.len().min(u8::MAX as usize) as u8;

    if !function.num_params.is_valid(num_args) {
        return Some(Err(EvalError::InvalidNumberOfArguments(
            SmolStr::new(name),
            function.num_params.to_num(),
            num_args,
        )));
    }

    Some((function.func)(args))
}

pub fn global_property(global: &str, name: &str) -> Option<Value> {
    match (global, name) {
        ("Math", "PI") => Some(Value::from(std::f64::consts::PI)),
        ("Math", "E") => Some(Value::from(std::f64::consts::E)),
        _ => None,
    }
}

fn nullish_error(value: &Value, name: &str) -> EvalError {
    EvalError::PropertyOfNullish {
        value: if matches!(value, Value::Null) {
            "null"
        } else {
            "undefined"
        },
        name: SmolStr::new(name),
    }
}

pub fn property(value: &Value, name: &str) -> Result<Value, EvalError> {
    match value {
        Value::Undefined | Value::Null => Err(nullish_error(value, name)),
        Value::Array(items) => match name {
            "length" => Ok(Value::from(items.len())),
            _ => Ok(name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default()),
        },
        Value::String(s) => match name {
            "length" => Ok(Value::from(s.chars().count())),
            _ => Ok(name
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::from(c.to_string()))
                .unwrap_or_default()),
        },
        Value::Object(entries) => Ok(entries.get(name).cloned().unwrap_or_default()),
        _ => Ok(Value::Undefined),
    }
}

fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if n.is_int() && n.value() >= 0.0 => Some(n.to_index()),
        _ => None,
    }
}

pub fn index(value: &Value, key: &Value) -> Result<Value, EvalError> {
    match (value, array_index(key)) {
        (Value::Array(items), Some(i)) => Ok(items.get(i).cloned().unwrap_or_default()),
        _ => property(value, &key.to_string()),
    }
}

/// Returns `container` with `key` replaced by `item`.
pub fn with_key(container: Value, key: &Value, item: Value) -> Result<Value, EvalError> {
    match container {
        Value::Undefined | Value::Null => Err(nullish_error(&container, &key.to_string())),
        Value::Object(entries) => {
            let mut entries = Rc::unwrap_or_clone(entries);
            entries.insert(SmolStr::new(key.to_string()), item);
            Ok(Value::Object(Rc::new(entries)))
        }
        Value::Array(items) => {
            let Some(i) = array_index(key).or_else(|| key.to_string().parse::<usize>().ok())
            else {
                return Ok(Value::Array(items));
            };
            let mut items = Rc::unwrap_or_clone(items);
            if i >= items.len() {
                items.resize(i + 1, Value::Undefined);
            }
            items[i] = item;
            Ok(Value::Array(Rc::new(items)))
        }
        other => Ok(other),
    }
}

fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    match value {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = value.to_number().value().trunc();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a.strict_eq(b),
    }
}

/// Methods that do not take callbacks. `Ok(None)` means the receiver has no
/// such method.
pub static BUILTIN_METHODS: LazyLock<FxHashMap<SmolStr, BuiltinMethodFn>> =
    LazyLock::new(|| {
        let mut map: FxHashMap<SmolStr, BuiltinMethodFn> = FxHashMap::default();

        map.insert(SmolStr::new("toString"), |receiver, _| {
            Ok(Some(Value::from(receiver.to_string())))
        });
        map.insert(SmolStr::new("join"), |receiver, args| match receiver {
            Value::Array(items) => {
                let sep = match args.first() {
                    None | Some(Value::Undefined) => ",".to_string(),
                    Some(sep) => sep.to_string(),
                };
                Ok(Some(Value::from(
                    items
                        .iter()
                        .map(|item| {
                            if item.is_nullish() {
                                String::new()
                            } else {
                                item.to_string()
                            }
                        })
                        .join(&sep),
                )))
            }
            _ => Ok(None),
        });
        map.insert(SmolStr::new("slice"), |receiver, args| match receiver {
            Value::Array(items) => {
                let start = relative_index(args.first(), items.len(), 0);
                let end = relative_index(args.get(1), items.len(), items.len());
                Ok(Some(Value::array(
                    items.get(start..end.max(start)).unwrap_or_default().to_vec(),
                )))
            }
            Value::String(s) => {
                let chars = s.chars().collect_vec();
                let start = relative_index(args.first(), chars.len(), 0);
                let end = relative_index(args.get(1), chars.len(), chars.len());
                Ok(Some(Value::from(
                    chars
                        .get(start..end.max(start))
                        .unwrap_or_default()
                        .iter()
                        .collect::<String>(),
                )))
            }
            _ => Ok(None),
        });
        map.insert(SmolStr::new("concat"), |receiver, args| match receiver {
            Value::Array(items) => {
                let mut items = items.as_ref().clone();
                for arg in args {
                    match arg {
                        Value::Array(more) => items.extend(more.iter().cloned()),
                        other => items.push(other.clone()),
                    }
                }
                Ok(Some(Value::array(items)))
            }
            Value::String(s) => Ok(Some(Value::from(format!(
                "{}{}",
                s,
                args.iter().join("")
            )))),
            _ => Ok(None),
        });
        map.insert(SmolStr::new("includes"), |receiver, args| {
            let needle = arg(args, 0);
            match receiver {
                Value::Array(items) => Ok(Some(Value::Bool(
                    items.iter().any(|item| same_value_zero(item, &needle)),
                ))),
                Value::String(s) => Ok(Some(Value::Bool(s.contains(needle.to_string().as_str())))),
                _ => Ok(None),
            }
        });
        map.insert(SmolStr::new("indexOf"), |receiver, args| {
            let needle = arg(args, 0);
            let position = match receiver {
                Value::Array(items) => items.iter().position(|item| item.strict_eq(&needle)),
                Value::String(s) => s
                    .find(needle.to_string().as_str())
                    .map(|byte| s[..byte].chars().count()),
                _ => return Ok(None),
            };
            Ok(Some(position.map(Value::from).unwrap_or(Value::from(-1.0))))
        });
        map.insert(SmolStr::new("reverse"), |receiver, _| match receiver {
            Value::Array(items) => Ok(Some(Value::array(items.iter().rev().cloned().collect()))),
            _ => Ok(None),
        });
        map.insert(SmolStr::new("toUpperCase"), |receiver, _| {
            Ok(receiver.as_str().map(|s| Value::from(s.to_uppercase())))
        });
        map.insert(SmolStr::new("toLowerCase"), |receiver, _| {
            Ok(receiver.as_str().map(|s| Value::from(s.to_lowercase())))
        });
        map.insert(SmolStr::new("trim"), |receiver, _| {
            Ok(receiver.as_str().map(|s| Value::from(s.trim())))
        });
        map.insert(SmolStr::new("startsWith"), |receiver, args| {
            Ok(receiver
                .as_str()
                .map(|s| Value::Bool(s.starts_with(arg(args, 0).to_string().as_str()))))
        });
        map.insert(SmolStr::new("endsWith"), |receiver, args| {
            Ok(receiver
                .as_str()
                .map(|s| Value::Bool(s.ends_with(arg(args, 0).to_string().as_str()))))
        });
        map.insert(SmolStr::new("split"), |receiver, args| {
            Ok(receiver.as_str().map(|s| match args.first() {
                None | Some(Value::Undefined) => Value::array(vec![Value::from(s)]),
                Some(sep) => {
                    let sep = sep.to_string();
                    if sep.is_empty() {
                        Value::array(s.chars().map(|c| Value::from(c.to_string())).collect())
                    } else {
                        Value::array(s.split(sep.as_str()).map(Value::from).collect())
                    }
                }
            }))
        });
        map.insert(SmolStr::new("replace"), |receiver, args| {
            Ok(receiver.as_str().map(|s| {
                Value::from(s.replacen(
                    arg(args, 0).to_string().as_str(),
                    arg(args, 1).to_string().as_str(),
                    1,
                ))
            }))
        });
        map.insert(SmolStr::new("toFixed"), |receiver, args| match receiver {
            Value::Number(n) => {
                let digits = arg(args, 0).to_number().to_index().min(100);
                Ok(Some(Value::from(format!("{:.*}", digits, n.value()))))
            }
            _ => Ok(None),
        });

        map
    });

pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let method = BUILTIN_METHODS.get(name)?;
    method(receiver, args).transpose()
}
