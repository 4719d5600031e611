pub mod builtin;
pub mod error;

use std::rc::Rc;

use smol_str::SmolStr;

use crate::ast::{BinaryOp, DepPath, Expr, Literal, Node, UnaryOp, UpdateOp, constants};
use crate::number::Number;
use crate::value::{Env, Function, Object, Value};
use error::EvalError;

/// Reads and writes declared values on behalf of the evaluator.
pub trait Accessor {
    fn get(&mut self, path: &DepPath) -> Result<Value, EvalError>;
    fn set(&mut self, path: &DepPath, value: Value) -> Result<(), EvalError>;
}

/// Accessor for expressions that reference no declared values.
pub struct NoAccessor;

impl Accessor for NoAccessor {
    fn get(&mut self, path: &DepPath) -> Result<Value, EvalError> {
        Err(EvalError::Unresolved(path.clone()))
    }

    fn set(&mut self, path: &DepPath, _: Value) -> Result<(), EvalError> {
        Err(EvalError::Unresolved(path.clone()))
    }
}

/// Configuration options for the evaluator.
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum depth of nested arrow function calls.
    pub max_call_stack_depth: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_call_stack_depth: 128,
        }
    }
}

type Update<'e, 'a> = &'e mut dyn FnMut(&mut Evaluator<'a>, Value) -> Result<Value, EvalError>;

pub struct Evaluator<'a> {
    accessor: &'a mut dyn Accessor,
    env: Env,
    call_stack_depth: u32,
    options: Options,
}

impl<'a> Evaluator<'a> {
    pub fn new(accessor: &'a mut dyn Accessor) -> Self {
        Self {
            accessor,
            env: Env::default(),
            call_stack_depth: 0,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Binds a local visible to the evaluated expression, e.g. `event`.
    pub fn define(&mut self, name: impl Into<SmolStr>, value: Value) {
        self.env.insert(name.into(), value);
    }

    fn is_global(&self, name: &str) -> bool {
        constants::HOST_GLOBALS.contains(&name) && !self.env.contains_key(name)
    }

    pub fn eval(&mut self, node: &Node) -> Result<Value, EvalError> {
        match &node.expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expr::Ident(name) => match self.env.get(name) {
                Some(value) => Ok(value.clone()),
                None if name == constants::EVENT => Ok(Value::Undefined),
                None => Err(EvalError::NotDefined(name.clone())),
            },
            Expr::Get(path) => self.accessor.get(path),
            Expr::Set(path, value) => {
                let value = self.eval(value)?;
                self.accessor.set(path, value.clone())?;
                Ok(value)
            }
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    let value = self.eval(part)?;
                    if !value.is_nullish() {
                        out.push_str(&value.to_string());
                    }
                }
                Ok(Value::from(out))
            }
            Expr::Member(object, name) => {
                if let Expr::Ident(global) = &object.expr
                    && self.is_global(global)
                {
                    return Ok(builtin::global_property(global, name).unwrap_or_default());
                }

                let value = self.eval(object)?;
                builtin::property(&value, name)
            }
            Expr::Index(object, index) => {
                let value = self.eval(object)?;
                let key = self.eval(index)?;
                builtin::index(&value, &key)
            }
            Expr::Call(callee, args) => self.eval_call(callee, args),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                match op {
                    BinaryOp::And if !lhs.truthy() => Ok(lhs),
                    BinaryOp::Or if lhs.truthy() => Ok(lhs),
                    BinaryOp::Coalesce if !lhs.is_nullish() => Ok(lhs),
                    BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => self.eval(rhs),
                    _ => {
                        let rhs = self.eval(rhs)?;
                        Ok(binary(*op, &lhs, &rhs))
                    }
                }
            }
            Expr::Conditional(cond, then, otherwise) => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign(op, target, value) => {
                let rhs = self.eval(value)?;
                self.assign_with(target, &mut |_, current| {
                    Ok(match op {
                        Some(op) => binary(*op, &current, &rhs),
                        None => rhs.clone(),
                    })
                })
            }
            Expr::Update { op, prefix, target } => {
                let delta = match op {
                    UpdateOp::Increment => Number::new(1.0),
                    UpdateOp::Decrement => Number::new(-1.0),
                };
                let updated = self.assign_with(target, &mut |_, current| {
                    Ok(Value::Number(current.to_number() + delta))
                })?;

                if *prefix {
                    Ok(updated)
                } else {
                    Ok(Value::Number(updated.to_number() - delta))
                }
            }
            Expr::Array(items) => Ok(Value::array(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Object(entries) => {
                let mut object = Object::new();
                for (key, value) in entries {
                    object.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(Rc::new(object)))
            }
            Expr::Arrow(params, body) => Ok(Value::Function(Rc::new(Function {
                params: params.clone(),
                body: Rc::clone(body),
                env: self.env.clone(),
            }))),
            Expr::Let(name, value) => {
                let value = self.eval(value)?;
                self.env.insert(name.clone(), value);
                Ok(Value::Undefined)
            }
            Expr::Sequence(nodes) => {
                let mut last = Value::Undefined;
                for node in nodes {
                    last = self.eval(node)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_args(&mut self, args: &[Rc<Node>]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Node) -> Result<Value, EvalError> {
        if op == UnaryOp::Typeof
            && let Expr::Ident(name) = &operand.expr
            && !self.env.contains_key(name)
        {
            return Ok(Value::from(if constants::HOST_GLOBALS.contains(&name.as_str()) {
                "object"
            } else {
                "undefined"
            }));
        }

        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::Typeof => Value::from(value.type_of()),
        })
    }

    fn eval_call(&mut self, callee: &Node, args: &[Rc<Node>]) -> Result<Value, EvalError> {
        match &callee.expr {
            Expr::Member(object, method) => {
                if let Expr::Ident(global) = &object.expr
                    && self.is_global(global)
                {
                    let name = format!("{}.{}", global, method);
                    let args = self.eval_args(args)?;
                    return builtin::call_global(&name, &args)
                        .unwrap_or_else(|| Err(EvalError::NotCallable(SmolStr::new(name))));
                }

                let receiver = self.eval(object)?;
                let args = self.eval_args(args)?;
                self.call_method(receiver, method, args)
            }
            Expr::Ident(name) if self.is_global(name) => {
                let args = self.eval_args(args)?;
                builtin::call_global(name, &args)
                    .unwrap_or_else(|| Err(EvalError::NotCallable(name.clone())))
            }
            _ => {
                let function = self.eval(callee)?;
                let args = self.eval_args(args)?;
                self.call_function(&function, args)
            }
        }
    }

    fn call_method(
        &mut self,
        receiver: Value,
        method: &SmolStr,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        if receiver.is_nullish() {
            return builtin::property(&receiver, method);
        }

        match &receiver {
            Value::Array(items)
                if matches!(
                    method.as_str(),
                    "map" | "filter" | "find" | "findIndex" | "some" | "every"
                ) =>
            {
                let callback = args.into_iter().next().unwrap_or_default();
                self.call_iter(Rc::clone(items), method, &callback)
            }
            Value::Object(entries) if entries.contains_key(method) => {
                let function = entries.get(method).cloned().unwrap_or_default();
                self.call_function(&function, args)
            }
            _ => builtin::call_method(&receiver, method, &args)
                .unwrap_or_else(|| Err(EvalError::NotCallable(method.clone()))),
        }
    }

    fn call_iter(
        &mut self,
        items: Rc<Vec<Value>>,
        method: &str,
        callback: &Value,
    ) -> Result<Value, EvalError> {
        let mut results = Vec::with_capacity(items.len());

        for (i, item) in items.iter().enumerate() {
            let result = self.call_function(callback, vec![item.clone(), Value::from(i)])?;

            match method {
                "map" => results.push(result),
                "filter" if result.truthy() => results.push(item.clone()),
                "find" if result.truthy() => return Ok(item.clone()),
                "findIndex" if result.truthy() => return Ok(Value::from(i)),
                "some" if result.truthy() => return Ok(Value::Bool(true)),
                "every" if !result.truthy() => return Ok(Value::Bool(false)),
                _ => {}
            }
        }

        Ok(match method {
            "map" | "filter" => Value::array(results),
            "find" => Value::Undefined,
            "findIndex" => Value::from(-1.0),
            "some" => Value::Bool(false),
            _ => Value::Bool(true),
        })
    }

    pub fn call_function(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        let Value::Function(function) = callee else {
            return Err(EvalError::NotCallable(SmolStr::new(callee.to_string())));
        };

        if self.call_stack_depth >= self.options.max_call_stack_depth {
            return Err(EvalError::RecursionError(self.options.max_call_stack_depth));
        }

        let mut env = function.env.clone();
        let mut args = args.into_iter();
        for param in &function.params {
            env.insert(param.clone(), args.next().unwrap_or_default());
        }

        let saved = std::mem::replace(&mut self.env, env);
        self.call_stack_depth += 1;
        let result = self.eval(&function.body);
        self.call_stack_depth -= 1;
        self.env = saved;

        result
    }

    /// Applies `update` to the current value of an assignment target and
    /// stores the result, rebuilding enclosing arrays and objects on the way
    /// up. Returns the stored value.
    fn assign_with(&mut self, target: &Node, update: Update<'_, 'a>) -> Result<Value, EvalError> {
        match &target.expr {
            Expr::Ident(name) => {
                let Some(current) = self.env.get(name).cloned() else {
                    return Err(EvalError::NotDefined(name.clone()));
                };
                let updated = update(self, current)?;
                self.env.insert(name.clone(), updated.clone());
                Ok(updated)
            }
            Expr::Get(path) => {
                let current = self.accessor.get(path)?;
                let updated = update(self, current)?;
                self.accessor.set(path, updated.clone())?;
                Ok(updated)
            }
            Expr::Member(object, name) => {
                self.assign_key(object, Value::String(name.clone()), update)
            }
            Expr::Index(object, index) => {
                let key = self.eval(index)?;
                self.assign_key(object, key, update)
            }
            _ => Err(EvalError::InvalidAssignment),
        }
    }

    fn assign_key(
        &mut self,
        object: &Node,
        key: Value,
        update: Update<'_, 'a>,
    ) -> Result<Value, EvalError> {
        let mut stored = Value::Undefined;

        self.assign_with(object, &mut |this: &mut Self, container: Value| {
            let current = builtin::index(&container, &key)?;
            let updated = update(this, current)?;
            stored = updated.clone();
            builtin::with_key(container, &key, updated)
        })?;

        Ok(stored)
    }
}

fn is_stringy(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
    )
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Value::Number(*a + *b),
            _ if is_stringy(lhs) || is_stringy(rhs) => Value::from(format!("{}{}", lhs, rhs)),
            _ => Value::Number(lhs.to_number() + rhs.to_number()),
        },
        BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        BinaryOp::Mod => Value::Number(lhs.to_number() % rhs.to_number()),
        BinaryOp::Eq => Value::Bool(lhs.loose_eq(rhs)),
        BinaryOp::Ne => Value::Bool(!lhs.loose_eq(rhs)),
        BinaryOp::StrictEq => Value::Bool(lhs.strict_eq(rhs)),
        BinaryOp::StrictNe => Value::Bool(!lhs.strict_eq(rhs)),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            let ordering = match (lhs, rhs) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => lhs.to_number().partial_cmp(&rhs.to_number()),
            };
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o.is_lt(),
                (BinaryOp::Lte, Some(o)) => o.is_le(),
                (BinaryOp::Gt, Some(o)) => o.is_gt(),
                (_, Some(o)) => o.is_ge(),
            })
        }
        // Short-circuit operators are handled before both sides are evaluated.
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{ScopeIndex, parser::Parser},
        lexer::{self, Lexer},
        translate::{Resolution, Resolver, translate},
    };
    use rstest::rstest;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct Store(FxHashMap<String, Value>);

    impl Accessor for Store {
        fn get(&mut self, path: &DepPath) -> Result<Value, EvalError> {
            self.0
                .get(&path.to_string())
                .cloned()
                .ok_or_else(|| EvalError::Unresolved(path.clone()))
        }

        fn set(&mut self, path: &DepPath, value: Value) -> Result<(), EvalError> {
            self.0.insert(path.to_string(), value);
            Ok(())
        }
    }

    struct Declared<'a>(&'a Store);

    impl Resolver for Declared<'_> {
        fn resolve(&self, name: &str) -> Resolution {
            if self.0.0.contains_key(&format!("0.{}", name)) {
                Resolution::Value(ScopeIndex(0))
            } else {
                Resolution::Unresolved
            }
        }

        fn alias_of(&self, _: ScopeIndex, _: &str) -> Option<ScopeIndex> {
            None
        }

        fn declares(&self, _: ScopeIndex, name: &str) -> bool {
            self.0.0.contains_key(&format!("0.{}", name))
        }
    }

    fn store(values: &[(&str, Value)]) -> Store {
        Store(
            values
                .iter()
                .map(|(name, value)| (format!("0.{}", name), value.clone()))
                .collect(),
        )
    }

    fn run(code: &str, store: &mut Store) -> Result<Value, EvalError> {
        let tokens = Lexer::new(lexer::Options::default())
            .tokenize(code)
            .unwrap();
        let node = Parser::new(&tokens).parse().unwrap();
        let node = translate(&node, &Declared(store)).unwrap().node;
        Evaluator::new(store).eval(&node)
    }

    fn items() -> Value {
        Value::from(serde_json::json!([
            {"name": "a", "done": true},
            {"name": "b", "done": false},
            {"name": "c", "done": true}
        ]))
    }

    #[rstest]
    #[case("1 + 2 * 3", Value::from(7.0))]
    #[case("'a' + 1", Value::from("a1"))]
    #[case("1 + '1'", Value::from("11"))]
    #[case("'3' * '4'", Value::from(12.0))]
    #[case("true + 1", Value::from(2.0))]
    #[case("null ?? 'x'", Value::from("x"))]
    #[case("0 ?? 'x'", Value::from(0.0))]
    #[case("0 || 'x'", Value::from("x"))]
    #[case("'' && undefined_thing", Value::from(""))]
    #[case("1 == '1'", Value::from(true))]
    #[case("1 === '1'", Value::from(false))]
    #[case("null == undefined", Value::from(true))]
    #[case("'b' > 'a'", Value::from(true))]
    #[case("2 < 'x'", Value::from(false))]
    #[case("typeof missing", Value::from("undefined"))]
    #[case("typeof 'x'", Value::from("string"))]
    #[case("typeof (x => x)", Value::from("function"))]
    #[case("!0", Value::from(true))]
    #[case("-'5'", Value::from(-5.0))]
    #[case("7 % 4", Value::from(3.0))]
    #[case("1 / 0", Value::from(f64::INFINITY))]
    #[case("[1, 2, 3].map(x => x * 2).join('-')", Value::from("2-4-6"))]
    #[case("[1, 2, 3].filter((x, i) => i > 0).length", Value::from(2.0))]
    #[case("[1, 2, 3].find(x => x > 1)", Value::from(2.0))]
    #[case("[1, 2, 3].findIndex(x => x > 5)", Value::from(-1.0))]
    #[case("[1, 2, 3].some(x => x > 2)", Value::from(true))]
    #[case("[1, 2, 3].every(x => x > 2)", Value::from(false))]
    #[case("({a: {b: 'deep'}}).a.b", Value::from("deep"))]
    #[case("[10, 20][1]", Value::from(20.0))]
    #[case("'abc'[1]", Value::from("b"))]
    #[case("let x = 1; x += 2; x", Value::from(3.0))]
    #[case("let x = 1; x++", Value::from(1.0))]
    #[case("let x = 1; ++x", Value::from(2.0))]
    #[case("let o = {a: 1}; o.a = 5; o.a", Value::from(5.0))]
    #[case("let a = [1, [2, 3]]; a[1][0] = 9; a[1]", Value::array(vec![9.0.into(), 3.0.into()]))]
    #[case("let add = (a, b) => a + b; add(2, 3)", Value::from(5.0))]
    #[case("let k = 2; let f = x => x * k; f(4)", Value::from(8.0))]
    #[case("Math.max(1, 5, 3)", Value::from(5.0))]
    #[case("Math.floor(Math.PI)", Value::from(3.0))]
    #[case("String(12) + Number('1')", Value::from("121"))]
    #[case("JSON.stringify({a: [1, 'x']})", Value::from("{\"a\":[1,\"x\"]}"))]
    #[case("'  Hi '.trim().toLowerCase()", Value::from("hi"))]
    #[case("event", Value::Undefined)]
    fn test_eval(#[case] code: &str, #[case] expected: Value) {
        assert_eq!(run(code, &mut Store::default()), Ok(expected));
    }

    #[rstest]
    #[case("missing + 1", EvalError::NotDefined("missing".into()))]
    #[case("null.x", EvalError::PropertyOfNullish { value: "null", name: "x".into() })]
    #[case("(1)(2)", EvalError::NotCallable("1".into()))]
    #[case("'a'.nope()", EvalError::NotCallable("nope".into()))]
    #[case("let f = x => x(x); f(f)", EvalError::RecursionError(128))]
    #[case("let f = x => f(x); f(1)", EvalError::NotDefined("f".into()))]
    fn test_eval_error(#[case] code: &str, #[case] expected: EvalError) {
        assert_eq!(run(code, &mut Store::default()), Err(expected));
    }

    #[test]
    fn test_eval_invalid_json() {
        assert!(matches!(
            run("JSON.parse('{')", &mut Store::default()),
            Err(EvalError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_eval_declared_values() {
        let mut store = store(&[("name", Value::from("John")), ("items", items())]);

        assert_eq!(
            run("'Hello ' + name", &mut store),
            Ok(Value::from("Hello John"))
        );
        assert_eq!(
            run("items.filter(x => x.done).map(x => x.name).join()", &mut store),
            Ok(Value::from("a,c"))
        );
    }

    #[test]
    fn test_eval_writes_through_accessor() {
        let mut store = store(&[("count", Value::from(1.0)), ("items", items())]);

        assert_eq!(run("count++", &mut store), Ok(Value::from(1.0)));
        assert_eq!(store.0["0.count"], Value::from(2.0));

        assert_eq!(run("count += 10", &mut store), Ok(Value::from(12.0)));
        assert_eq!(store.0["0.count"], Value::from(12.0));

        run("items[1].done = true", &mut store).unwrap();
        assert_eq!(
            run("items.every(x => x.done)", &mut store),
            Ok(Value::from(true))
        );
    }

    #[test]
    fn test_eval_template() {
        let node = Node::new(
            Default::default(),
            Expr::Template(
                [
                    Rc::new(Node::new(
                        Default::default(),
                        Expr::Literal(Literal::String("n=".into())),
                    )),
                    Rc::new(Node::new(Default::default(), Expr::Literal(Literal::Null))),
                    Rc::new(Node::new(
                        Default::default(),
                        Expr::Literal(Literal::Number(Number::new(2.0))),
                    )),
                ]
                .into_iter()
                .collect(),
            ),
        );

        assert_eq!(
            Evaluator::new(&mut NoAccessor).eval(&node),
            Ok(Value::from("n=2"))
        );
    }

    #[test]
    fn test_eval_with_defined_event() {
        let tokens = Lexer::new(lexer::Options::default())
            .tokenize("event.key")
            .unwrap();
        let node = Parser::new(&tokens).parse().unwrap();
        let mut accessor = NoAccessor;
        let mut evaluator = Evaluator::new(&mut accessor);
        evaluator.define("event", Value::object([("key".into(), "Enter".into())]));

        assert_eq!(evaluator.eval(&node), Ok(Value::from("Enter")));
    }
}
