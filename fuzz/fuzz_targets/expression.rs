#![no_main]

use arbitrary::Arbitrary;
use itertools::Itertools;
use libfuzzer_sys::fuzz_target;
use weft_lang::{
    Accessor, DepPath, EvalError, EvalOptions, Evaluator, Resolution, Resolver, ScopeIndex, Value,
};

const DECLARED: [&str; 4] = ["count", "name", "items", "data"];

#[derive(Debug, Clone, Arbitrary)]
enum Expr {
    Raw(String),
    Read(u8),
    Assign(u8, String),
    Increment(u8),
    Call(String, Vec<String>),
    Arrow(Vec<String>, String),
    Template(Vec<String>),
}

impl Expr {
    fn to_code(&self) -> String {
        let declared = |i: &u8| DECLARED[*i as usize % DECLARED.len()];
        match self {
            Expr::Raw(code) => code.clone(),
            Expr::Read(i) => declared(i).to_string(),
            Expr::Assign(i, value) => format!("{} = {}", declared(i), value),
            Expr::Increment(i) => format!("{}++", declared(i)),
            Expr::Call(callee, args) => format!("{}({})", callee, args.join(", ")),
            Expr::Arrow(params, body) => format!("({}) => {}", params.join(", "), body),
            Expr::Template(parts) => format!("`{}`", parts.iter().map(|p| format!("${{{p}}}")).join("")),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Context {
    raw: Option<String>,
    generated: Vec<Expr>,
}

struct Declared;

impl Resolver for Declared {
    fn resolve(&self, name: &str) -> Resolution {
        if DECLARED.contains(&name) {
            Resolution::Value(ScopeIndex(0))
        } else {
            Resolution::Unresolved
        }
    }

    fn alias_of(&self, _: ScopeIndex, _: &str) -> Option<ScopeIndex> {
        None
    }

    fn declares(&self, _: ScopeIndex, name: &str) -> bool {
        DECLARED.contains(&name)
    }
}

#[derive(Default)]
struct Store(Vec<(DepPath, Value)>);

impl Accessor for Store {
    fn get(&mut self, path: &DepPath) -> Result<Value, EvalError> {
        Ok(self
            .0
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    fn set(&mut self, path: &DepPath, value: Value) -> Result<(), EvalError> {
        self.0.retain(|(p, _)| p != path);
        self.0.push((path.clone(), value));
        Ok(())
    }
}

fuzz_target!(|context: Context| {
    let code = match &context.raw {
        Some(raw) => raw.clone(),
        None => context.generated.iter().map(Expr::to_code).join("; "),
    };

    let Ok(node) = weft_lang::parse(&code) else {
        return;
    };
    let Ok(translation) = weft_lang::translate(&node, &Declared) else {
        return;
    };

    let mut store = Store::default();
    let _ = Evaluator::new(&mut store)
        .with_options(EvalOptions {
            max_call_stack_depth: 32,
        })
        .eval(&translation.node);
});
