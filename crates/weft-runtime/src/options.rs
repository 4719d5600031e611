use serde::Deserialize;

/// Runtime settings, usually read from a `weft.toml` `[runtime]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// Nesting limit for `get`/`set` cascades. A handler that keeps
    /// reassigning the value it watches stops here.
    pub max_depth: u32,
    /// Reject links that would close a loop in the observer graph.
    pub detect_cycles: bool,
    /// Forwarded to the expression evaluator.
    pub max_call_stack_depth: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: 256,
            detect_cycles: true,
            max_call_stack_depth: 128,
        }
    }
}

impl Options {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub(crate) fn eval_options(&self) -> weft_lang::EvalOptions {
        weft_lang::EvalOptions {
            max_call_stack_depth: self.max_call_stack_depth,
        }
    }
}
