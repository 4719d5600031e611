pub const NULL: &str = "null";
pub const TRUE: &str = "true";
pub const FALSE: &str = "false";
pub const UNDEFINED: &str = "undefined";

pub const MATH: &str = "Math";
pub const JSON: &str = "JSON";
pub const STRING: &str = "String";
pub const NUMBER: &str = "Number";
pub const BOOLEAN: &str = "Boolean";
pub const ARRAY: &str = "Array";
pub const OBJECT: &str = "Object";
pub const CONSOLE: &str = "console";
pub const EVENT: &str = "event";

pub const HOST_GLOBALS: [&str; 9] = [
    MATH, JSON, STRING, NUMBER, BOOLEAN, ARRAY, OBJECT, CONSOLE, EVENT,
];

/// Identifiers with this prefix belong to the engine and are never rewritten.
pub const PRIVATE_PREFIX: &str = "__";

pub fn is_reserved(name: &str) -> bool {
    name.starts_with(PRIVATE_PREFIX)
        || matches!(name, NULL | TRUE | FALSE | UNDEFINED)
        || HOST_GLOBALS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Math", true)]
    #[case("event", true)]
    #[case("__t0", true)]
    #[case("_private", false)]
    #[case("count", false)]
    #[case("data", false)]
    fn test_is_reserved(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_reserved(name), expected);
    }
}
