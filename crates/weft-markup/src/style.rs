//! Helpers for the `class` and `style` attribute formats.
use itertools::Itertools;
use smol_str::SmolStr;

pub fn parse_classes(value: &str) -> impl Iterator<Item = &str> {
    value.split_ascii_whitespace()
}

pub fn format_classes<'a>(classes: impl Iterator<Item = &'a str>) -> String {
    classes.unique().join(" ")
}

/// Splits `a: b; c: d` into ordered declarations. Later duplicates win.
pub fn parse_style(value: &str) -> Vec<(SmolStr, String)> {
    let mut declarations: Vec<(SmolStr, String)> = Vec::new();

    for (name, value) in value
        .split(';')
        .filter_map(|d| d.split_once(':'))
        .map(|(n, v)| (n.trim(), v.trim()))
        .filter(|(n, _)| !n.is_empty())
    {
        match declarations.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => declarations.push((SmolStr::new(name), value.to_string())),
        }
    }

    declarations
}

pub fn format_style(declarations: &[(SmolStr, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", vec![])]
    #[case("color: red", vec![("color", "red")])]
    #[case(" color : red ;; margin:0; ", vec![("color", "red"), ("margin", "0")])]
    #[case("color: red; color: blue", vec![("color", "blue")])]
    #[case("background: url(a:b)", vec![("background", "url(a:b)")])]
    #[case("junk; :x", vec![])]
    fn test_parse_style(#[case] input: &str, #[case] expected: Vec<(&str, &str)>) {
        let parsed = parse_style(input);
        let parsed = parsed
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect::<Vec<_>>();

        assert_eq!(parsed, expected);
    }

    #[rstest]
    #[case("a  b\tc", "a b c")]
    #[case("a b a", "a b")]
    #[case("   ", "")]
    fn test_classes_round_trip(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(format_classes(parse_classes(input)), expected);
    }
}
