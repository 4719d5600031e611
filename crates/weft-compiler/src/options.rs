use serde::Deserialize;
use weft_markup::markers;

/// Compiler settings, usually read from a `weft.toml` `[compiler]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// File name reported in diagnostics.
    pub file_name: String,
    /// Attribute written on every scope element with its index.
    pub scope_attribute: String,
    /// Report identifiers left for host-global lookup.
    pub warn_unresolved: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            file_name: "<input>".to_string(),
            scope_attribute: markers::SCOPE.to_string(),
            warn_unresolved: true,
        }
    }
}

impl Options {
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty("", Options::default())]
    #[case::partial(
        "file-name = \"index.html\"",
        Options { file_name: "index.html".to_string(), ..Options::default() }
    )]
    #[case::full(
        "file-name = \"a.html\"\nscope-attribute = \"data-s\"\nwarn-unresolved = false",
        Options { file_name: "a.html".to_string(), scope_attribute: "data-s".to_string(), warn_unresolved: false }
    )]
    fn test_from_toml(#[case] input: &str, #[case] expected: Options) {
        assert_eq!(Options::from_toml(input).unwrap(), expected);
    }

    #[rstest]
    fn test_from_toml_rejects_wrong_type() {
        assert!(Options::from_toml("warn-unresolved = \"yes\"").is_err());
    }
}
