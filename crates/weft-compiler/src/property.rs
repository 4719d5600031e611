//! Mapping from markup attribute names to declared property names.
use smol_str::SmolStr;
use weft_markup::markers;

use crate::program::ValueKind;

/// Prefix marking an attribute as dynamic.
pub const DYNAMIC_PREFIX: &str = ":";
pub const CLASS_PREFIX: &str = "class-";
pub const STYLE_PREFIX: &str = "style-";
pub const ATTRIBUTE_PREFIX: &str = "attr-";
pub const HANDLER_PREFIX: &str = "handle-";
pub const EVENT_PREFIX: &str = "on-";
pub const ALIAS: &str = "aka";

pub const DATA: &str = "data";
pub const DATA_OFFSET: &str = "dataOffset";
pub const DATA_LENGTH: &str = "dataLength";
pub const REQUEST: &str = "request";
pub const REQUEST_ECHO: &str = "requestEcho";

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// A reactive value. Handlers carry the camel-cased name they watch.
    Value { name: SmolStr, kind: PropertyKind },
    Event(SmolStr),
    Alias,
}

/// Value kind before the watched name of a handler is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Value(ValueKind),
    Handler(SmolStr),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Attribute `{0}` declares an empty name")]
pub struct EmptyName(pub SmolStr);

/// `font-size` to `fontSize`.
pub fn camel_case(name: &str) -> SmolStr {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;

    for c in name.chars() {
        match c {
            '-' | '_' if !out.is_empty() => upper = true,
            '-' | '_' => {}
            c if upper => {
                out.extend(c.to_uppercase());
                upper = false;
            }
            c => out.push(c),
        }
    }

    SmolStr::new(out)
}

pub fn is_dynamic(attribute: &str, value: &str) -> bool {
    attribute.starts_with(DYNAMIC_PREFIX) || value.contains(markers::OPEN)
}

/// Classifies a markup attribute. `Ok(None)` means the attribute is static.
pub fn classify(attribute: &str, value: &str) -> Result<Option<Declaration>, EmptyName> {
    let Some(rest) = attribute.strip_prefix(DYNAMIC_PREFIX) else {
        if !value.contains(markers::OPEN) {
            return Ok(None);
        }
        return Ok(Some(Declaration::Value {
            name: prefixed("attr", attribute),
            kind: PropertyKind::Value(ValueKind::Attribute(attribute.into())),
        }));
    };

    let empty = || EmptyName(attribute.into());
    let non_empty = |s: &str| if s.is_empty() { Err(empty()) } else { Ok(s.to_string()) };

    let declaration = if rest == ALIAS {
        Declaration::Alias
    } else if let Some(class) = rest.strip_prefix(CLASS_PREFIX) {
        let class = non_empty(class)?;
        Declaration::Value {
            name: prefixed("class", &class),
            kind: PropertyKind::Value(ValueKind::Class(class.into())),
        }
    } else if let Some(style) = rest.strip_prefix(STYLE_PREFIX) {
        let style = non_empty(style)?;
        Declaration::Value {
            name: prefixed("style", &style),
            kind: PropertyKind::Value(ValueKind::Style(style.into())),
        }
    } else if let Some(attr) = rest.strip_prefix(ATTRIBUTE_PREFIX) {
        let attr = non_empty(attr)?;
        Declaration::Value {
            name: prefixed("attr", &attr),
            kind: PropertyKind::Value(ValueKind::Attribute(attr.into())),
        }
    } else if let Some(watched) = rest.strip_prefix(HANDLER_PREFIX) {
        let watched = non_empty(watched)?;
        Declaration::Value {
            name: prefixed("handle", &watched),
            kind: PropertyKind::Handler(camel_case(&watched)),
        }
    } else if let Some(event) = rest.strip_prefix(EVENT_PREFIX) {
        Declaration::Event(non_empty(event)?.into())
    } else {
        let name = camel_case(&non_empty(rest)?);
        if name.is_empty() {
            return Err(empty());
        }
        let kind = match name.as_str() {
            DATA => ValueKind::Data,
            REQUEST => ValueKind::Request,
            _ => ValueKind::Plain,
        };
        Declaration::Value {
            name,
            kind: PropertyKind::Value(kind),
        }
    };

    Ok(Some(declaration))
}

fn prefixed(prefix: &str, name: &str) -> SmolStr {
    SmolStr::new(format!("{prefix}_{}", camel_case(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("font-size", "fontSize")]
    #[case("request-echo", "requestEcho")]
    #[case("count", "count")]
    #[case("a--b", "aB")]
    #[case("-a", "a")]
    fn test_camel_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(camel_case(input), expected);
    }

    #[rstest]
    #[case::generic(":count", "[[0]]", Some(Declaration::Value { name: "count".into(), kind: PropertyKind::Value(ValueKind::Plain) }))]
    #[case::kebab(":request-echo", "true", Some(Declaration::Value { name: "requestEcho".into(), kind: PropertyKind::Value(ValueKind::Plain) }))]
    #[case::data(":data", "[[[1]]]", Some(Declaration::Value { name: "data".into(), kind: PropertyKind::Value(ValueKind::Data) }))]
    #[case::request(":request", "/x", Some(Declaration::Value { name: "request".into(), kind: PropertyKind::Value(ValueKind::Request) }))]
    #[case::class(":class-is-active", "[[on]]", Some(Declaration::Value { name: "class_isActive".into(), kind: PropertyKind::Value(ValueKind::Class("is-active".into())) }))]
    #[case::style(":style-font-size", "[[s]]", Some(Declaration::Value { name: "style_fontSize".into(), kind: PropertyKind::Value(ValueKind::Style("font-size".into())) }))]
    #[case::attr(":attr-href", "[[u]]", Some(Declaration::Value { name: "attr_href".into(), kind: PropertyKind::Value(ValueKind::Attribute("href".into())) }))]
    #[case::handler(":handle-user-name", "[[a++]]", Some(Declaration::Value { name: "handle_userName".into(), kind: PropertyKind::Handler("userName".into()) }))]
    #[case::event(":on-click", "[[a++]]", Some(Declaration::Event("click".into())))]
    #[case::alias(":aka", "nav", Some(Declaration::Alias))]
    #[case::implicit_attr("title", "Hi [[name]]", Some(Declaration::Value { name: "attr_title".into(), kind: PropertyKind::Value(ValueKind::Attribute("title".into())) }))]
    #[case::static_attr("title", "Hi", None)]
    fn test_classify(#[case] attribute: &str, #[case] value: &str, #[case] expected: Option<Declaration>) {
        assert_eq!(classify(attribute, value), Ok(expected));
    }

    #[rstest]
    #[case(":")]
    #[case(":class-")]
    #[case(":on-")]
    #[case(":-")]
    fn test_classify_empty_name(#[case] attribute: &str) {
        assert_eq!(classify(attribute, ""), Err(EmptyName(attribute.into())));
    }

    #[rstest]
    #[case(":x", "1", true)]
    #[case("x", "[[1]]", true)]
    #[case("x", "[1]", false)]
    fn test_is_dynamic(#[case] attribute: &str, #[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_dynamic(attribute, value), expected);
    }
}
