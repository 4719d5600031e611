//! Projects value outputs onto the document.
use weft_compiler::ValueKind;
use weft_lang::Value;
use weft_markup::NodeId;

use crate::error::HostError;
use crate::host::Host;

/// Whether a class bound to `value` is present. Only `false`, `null`,
/// `undefined` and the string `"false"` remove it.
pub fn class_present(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null | Value::Bool(false) => false,
        Value::String(s) => s != "false",
        _ => true,
    }
}

/// Text written for `value`; nullish values render as nothing.
pub fn render(value: &Value) -> String {
    if value.is_nullish() {
        String::new()
    } else {
        value.to_string()
    }
}

pub fn is_bound(kind: &ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Class(_)
            | ValueKind::Style(_)
            | ValueKind::Attribute(_)
            | ValueKind::Text(_)
            | ValueKind::Request
    )
}

/// Applies a class, style, attribute or text binding. `node` is the scope
/// element, or the bound text node for text bindings. Other kinds are
/// handled by the runtime itself.
pub fn bind<H: Host>(host: &mut H, node: NodeId, kind: &ValueKind, value: &Value) -> Result<(), HostError> {
    match kind {
        ValueKind::Class(class) if class_present(value) => host.add_class(node, class),
        ValueKind::Class(class) => host.remove_class(node, class),
        ValueKind::Style(property) if value.is_nullish() => host.remove_style(node, property),
        ValueKind::Style(property) => host.set_style(node, property, &render(value)),
        ValueKind::Attribute(name) if value.is_nullish() => host.remove_attribute(node, name),
        ValueKind::Attribute(name) => host.set_attribute(node, name, &render(value)),
        ValueKind::Text(_) => host.set_text(node, &render(value)),
        ValueKind::Plain | ValueKind::Data | ValueKind::Request | ValueKind::Handler(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use rstest::{fixture, rstest};
    use weft_markup::Document;

    #[fixture]
    fn host() -> (MemoryHost, NodeId) {
        let mut document = Document::new();
        let div = document.create_element("div");
        let text = document.create_text("");
        document.append(document.root(), div).unwrap();
        document.append(div, text).unwrap();
        (MemoryHost::new(document), div)
    }

    #[rstest]
    #[case::false_literal(Value::from(false), false)]
    #[case::null(Value::Null, false)]
    #[case::undefined(Value::Undefined, false)]
    #[case::false_string(Value::from("false"), false)]
    #[case::empty_string(Value::from(""), true)]
    #[case::zero(Value::from(0.0), true)]
    #[case::true_literal(Value::from(true), true)]
    #[case::object(Value::from(serde_json::json!({})), true)]
    fn test_class_present(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(class_present(&value), expected);
    }

    #[rstest]
    #[case::class_on(ValueKind::Class("on".into()), Value::from(""), r#"<div class="on"></div>"#)]
    #[case::class_off(ValueKind::Class("on".into()), Value::from("false"), "<div></div>")]
    #[case::style(ValueKind::Style("font-size".into()), Value::from("2em"), r#"<div style="font-size: 2em"></div>"#)]
    #[case::style_null(ValueKind::Style("font-size".into()), Value::Null, "<div></div>")]
    #[case::attribute(ValueKind::Attribute("href".into()), Value::from(1.5), r#"<div href="1.5"></div>"#)]
    #[case::attribute_undefined(ValueKind::Attribute("href".into()), Value::Undefined, "<div></div>")]
    #[case::text(ValueKind::Text(0), Value::from("hi"), "<div>hi</div>")]
    #[case::text_null(ValueKind::Text(0), Value::Null, "<div></div>")]
    #[case::plain(ValueKind::Plain, Value::from("x"), "<div></div>")]
    fn test_bind(host: (MemoryHost, NodeId), #[case] kind: ValueKind, #[case] value: Value, #[case] expected: &str) {
        let (mut host, div) = host;
        let target = match kind {
            ValueKind::Text(index) => host.children(div)[index],
            _ => div,
        };

        bind(&mut host, target, &kind, &value).unwrap();

        assert_eq!(host.document().to_string(), expected);
    }

    #[rstest]
    fn test_bind_toggles_class(host: (MemoryHost, NodeId)) {
        let (mut host, div) = host;
        let kind = ValueKind::Class("active".into());

        bind(&mut host, div, &kind, &Value::from(true)).unwrap();
        assert!(host.document().has_class(div, "active"));
        bind(&mut host, div, &kind, &Value::from(false)).unwrap();
        assert!(!host.document().has_class(div, "active"));
    }
}
