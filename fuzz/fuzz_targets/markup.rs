#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use weft_lang::Value;

#[derive(Debug, Clone, Arbitrary)]
struct Attribute {
    name: String,
    value: String,
}

#[derive(Debug, Clone, Arbitrary)]
struct Element {
    tag: u8,
    attributes: Vec<Attribute>,
    text: Option<String>,
    children: Vec<Element>,
}

const TAGS: [&str; 6] = ["div", "p", "ul", "li", "span", "button"];

impl Element {
    fn to_html(&self, depth: usize) -> String {
        let tag = TAGS[self.tag as usize % TAGS.len()];
        let attributes = self
            .attributes
            .iter()
            .map(|a| format!(" :{}=\"{}\"", a.name, a.value.replace('"', "'")))
            .collect::<String>();
        let children = if depth < 4 {
            self.children.iter().map(|c| c.to_html(depth + 1)).collect::<String>()
        } else {
            String::new()
        };
        format!(
            "<{tag}{attributes}>{}{children}</{tag}>",
            self.text.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Context {
    raw: Option<String>,
    root: Element,
    writes: Vec<(String, String)>,
}

fuzz_target!(|context: Context| {
    let source = context.raw.clone().unwrap_or_else(|| context.root.to_html(0));
    let options = weft_compiler::Options::default();
    let (mut runtime, _) = weft_runtime::mount_fragment(&source, &options);

    let Some(root) = runtime.root() else {
        return;
    };
    for (name, value) in context.writes.iter().take(16) {
        runtime.write(root, name, Value::from(value.as_str()));
    }
});
