use weft_compiler::Options as CompileOptions;
use weft_lang::Value;
use weft_runtime::{MemoryHost, Runtime, mount_fragment};

fn main() {
    divan::main();
}

fn chain(n: usize) -> String {
    let values = (1..n)
        .map(|i| format!(r#" :v{i}="[[v{} + 1]]""#, i - 1))
        .collect::<String>();
    format!(r#"<div :v0="[[0]]"{values}><p>[[v{}]]</p></div>"#, n - 1)
}

fn mount(source: &str) -> Runtime<MemoryHost> {
    mount_fragment(source, &CompileOptions::default()).0
}

#[divan::bench(args = [10, 100])]
fn propagate_chain(bencher: divan::Bencher, n: usize) {
    let source = chain(n);

    bencher
        .with_inputs(|| mount(&source))
        .bench_local_values(|mut runtime| {
            let root = runtime.root().unwrap();
            runtime.write(root, "v0", Value::from(1.0));
            runtime
        });
}

#[divan::bench(args = [10, 100, 1_000])]
fn replicate_list(bencher: divan::Bencher, n: usize) {
    let items = Value::array((0..n).map(Value::from).collect());

    bencher
        .with_inputs(|| mount(r#"<ul :items="[[[]]]"><li :data="[[items]]">[[data]]</li></ul>"#))
        .bench_local_values(|mut runtime| {
            let root = runtime.root().unwrap();
            runtime.write(root, "items", items.clone());
            runtime
        });
}

#[divan::bench]
fn mount_page() -> Runtime<MemoryHost> {
    mount(
        r#"<div :name="[['John']]" :title="[['Hello ' + name]]"><h1 :class-long="[[title.length > 8]]">[[title]]</h1><ul :items="[[[1, 2, 3, 4]]]"><li :data="[[items]]">[[data * 2]]</li></ul></div>"#,
    )
}
