use std::fs;
use std::path::Path;

use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};

/// One entry of supported_types.yaml: enum variant name, the Rust scalar it
/// maps to, and its numeric kind.
#[derive(Debug, Deserialize, Serialize)]
struct TypeInfo {
    name: String,
    rust: String,
    kind: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct TypeList {
    types: Vec<TypeInfo>,
}

fn main() {
    let yaml = fs::read_to_string(Path::new("../supported_types.yaml"))
        .expect("Unable to read supported_types.yaml");
    let list: TypeList = serde_yaml::from_str(&yaml).expect("Failed to parse YAML");
    for t in &list.types {
        assert!(
            matches!(t.kind.as_str(), "Int" | "Uint" | "Float"),
            "unknown kind `{}` for type {}",
            t.kind,
            t.name
        );
    }

    let template = fs::read_to_string(Path::new("templates/data_types.jinja"))
        .expect("Unable to read template file");
    let env = Environment::new();
    let rendered = env
        .template_from_str(&template)
        .unwrap()
        .render(context! { types => list.types })
        .unwrap();

    fs::write("src/generated_data_types.rs", rendered)
        .expect("Unable to write generated file");

    println!("cargo:rerun-if-changed=../supported_types.yaml");
    println!("cargo:rerun-if-changed=templates/data_types.jinja");
}
