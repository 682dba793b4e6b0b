use include_dir::{include_dir, Dir};
use std::fs;
use std::path::Path;
use tracing::{error, info};

static SAMPLE_DIR: Dir = include_dir!("sample");

/// Content of a built-in template by name
pub fn template_source(name: &str) -> Option<String> {
    match name {
        "join-result" => Some(crate::query::types::get_template()),
        "join-controller" => Some(crate::query::api_stub::get_template()),
        "join-docs" => Some(crate::query::docs::get_template()),
        other => crate::render::builtin::get_template(other).map(str::to_string),
    }
}

pub fn generate_template(name: String) {
    info!("Generating template: {}", name);
    match template_source(&name) {
        Some(content) => println!("{}", content),
        None => {
            error!(
                "Unsupported template: {} - use {}, join-result, join-controller, join-docs",
                name,
                crate::render::BUILTIN_CODES.join(", ")
            );
        }
    }
}

pub fn generate_sample(dir: String) {
    info!("Generating sample project: {:?}", dir);
    let target_path = Path::new(&dir);
    if let Err(e) = fs::create_dir_all(target_path) {
        error!("Failed to create target directory: {:?}", e);
        return;
    }

    fn write_dir_contents(dir: &Dir, target_path: &Path) {
        for file in dir.files() {
            let target_file_path = target_path.join(file.path());

            if let Some(parent) = target_file_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    error!("Failed to create directory: {:?}", e);
                    return;
                }
            }

            if let Err(e) = fs::write(&target_file_path, file.contents()) {
                error!("Failed to write file: {:?}", e);
                return;
            }
        }

        for sub_dir in dir.dirs() {
            write_dir_contents(sub_dir, target_path);
        }
    }

    write_dir_contents(&SAMPLE_DIR, target_path);

    info!("Sample project generated successfully at: {:?}", dir);
}
