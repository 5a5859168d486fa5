//! Writes the service's OpenAPI document.
//!
//! Usage:
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json

use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
    process,
};

use utoipa::OpenApi;
use vermimometer::api::handlers::ApiDoc;

fn main() {
    let json = match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to serialise OpenAPI document: {e}");
            process::exit(1);
        }
    };

    let args: Vec<String> = env::args().collect();
    let output_path: Option<PathBuf> = args
        .windows(2)
        .find(|w| w[0] == "--output")
        .map(|w| PathBuf::from(&w[1]));

    let result = match &output_path {
        Some(path) => fs::write(path, &json),
        None => io::stdout().write_all(json.as_bytes()),
    };

    match (result, output_path) {
        (Ok(()), Some(path)) => eprintln!("OpenAPI document written to {}", path.display()),
        (Ok(()), None) => {}
        (Err(e), _) => {
            eprintln!("Failed to write OpenAPI document: {e}");
            process::exit(1);
        }
    }
}
