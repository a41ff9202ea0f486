//! CLI smoke entry point.
//!
//! Registers every schema file given on the command line against an
//! in-memory database and prints one metadata line per schema.

use cms_core::{ContentSchema, ContentServices, EngineConfig, StaticTokenValidator};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("cms_core version={}", cms_core::core_version());

    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("cms_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(schema_paths: Vec<String>) -> Result<(), String> {
    let conn = cms_core::open_db_in_memory().map_err(|err| err.to_string())?;
    let auth = Arc::new(StaticTokenValidator::new());
    let mut services = ContentServices::new(&conn, auth, EngineConfig::default());

    for path in &schema_paths {
        let raw = std::fs::read_to_string(path).map_err(|err| format!("{path}: {err}"))?;
        let schema = ContentSchema::from_json(&raw).map_err(|err| format!("{path}: {err}"))?;
        let fields = schema.fields.len();
        let service = services
            .register(schema)
            .map_err(|err| format!("{path}: {err}"))?;
        println!("schema={} fields={fields}", service.schema_name());
    }

    println!("schemas={}", services.schema_names().len());
    Ok(())
}
