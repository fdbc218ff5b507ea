pub mod analyze;
pub mod generate;
pub mod score;
pub mod server;
pub mod signatures;

use std::io::Read;
use std::sync::Arc;

use stealthscribe_core::{EngineConfig, ScribeEngine, SignatureStore, StencilGenerator};

/// Open the signature store at `path` and build an engine around it.
/// Exits on failure; every command needs the store.
pub fn make_engine(store_path: &str) -> ScribeEngine {
    let store = match SignatureStore::open(store_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening signature store at '{store_path}': {e}");
            std::process::exit(1);
        }
    };
    ScribeEngine::new(
        store,
        Arc::new(StencilGenerator::new()),
        EngineConfig::default(),
    )
}

/// Read a text argument: a file path, or stdin when the argument is "-".
pub fn read_input(arg: &str) -> String {
    let result = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(arg)
    };
    match result {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading '{arg}': {e}");
            std::process::exit(1);
        }
    }
}

/// Pretty-print any serializable value as JSON to stdout.
pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            std::process::exit(1);
        }
    }
}
