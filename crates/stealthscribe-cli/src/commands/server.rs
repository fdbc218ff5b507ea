//! `stealthscribe server` — run the HTTP API.

use std::sync::Arc;

use super::make_engine;

pub fn run(host: &str, port: u16, store: &str) {
    let engine = Arc::new(make_engine(store));

    let base = format!("http://{host}:{port}");
    println!("StealthScribe Server v{}", stealthscribe_core::VERSION);
    println!("   {base}");
    println!("   store: {store}");
    println!();
    println!("   Endpoints:");
    println!("     GET  /                        API index (try: curl {base})");
    println!("     POST /api/v1/analyze          Extract a signature from samples");
    println!("     POST /api/v1/generate         Generate calibrated text");
    println!("     POST /api/v1/score            Aegis-score a text");
    println!("     GET  /api/v1/signatures/NAME  Stored signature (?version=N)");
    println!("     GET  /health                  Health check");
    println!();
    println!("   Examples:");
    println!("     curl -X POST {base}/api/v1/score \\");
    println!("          -H 'content-type: application/json' \\");
    println!("          -d '{{\"text\": \"Some prose to rate.\"}}'");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(stealthscribe_server::run_server(engine, host, port)) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
