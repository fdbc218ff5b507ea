//! `stealthscribe signatures` — list stored signatures.

use super::make_engine;

pub fn run(user: Option<&str>, store: &str) {
    let engine = make_engine(store);

    match user {
        Some(u) => {
            let versions = engine.store().versions(u);
            if versions.is_empty() {
                eprintln!("No signatures stored for '{u}'");
                std::process::exit(1);
            }
            println!("Signatures for '{u}':");
            for v in versions {
                match engine.store().get(u, Some(v)) {
                    Ok(sig) => println!(
                        "  v{:<3} {}  {} sample(s), {} words",
                        sig.version, sig.created_at, sig.sample_count, sig.sample_words
                    ),
                    Err(e) => println!("  v{v:<3} (unreadable: {e})"),
                }
            }
        }
        None => {
            let users = engine.store().users();
            if users.is_empty() {
                println!("No signatures stored in '{store}'");
                return;
            }
            println!("Stored signatures:");
            for u in users {
                let versions = engine.store().versions(&u);
                println!("  {:<24} {} version(s)", u, versions.len());
            }
        }
    }
}
