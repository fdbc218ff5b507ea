//! `stealthscribe analyze` — extract a signature from writing samples.

use stealthscribe_core::Feature;

use super::{make_engine, print_json, read_input};

pub fn run(user: &str, sample_args: &[String], store: &str, json: bool) {
    let engine = make_engine(store);

    let samples: Vec<String> = sample_args.iter().map(|a| read_input(a)).collect();
    let refs: Vec<&str> = samples.iter().map(String::as_str).collect();

    let signature = match engine.analyze(user, &refs) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if json {
        print_json(&signature);
        return;
    }

    println!("Signature stored");
    println!("  User:      {}", signature.user);
    println!("  Version:   {}", signature.version);
    println!("  Samples:   {}", signature.sample_count);
    println!("  Words:     {}", signature.sample_words);
    println!("  Created:   {}", signature.created_at);
    println!();
    println!("  Feature profile (value / confidence):");
    for &feature in Feature::ALL {
        println!(
            "    {:<22} {:.4} / {:.2}",
            feature.name(),
            signature.vector.get(feature),
            signature.confidence(feature)
        );
    }
    if !signature.common_phrases.is_empty() {
        println!();
        println!(
            "  Recurring phrases: {}",
            signature.common_phrases.join(", ")
        );
    }
}
