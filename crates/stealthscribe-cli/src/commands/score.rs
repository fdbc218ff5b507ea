//! `stealthscribe score` — Aegis-rate a text.

use stealthscribe_core::SubMetric;

use super::{make_engine, print_json, read_input};

pub fn run(input: &str, user: Option<&str>, version: Option<u32>, store: &str, json: bool) {
    let engine = make_engine(store);
    let text = read_input(input);

    let rating = match engine.score(&text, user, version) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if json {
        print_json(&rating);
        return;
    }

    println!(
        "Aegis {:.1}/100 ({})",
        rating.overall,
        if rating.passed { "pass" } else { "below threshold" }
    );
    for metric in [
        SubMetric::SignatureFidelity,
        SubMetric::DetectabilityRisk,
        SubMetric::Fluency,
    ] {
        match rating.sub_score(metric) {
            Some(score) => println!("  {:<22} {score:.1}", metric.name()),
            None if metric == SubMetric::SignatureFidelity => {
                println!("  {:<22} (no signature given)", metric.name());
            }
            None => {}
        }
    }
    println!("  threshold              {:.1}", rating.threshold);
}
