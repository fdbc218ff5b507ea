//! `stealthscribe generate` — run the calibration loop for a prompt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use stealthscribe_core::{GenerationRequest, ScoreConfig, ScoreWeights, SubMetric, Tone};

use super::{make_engine, print_json};

pub struct GenerateArgs<'a> {
    pub prompt: &'a str,
    pub tone: &'a str,
    pub user: Option<&'a str>,
    pub version: Option<u32>,
    pub words: Option<usize>,
    pub seed: Option<u64>,
    pub threshold: Option<f64>,
    pub max_iterations: Option<u32>,
    pub breadth: Option<usize>,
    pub timeout_secs: Option<f64>,
    pub weight_fidelity: Option<f64>,
    pub weight_detectability: Option<f64>,
    pub weight_fluency: Option<f64>,
    pub store: &'a str,
    pub json: bool,
}

/// Fold the three optional weight flags into one override; flags left unset
/// keep their default weight.
fn weights_from_flags(args: &GenerateArgs<'_>) -> Option<ScoreWeights> {
    if args.weight_fidelity.is_none()
        && args.weight_detectability.is_none()
        && args.weight_fluency.is_none()
    {
        return None;
    }
    let base = ScoreConfig::default();
    Some(ScoreWeights {
        fidelity: args.weight_fidelity.unwrap_or(base.weight_fidelity),
        detectability: args
            .weight_detectability
            .unwrap_or(base.weight_detectability),
        fluency: args.weight_fluency.unwrap_or(base.weight_fluency),
    })
}

pub fn run(args: GenerateArgs<'_>) {
    let tone: Tone = match args.tone.parse() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let engine = make_engine(args.store);

    // Ctrl+C flips the cancel flag; the loop finishes the current iteration
    // and reports its best candidate so far.
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let _ = ctrlc::set_handler(move || {
        eprintln!("\nCancelling after current iteration...");
        flag.store(true, Ordering::SeqCst);
    });

    let request = GenerationRequest {
        user: args.user.map(str::to_string),
        version: args.version,
        prompt: args.prompt.to_string(),
        tone,
        target_words: args.words,
        seed: args.seed,
        threshold: args.threshold,
        max_iterations: args.max_iterations,
        weights: weights_from_flags(&args),
        breadth: args.breadth,
        timeout_secs: args.timeout_secs,
    };

    let outcome = match engine.generate(&request, &cancel) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if args.json {
        print_json(&outcome);
        return;
    }

    println!("{}", outcome.text);
    println!();
    println!(
        "Aegis {:.1}/100 — {} after {} iteration(s)",
        outcome.rating.overall,
        outcome.state.name(),
        outcome.iterations_used
    );
    for metric in [
        SubMetric::SignatureFidelity,
        SubMetric::DetectabilityRisk,
        SubMetric::Fluency,
    ] {
        if let Some(score) = outcome.rating.sub_score(metric) {
            println!("  {:<22} {score:.1}", metric.name());
        }
    }
    if let Some(v) = outcome.signature_version {
        println!("  signature              v{v}");
    }
    println!("  seed                   {}", outcome.seed);

    if !outcome.accepted {
        eprintln!(
            "Warning: best candidate stayed below threshold {:.1}",
            outcome.rating.threshold
        );
        std::process::exit(2);
    }
}
