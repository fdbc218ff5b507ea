//! CLI for stealthscribe — write like you, on demand.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stealthscribe")]
#[command(about = "stealthscribe — write like you, on demand")]
#[command(version = stealthscribe_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract an authorial signature from writing samples
    Analyze {
        /// User id the signature belongs to ([A-Za-z0-9._-])
        #[arg(long)]
        user: String,

        /// Sample files; use "-" to read one sample from stdin
        #[arg(required = true)]
        samples: Vec<String>,

        /// Signature store directory
        #[arg(long, default_value = "signatures")]
        store: String,

        /// Print the full signature record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate calibrated text via the calibration loop.
    /// Ctrl+C stops after the current iteration and keeps the best candidate.
    Generate {
        /// What to write about
        prompt: String,

        /// Tone of the generated text
        #[arg(long, default_value = "casual", value_parser = ["formal", "casual", "persuasive", "narrative", "technical"])]
        tone: String,

        /// Calibrate against this user's stored signature
        #[arg(long)]
        user: Option<String>,

        /// Signature version (default: latest)
        #[arg(long)]
        version: Option<u32>,

        /// Target word count
        #[arg(long)]
        words: Option<usize>,

        /// Base seed, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Acceptance threshold override (0-100)
        #[arg(long)]
        threshold: Option<f64>,

        /// Iteration budget override
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Candidates per iteration override
        #[arg(long)]
        breadth: Option<usize>,

        /// Per-iteration generation deadline override, in seconds
        #[arg(long)]
        timeout_secs: Option<f64>,

        /// Signature-fidelity weight override
        #[arg(long)]
        weight_fidelity: Option<f64>,

        /// Detectability-risk weight override
        #[arg(long)]
        weight_detectability: Option<f64>,

        /// Fluency weight override
        #[arg(long)]
        weight_fluency: Option<f64>,

        /// Signature store directory
        #[arg(long, default_value = "signatures")]
        store: String,

        /// Print the full outcome as JSON instead of text + summary
        #[arg(long)]
        json: bool,
    },

    /// Aegis-score a text, optionally against a stored signature
    Score {
        /// File to score; use "-" to read from stdin
        input: String,

        /// Score fidelity against this user's signature
        #[arg(long)]
        user: Option<String>,

        /// Signature version (default: latest)
        #[arg(long)]
        version: Option<u32>,

        /// Signature store directory
        #[arg(long, default_value = "signatures")]
        store: String,

        /// Print the full rating as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored signatures
    Signatures {
        /// Show one user's versions in detail
        #[arg(long)]
        user: Option<String>,

        /// Signature store directory
        #[arg(long, default_value = "signatures")]
        store: String,
    },

    /// Run the HTTP API server
    Server {
        /// Host/interface to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value = "8777")]
        port: u16,

        /// Signature store directory
        #[arg(long, default_value = "signatures")]
        store: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            user,
            samples,
            store,
            json,
        } => commands::analyze::run(&user, &samples, &store, json),
        Commands::Generate {
            prompt,
            tone,
            user,
            version,
            words,
            seed,
            threshold,
            max_iterations,
            breadth,
            timeout_secs,
            weight_fidelity,
            weight_detectability,
            weight_fluency,
            store,
            json,
        } => commands::generate::run(commands::generate::GenerateArgs {
            prompt: &prompt,
            tone: &tone,
            user: user.as_deref(),
            version,
            words,
            seed,
            threshold,
            max_iterations,
            breadth,
            timeout_secs,
            weight_fidelity,
            weight_detectability,
            weight_fluency,
            store: &store,
            json,
        }),
        Commands::Score {
            input,
            user,
            version,
            store,
            json,
        } => commands::score::run(&input, user.as_deref(), version, &store, json),
        Commands::Signatures { user, store } => commands::signatures::run(user.as_deref(), &store),
        Commands::Server { host, port, store } => commands::server::run(&host, port, &store),
    }
}
