//! CLI entry point for active-surrogate-rs.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use active_surrogate_rs::collaborator::{LotkaVolterra, SimulatorRom};
use active_surrogate_rs::report::JsonReporter;
use active_surrogate_rs::{ActiveLearner, ActiveLearningConfig, Result};

#[derive(Parser)]
#[command(name = "active-surrogate")]
#[command(about = "Active learning of neural surrogates for parametrized ODEs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        config: String,
    },
    /// Generate a sample configuration file
    Init {
        /// Output path for config file
        #[arg(default_value = "config.yaml")]
        output: String,
        /// Preset (lotka-volterra, lotka-volterra-quick)
        #[arg(long, default_value = "lotka-volterra")]
        preset: String,
    },
    /// Print the initial training and validation samples
    Sample {
        /// Path to configuration file
        config: String,
    },
    /// Run active learning against the Lotka-Volterra simulator
    Run {
        /// Path to configuration file
        config: String,
        /// Override the configured report directory
        #[arg(long)]
        output_dir: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => {
            tracing::info!("Validating configuration: {}", config);
            let config = ActiveLearningConfig::from_file(&config)?;
            config.validate()?;
            println!("✓ Configuration is valid");
            println!(
                "  Samples: {} initial, {} validation, budget {}",
                config.sampling.num_init, config.sampling.num_valid, config.sampling.n_all
            );
            println!(
                "  Ensemble: {} members, {} epochs",
                config.ensemble.num_networks, config.ensemble.epochs
            );
        }
        Commands::Init { output, preset } => {
            tracing::info!("Generating config for preset: {}", preset);
            let config = ActiveLearningConfig::from_preset(&preset)?;
            config.to_file(&output)?;
            println!("✓ Configuration written to: {output}");
        }
        Commands::Sample { config } => {
            let config = ActiveLearningConfig::from_file(&config)?;
            let learner = ActiveLearner::new(config)?;
            let (train, valid) = learner.initial_samples()?;
            println!("# training");
            for row in &train {
                println!("{}", format_row(row));
            }
            println!("# validation");
            for row in &valid {
                println!("{}", format_row(row));
            }
        }
        Commands::Run { config, output_dir } => {
            tracing::info!("Starting active learning with config: {}", config);
            let mut config = ActiveLearningConfig::from_file(&config)?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }

            let mut rom = SimulatorRom::new(LotkaVolterra, config.simulator.clone());
            let mut reporter = JsonReporter::new(&config.output_dir)?;
            let mut learner = ActiveLearner::new(config)?.with_progress(true);

            let outcome = learner.run(&mut rom, &mut reporter)?;
            println!("✓ Finished {} iterations", outcome.iterations);
            for (sample, err) in outcome.adaptive_samples.iter().zip(&outcome.valid_errors) {
                println!("  {}  valid error {err:.4}", format_row(sample));
            }
            println!("  Reports: {}", reporter.output_dir().display());
        }
    }

    Ok(())
}

fn format_row(row: &[f64]) -> String {
    row.iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(" ")
}
