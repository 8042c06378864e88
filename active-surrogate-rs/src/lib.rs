//! # active-surrogate-rs
//!
//! Active learning of neural-network surrogates for parametrized dynamical
//! systems.
//!
//! An ensemble of small feed-forward networks learns the map from model
//! parameters to a state snapshot. Their disagreement on a validation set
//! picks the next parameter to simulate, so the expensive solver is only
//! called where the surrogate is least certain.
//!
//! ## Features
//!
//! - **Latin Hypercube sampling** of the initial and validation sets
//! - **Heterogeneous ensembles** of ReLU and snake-activated networks
//! - **Max-variance acquisition** over the validation set
//! - **Pluggable collaborators** via the [`collaborator::ReducedOrderModel`]
//!   and [`collaborator::Simulator`] traits, with a Lotka-Volterra reference
//! - **YAML configuration** and JSON iteration reports
//!
//! ## Quick Start (CLI)
//!
//! ```bash
//! # Write a starter configuration
//! active-surrogate init config.yaml --preset lotka-volterra
//!
//! # Check it
//! active-surrogate validate config.yaml
//!
//! # Run the loop against the built-in Lotka-Volterra simulator
//! active-surrogate run config.yaml --output-dir ./outputs
//! ```
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use active_surrogate_rs::collaborator::{LotkaVolterra, SimulatorRom};
//! use active_surrogate_rs::report::JsonReporter;
//! use active_surrogate_rs::{ActiveLearner, ActiveLearningConfig};
//!
//! # fn main() -> active_surrogate_rs::Result<()> {
//! let config = ActiveLearningConfig::from_file("config.yaml")?;
//! let mut rom = SimulatorRom::new(LotkaVolterra, config.simulator.clone());
//! let mut reporter = JsonReporter::new(&config.output_dir)?;
//!
//! let mut learner = ActiveLearner::new(config)?;
//! let outcome = learner.run(&mut rom, &mut reporter)?;
//! println!("adaptive samples: {:?}", outcome.adaptive_samples);
//! # Ok(())
//! # }
//! ```
//!
//! ## Using Presets
//!
//! ```rust
//! use active_surrogate_rs::ActiveLearningConfig;
//!
//! # fn main() -> active_surrogate_rs::Result<()> {
//! let mut config = ActiveLearningConfig::from_preset("lotka-volterra")?;
//! config.sampling.n_all = 30;
//! config.ensemble.epochs = 1000;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod active_learning;
pub mod collaborator;
pub mod config;
pub mod dataset;
pub mod ensemble;
pub mod error;
pub mod network;
pub mod report;
pub mod sampler;
pub mod trainer;

pub use active_learning::{ActiveLearner, ActiveLearningOutcome};
pub use config::{ActiveLearningConfig, EnsembleConfig};
pub use ensemble::{EnsembleOutcome, EnsembleTrainer};
pub use error::{Result, SurrogateError};
pub use network::SurrogateNet;
