pub mod evaluate;
pub mod fit;
pub mod gaussian_model;

use clap::{Parser, Subcommand};

pub use evaluate::EvaluateArgs;
pub use fit::FitArgs;
pub use gaussian_model::GaussianModelArgs;

#[derive(Parser)]
#[command(name = "probtrace")]
#[command(about = "Monte Carlo variational objectives on a conjugate Gaussian model")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate log_like, kl, ml and elbo for a fixed encoder
    Evaluate(EvaluateArgs),
    /// Fit the encoder by maximizing the ELBO
    Fit(FitArgs),
}
