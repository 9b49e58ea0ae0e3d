pub mod cli;
pub mod distributions;
pub mod log_density;
pub mod objectives;
pub mod trace;

pub use log_density::LogDensity;
pub use objectives::{elbo, kl, log_like, ml, ElboConfig};
pub use trace::{RandomVariable, Trace, TraceT};

pub use candle_core;
pub use candle_nn;
