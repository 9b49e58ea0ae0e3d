//! Monte Carlo estimators of variational objectives over an encoder trace
//! `q` and a decoder trace `p`.
//!
//! Variable sets:
//!
//! - `x`: nodes conditioned in `p` but not present in `q`
//! - `y`: nodes conditioned in `q` (possibly also present in `p`)
//! - `z`: nodes sampled in `q` that also appear in `p`
//!
//! When a sample dimension is given, expectations over q(z | x, y) are
//! approximated by self-normalized importance sampling with log weights
//! log q(y), normalized over dimension 0 of the log-joint.
//!
//! # References
//! Siddharth Narayanaswamy, Brooks Paige, Jan-Willem van de Meent, Alban
//! Desmaison, Frank Wood, Noah D Goodman, Pushmeet Kohli, and Philip HS
//! Torr, Semi-Supervised Learning of Disentangled Representations, NIPS
//! 2017.

mod montecarlo;

pub use montecarlo::{elbo, kl, log_like, ml, ElboConfig};
