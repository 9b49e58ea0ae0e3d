//! Probabilistic traces: named random variables recorded while running a
//! model, each either sampled (latent) or conditioned (observed).
//!
//! ```ignore
//! let mut q = Trace::new();
//! q.normal("z", &z_mean, &z_std, None)?; // sampled
//!
//! let mut p = Trace::new();
//! p.normal("z", &zeros, &ones, q.value("z").cloned())?;
//! p.bernoulli("x", &x_probs, Some(x))?; // conditioned
//!
//! let log_px = p.log_joint(Some(0), Some(1), &["x"])?;
//! ```

mod random_variable;
mod traits;

pub use random_variable::RandomVariable;
pub use traits::TraceT;

use std::collections::HashMap;

use candle_core::{Result, Tensor};
use log::debug;

use crate::distributions::{Bernoulli, Categorical, DistributionT, Normal};
use crate::log_density::LogDensity;

/// Sum `v` over every dimension except `sample_dim` and `batch_dim`.
///
/// When both are kept and `sample_dim > batch_dim`, the result is
/// transposed so that samples always come first.
///
/// # Arguments
/// * `v` - element-wise log-probabilities
/// * `sample_dim` - dimension to keep for samples
/// * `batch_dim` - dimension to keep for batch items
///
pub fn batch_sum(v: &Tensor, sample_dim: Option<usize>, batch_dim: Option<usize>) -> Result<Tensor> {
    let rank = v.rank();
    let keep: Vec<usize> = [sample_dim, batch_dim].into_iter().flatten().collect();

    if let Some(d) = keep.iter().find(|&&d| d >= rank) {
        return Err(candle_core::Error::Msg(format!(
            "cannot keep dimension {} of a rank-{} log-probability",
            d, rank
        )));
    }

    if let (Some(s), Some(b)) = (sample_dim, batch_dim) {
        if s == b {
            return Err(candle_core::Error::Msg(format!(
                "sample and batch dimensions must differ, both are {}",
                s
            )));
        }
    }

    let sum_dims: Vec<usize> = (0..rank).filter(|d| !keep.contains(d)).collect();

    let summed = if sum_dims.is_empty() {
        v.clone()
    } else {
        v.sum(sum_dims)?
    };

    match (sample_dim, batch_dim) {
        (Some(s), Some(b)) if s > b => summed.t(),
        _ => Ok(summed),
    }
}

/// Insertion-ordered record of named random variables
#[derive(Clone, Debug, Default)]
pub struct Trace {
    nodes: Vec<(Box<str>, RandomVariable)>,
    index: HashMap<Box<str>, usize>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RandomVariable> {
        self.index.get(name).map(|&i| &self.nodes[i].1)
    }

    pub fn value(&self, name: &str) -> Option<&Tensor> {
        self.get(name).map(|rv| &rv.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RandomVariable)> {
        self.nodes.iter().map(|(n, rv)| (n.as_ref(), rv))
    }

    /// Record a node under a fresh name
    pub fn insert(&mut self, name: &str, node: RandomVariable) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(candle_core::Error::Msg(format!(
                "trace already has a node named {}",
                name
            )));
        }
        debug!(
            "trace: {} {} {:?}",
            if node.observed { "conditioned" } else { "sampled" },
            name,
            node.value.dims()
        );
        self.index.insert(name.into(), self.nodes.len());
        self.nodes.push((name.into(), node));
        Ok(())
    }

    /// Sample from `dist`, or condition on `value` when given
    ///
    /// # Returns
    /// The recorded value
    pub fn variable<Dist: DistributionT>(
        &mut self,
        name: &str,
        dist: &Dist,
        value: Option<Tensor>,
    ) -> Result<Tensor> {
        let (value, observed) = match value {
            Some(v) => (v, true),
            None => (dist.sample()?, false),
        };
        let node = RandomVariable::new(dist, value.clone(), observed)?;
        self.insert(name, node)?;
        Ok(value)
    }

    /// Score another trace's node under `dist`, keeping whether it was
    /// sampled or conditioned. This is how a decoder reuses the encoder's
    /// latent draws.
    pub fn rescore<Dist: DistributionT>(
        &mut self,
        name: &str,
        dist: &Dist,
        source: &RandomVariable,
    ) -> Result<Tensor> {
        let node = RandomVariable::new(dist, source.value.clone(), source.observed)?;
        self.insert(name, node)?;
        Ok(source.value.clone())
    }

    pub fn normal(
        &mut self,
        name: &str,
        loc: &Tensor,
        scale: &Tensor,
        value: Option<Tensor>,
    ) -> Result<Tensor> {
        let dist = Normal::new(loc.clone(), scale.clone())?;
        self.variable(name, &dist, value)
    }

    pub fn bernoulli(&mut self, name: &str, probs: &Tensor, value: Option<Tensor>) -> Result<Tensor> {
        self.variable(name, &Bernoulli::new(probs.clone())?, value)
    }

    pub fn categorical(
        &mut self,
        name: &str,
        probs: &Tensor,
        value: Option<Tensor>,
    ) -> Result<Tensor> {
        self.variable(name, &Categorical::new(probs.clone())?, value)
    }
}

impl TraceT for Trace {
    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn conditioned(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, rv)| rv.observed)
            .map(|(n, _)| n)
            .collect()
    }

    fn sampled(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, rv)| !rv.observed)
            .map(|(n, _)| n)
            .collect()
    }

    fn log_joint(
        &self,
        sample_dim: Option<usize>,
        batch_dim: Option<usize>,
        nodes: &[&str],
    ) -> Result<LogDensity> {
        let mut log_prob = LogDensity::zero();
        for &name in nodes {
            if let Some(rv) = self.get(name) {
                let log_p = batch_sum(&rv.log_prob, sample_dim, batch_dim)?;
                log_prob = log_prob.add(&log_p.into())?;
            }
        }
        Ok(log_prob)
    }
}
