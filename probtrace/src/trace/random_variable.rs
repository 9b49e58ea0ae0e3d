use candle_core::{Result, Tensor};

use crate::distributions::DistributionT;

/// A recorded node: its value and element-wise log-probability
#[derive(Clone, Debug)]
pub struct RandomVariable {
    pub value: Tensor,
    pub log_prob: Tensor,
    pub observed: bool,
    pub reparameterized: bool,
}

impl RandomVariable {
    /// Score `value` under `dist`
    ///
    /// # Arguments
    /// * `dist` - distribution the value was drawn from or conditioned on
    /// * `value` - realized value
    /// * `observed` - true for conditioned nodes
    pub fn new<Dist: DistributionT>(dist: &Dist, value: Tensor, observed: bool) -> Result<Self> {
        let log_prob = dist.log_prob(&value)?;
        Ok(Self {
            value,
            log_prob,
            observed,
            reparameterized: dist.reparameterized(),
        })
    }

    /// A node whose log-probability was computed elsewhere. Nothing is
    /// known about how `value` was drawn, so it is marked as not
    /// reparameterized.
    pub fn from_log_prob(value: Tensor, log_prob: Tensor, observed: bool) -> Self {
        Self {
            value,
            log_prob,
            observed,
            reparameterized: false,
        }
    }
}
