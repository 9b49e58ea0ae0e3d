use candle_core::{Result, Tensor};

/// A distribution that can populate a trace node.
pub trait DistributionT {
    /// Draw one sample with the distribution's parameter shape
    fn sample(&self) -> Result<Tensor>;

    /// Element-wise log-probability of `value`
    ///
    /// # Arguments
    /// * `value` - tensor broadcastable against the parameters
    ///
    /// # Returns
    /// Log-probability with the broadcast shape (the event dimension is
    /// reduced for multivariate distributions)
    fn log_prob(&self, value: &Tensor) -> Result<Tensor>;

    /// Whether samples are a differentiable function of the parameters
    fn reparameterized(&self) -> bool;
}
