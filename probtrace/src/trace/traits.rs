use candle_core::Result;

use crate::log_density::LogDensity;

/// Read-only view of a probabilistic trace, as consumed by the objectives.
pub trait TraceT {
    /// Whether a node named `name` was recorded
    fn contains(&self, name: &str) -> bool;

    /// Names of conditioned (observed) nodes, in insertion order
    fn conditioned(&self) -> Vec<&str>;

    /// Names of sampled (latent) nodes, in insertion order
    fn sampled(&self) -> Vec<&str>;

    /// Joint log-density of the named nodes
    ///
    /// # Arguments
    /// * `sample_dim` - dimension holding individual samples, kept
    /// * `batch_dim` - dimension holding batch items, kept
    /// * `nodes` - names to include; names not in the trace are skipped
    ///
    /// # Returns
    /// `LogDensity::Constant(0.0)` when nothing is included, otherwise a
    /// tensor with the kept dimensions, sample dimension first
    fn log_joint(
        &self,
        sample_dim: Option<usize>,
        batch_dim: Option<usize>,
        nodes: &[&str],
    ) -> Result<LogDensity>;
}
