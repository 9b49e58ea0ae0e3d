use candle_core::{Result, Tensor, D};

use super::traits::DistributionT;
use super::prob_eps;

/// Categorical over the last dimension of `probs`, with one-hot values
#[derive(Clone, Debug)]
pub struct Categorical {
    probs: Tensor,
}

impl Categorical {
    /// `probs` need not be normalized along the last dimension
    pub fn new(probs: Tensor) -> Result<Self> {
        let probs = probs.broadcast_div(&probs.sum_keepdim(D::Minus1)?)?;
        Ok(Self { probs })
    }

    pub fn from_logits(logits: &Tensor) -> Result<Self> {
        Ok(Self {
            probs: candle_nn::ops::softmax(logits, D::Minus1)?,
        })
    }

    pub fn probs(&self) -> &Tensor {
        &self.probs
    }

    pub fn num_categories(&self) -> Result<usize> {
        self.probs.dim(D::Minus1)
    }
}

impl DistributionT for Categorical {
    /// Inverse-CDF draw; the first category whose cumulative mass
    /// exceeds `u` is switched on, so zero-mass categories never are.
    fn sample(&self) -> Result<Tensor> {
        let k = self.num_categories()?;
        let dtype = self.probs.dtype();
        let cdf = self.probs.cumsum(D::Minus1)?;

        let mut u_shape = self.probs.dims().to_vec();
        if let Some(last) = u_shape.last_mut() {
            *last = 1;
        }
        let total = cdf.narrow(D::Minus1, k - 1, 1)?;
        let u = Tensor::rand(0f32, 1f32, u_shape, self.probs.device())?
            .to_dtype(dtype)?
            .mul(&total)?;

        let reached = cdf.broadcast_gt(&u)?.to_dtype(dtype)?;
        if k == 1 {
            return Ok(reached);
        }
        let first = reached.narrow(D::Minus1, 0, 1)?;
        let rest = (reached.narrow(D::Minus1, 1, k - 1)? - reached.narrow(D::Minus1, 0, k - 1)?)?;
        Tensor::cat(&[first, rest], D::Minus1)
    }

    /// sum_k x(k) * ln p(k)
    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        let log_p = self.probs.clamp(prob_eps(self.probs.dtype()), 1.0)?.log()?;
        value.broadcast_mul(&log_p)?.sum(D::Minus1)
    }

    fn reparameterized(&self) -> bool {
        false
    }
}
