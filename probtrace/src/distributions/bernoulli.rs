use candle_core::{Result, Tensor};

use super::prob_eps;
use super::traits::DistributionT;

/// Element-wise Bernoulli, parameterized by logits
#[derive(Clone, Debug)]
pub struct Bernoulli {
    logits: Tensor,
    probs: Tensor,
}

impl Bernoulli {
    /// Success probabilities are clamped away from 0 and 1 before they
    /// are turned into logits
    pub fn new(probs: Tensor) -> Result<Self> {
        let eps = prob_eps(probs.dtype());
        let p = probs.clamp(eps, 1.0 - eps)?;
        let logits = (p.log()? - p.neg()?.affine(1.0, 1.0)?.log()?)?;
        Ok(Self { logits, probs })
    }

    pub fn from_logits(logits: &Tensor) -> Result<Self> {
        Ok(Self {
            logits: logits.clone(),
            probs: candle_nn::ops::sigmoid(logits)?,
        })
    }

    pub fn probs(&self) -> &Tensor {
        &self.probs
    }

    pub fn logits(&self) -> &Tensor {
        &self.logits
    }
}

/// ln(1 + exp(l)) = max(l, 0) + ln(1 + exp(-|l|))
fn softplus(logits: &Tensor) -> Result<Tensor> {
    let tail = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    logits.relu()? + tail
}

impl DistributionT for Bernoulli {
    fn sample(&self) -> Result<Tensor> {
        let u = Tensor::rand(0f32, 1f32, self.probs.dims(), self.probs.device())?
            .to_dtype(self.probs.dtype())?;
        u.lt(&self.probs)?.to_dtype(self.probs.dtype())
    }

    /// x * ln(p) + (1 - x) * ln(1 - p) = x * l - softplus(l)
    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        value
            .broadcast_mul(&self.logits)?
            .broadcast_sub(&softplus(&self.logits)?)
    }

    fn reparameterized(&self) -> bool {
        false
    }
}
