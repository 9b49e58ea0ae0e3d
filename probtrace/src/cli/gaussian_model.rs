use candle_core::{DType, Device, Result, Tensor};
use clap::Args;

use crate::distributions::{DistributionT, Normal};
use crate::trace::Trace;

pub const LATENT: &str = "z";
pub const OBSERVED: &str = "x";

/// Synthetic data shared by the `evaluate` and `fit` subcommands
#[derive(Args, Debug, Clone)]
pub struct GaussianModelArgs {
    #[arg(short, long, default_value = "64", help = "Number of data points (batch size)")]
    pub batch_size: usize,

    #[arg(short, long, default_value = "2", help = "Latent/observed dimension")]
    pub dim: usize,

    #[arg(short, long, default_value = "100", help = "Monte Carlo samples per data point")]
    pub samples: usize,

    #[arg(long, default_value = "0.5", help = "Observation noise standard deviation")]
    pub noise_std: f64,

    #[arg(long, default_value = "0.1", help = "Coefficient added to the ML term")]
    pub alpha: f64,

    #[arg(long, default_value = "1.0", help = "Coefficient of the KL term")]
    pub beta: f64,

    #[arg(long)]
    pub gpu: bool,
}

impl GaussianModelArgs {
    pub fn device(&self) -> Device {
        if self.gpu {
            #[cfg(target_os = "macos")]
            {
                Device::new_metal(0).unwrap_or(Device::Cpu)
            }
            #[cfg(target_os = "linux")]
            {
                Device::new_cuda(0).unwrap_or(Device::Cpu)
            }
            #[cfg(not(any(target_os = "macos", target_os = "linux")))]
            {
                Device::Cpu
            }
        } else {
            Device::Cpu
        }
    }
}

/// Conjugate Gaussian model
///
/// z(b, d) ~ N(0, 1)
/// x(b, d) | z ~ N(z(b, d), σ²)
///
/// with amortized encoder q(z | x) = N(w(d) * x(b, d), s(d)²).
///
/// Traces are laid out as (sample, batch, dim), so objectives are
/// evaluated with `sample_dim = 0` and `batch_dim = 1`.
pub struct ConjugateGaussian {
    /// observations, shape (B, D)
    x_bd: Tensor,
    noise_std: f64,
}

impl ConjugateGaussian {
    pub fn new(x_bd: Tensor, noise_std: f64) -> Self {
        Self { x_bd, noise_std }
    }

    /// Draw a batch from the generative model
    pub fn simulate(
        batch_size: usize,
        dim: usize,
        noise_std: f64,
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        let z_bd = Tensor::randn(0f32, 1f32, (batch_size, dim), device)?.to_dtype(dtype)?;
        let eps_bd = Tensor::randn(0f32, 1f32, (batch_size, dim), device)?.to_dtype(dtype)?;
        let x_bd = (z_bd + (eps_bd * noise_std)?)?;
        Ok(Self { x_bd, noise_std })
    }

    pub fn data(&self) -> &Tensor {
        &self.x_bd
    }

    /// Posterior N(w* x, s*²) with w* = 1 / (1 + σ²), s*² = σ² / (1 + σ²)
    pub fn exact_posterior(&self) -> (f64, f64) {
        let var = self.noise_std * self.noise_std;
        let w = 1.0 / (1.0 + var);
        let s = (var / (1.0 + var)).sqrt();
        (w, s)
    }

    /// log p(x) = sum_d log N(x(b, d); 0, 1 + σ²), averaged over the batch
    pub fn log_evidence(&self) -> Result<f64> {
        let marginal_std = (1.0 + self.noise_std * self.noise_std).sqrt();
        let marginal = Normal::new(
            self.x_bd.zeros_like()?,
            (self.x_bd.ones_like()? * marginal_std)?,
        )?;
        marginal
            .log_prob(&self.x_bd)?
            .sum(1)?
            .mean_all()?
            .to_dtype(DType::F64)?
            .to_scalar::<f64>()
    }

    /// Encoder trace with `num_samples` draws of z per data point
    ///
    /// # Arguments
    /// * `weight_d` - encoder weight w, shape (D,)
    /// * `ln_std_d` - encoder log standard deviation ln(s), shape (D,)
    /// * `num_samples` - S
    ///
    /// # Returns
    /// The trace and q(z | x) itself, both shaped (S, B, D)
    pub fn encode(
        &self,
        weight_d: &Tensor,
        ln_std_d: &Tensor,
        num_samples: usize,
    ) -> Result<(Trace, Normal)> {
        let (b, d) = self.x_bd.dims2()?;
        let loc_sbd = self
            .x_bd
            .unsqueeze(0)?
            .broadcast_as((num_samples, b, d))?
            .broadcast_mul(weight_d)?;
        let scale_sbd = ln_std_d.exp()?.broadcast_as((num_samples, b, d))?;
        let q_z = Normal::new(loc_sbd, scale_sbd)?;

        let mut q = Trace::new();
        q.variable(LATENT, &q_z, None)?;
        Ok((q, q_z))
    }

    /// Decoder trace scoring the encoder's draws of z and the observed x
    pub fn decode(&self, q: &Trace) -> Result<Trace> {
        let z = q.get(LATENT).ok_or_else(|| {
            candle_core::Error::Msg(format!("encoder trace has no node {}", LATENT))
        })?;
        let z_sbd = &z.value;

        let prior = Normal::standard(z_sbd.dims(), z_sbd.dtype(), z_sbd.device())?;
        let likelihood = Normal::new(z_sbd.clone(), (z_sbd.ones_like()? * self.noise_std)?)?;
        let x_sbd = self.x_bd.unsqueeze(0)?.broadcast_as(z_sbd.dims())?;

        let mut p = Trace::new();
        p.rescore(LATENT, &prior, z)?;
        p.variable(OBSERVED, &likelihood, Some(x_sbd.contiguous()?))?;
        Ok(p)
    }
}

/// Mean over the batch of sum_d KL(q(z(b, d) | x) || N(0, 1)), using
/// the first sample slice of q
pub fn analytic_kl(q_z: &Normal) -> Result<f64> {
    let first = Normal::new(q_z.loc().get(0)?, q_z.scale().get(0)?)?;
    let prior = Normal::standard(first.loc().dims(), first.loc().dtype(), first.loc().device())?;
    first
        .kl_divergence(&prior)?
        .sum(1)?
        .mean_all()?
        .to_dtype(DType::F64)?
        .to_scalar::<f64>()
}
