use anyhow::Result;
use candle_core::{DType, Tensor};
use clap::Args;
use log::info;

use super::gaussian_model::{analytic_kl, ConjugateGaussian, GaussianModelArgs};
use crate::objectives::{elbo, kl, log_like, ml, ElboConfig};
use crate::trace::{Trace, TraceT};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub model: GaussianModelArgs,

    #[arg(long, help = "Encoder weight w (default: exact posterior)")]
    pub weight: Option<f64>,

    #[arg(long, help = "Encoder standard deviation s (default: exact posterior)")]
    pub std: Option<f64>,
}

/// The three ELBO terms and their combination, evaluated on shared
/// log weights
#[derive(Debug, Clone)]
pub struct ObjectiveReport {
    pub log_like: f64,
    pub kl: f64,
    pub ml: f64,
    pub elbo: f64,
}

impl ObjectiveReport {
    pub fn compute(q: &Trace, p: &Trace, config: &ElboConfig) -> candle_core::Result<Self> {
        let (s, b) = (Some(0), Some(1));
        let log_weights = q.log_joint(s, b, &q.conditioned())?;
        let lw = Some(&log_weights);
        Ok(Self {
            log_like: log_like(q, p, s, b, lw)?.to_f64()?,
            kl: kl(q, p, s, b, lw)?.to_f64()?,
            ml: ml(q, s, b, lw)?.to_f64()?,
            elbo: elbo(q, p, s, b, config)?.to_f64()?,
        })
    }
}

pub fn run(args: &EvaluateArgs) -> Result<()> {
    let device = args.model.device();
    info!("Using device: {:?}", device);

    let dtype = DType::F32;
    let data = ConjugateGaussian::simulate(
        args.model.batch_size,
        args.model.dim,
        args.model.noise_std,
        dtype,
        &device,
    )?;

    let (w_star, s_star) = data.exact_posterior();
    let w = args.weight.unwrap_or(w_star);
    let s = args.std.unwrap_or(s_star);
    if s <= 0.0 {
        anyhow::bail!("encoder standard deviation must be positive, got {}", s);
    }
    info!("Encoder: w = {:.4}, s = {:.4} (exact: w = {:.4}, s = {:.4})", w, s, w_star, s_star);

    let weight_d = (Tensor::ones(args.model.dim, dtype, &device)? * w)?;
    let ln_std_d = (Tensor::ones(args.model.dim, dtype, &device)? * s.ln())?;

    let (q, q_z) = data.encode(&weight_d, &ln_std_d, args.model.samples)?;
    let p = data.decode(&q)?;

    let config = ElboConfig::new(args.model.alpha, args.model.beta);
    let report = ObjectiveReport::compute(&q, &p, &config)?;

    info!("log_like     = {:10.4}", report.log_like);
    info!("kl           = {:10.4}", report.kl);
    info!("kl(analytic) = {:10.4}", analytic_kl(&q_z)?);
    info!("ml           = {:10.4}", report.ml);
    info!("elbo         = {:10.4}", report.elbo);
    info!("log p(x)     = {:10.4}", data.log_evidence()?);

    println!(
        "log_like\t{:.6}\nkl\t{:.6}\nml\t{:.6}\nelbo\t{:.6}",
        report.log_like, report.kl, report.ml, report.elbo
    );
    Ok(())
}
