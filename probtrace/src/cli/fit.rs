use anyhow::Result;
use candle_core::DType;
use candle_nn::{Optimizer, VarBuilder, VarMap};
use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;

use super::evaluate::ObjectiveReport;
use super::gaussian_model::{ConjugateGaussian, GaussianModelArgs};
use crate::objectives::{elbo, ElboConfig};

#[derive(Args, Debug)]
pub struct FitArgs {
    #[command(flatten)]
    pub model: GaussianModelArgs,

    #[arg(long, default_value = "500")]
    pub iters: usize,

    #[arg(long, default_value = "0.05")]
    pub lr: f64,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Encoder parameters learned by `fit`
pub struct FittedEncoder {
    pub weight: Vec<f32>,
    pub std: Vec<f32>,
    pub elbo_trace: Vec<f32>,
}

/// Maximize the ELBO of the conjugate Gaussian model over the encoder's
/// weight and log standard deviation with AdamW.
pub fn fit_encoder(
    data: &ConjugateGaussian,
    num_samples: usize,
    iters: usize,
    learning_rate: f64,
    config: &ElboConfig,
    verbose: bool,
) -> Result<FittedEncoder> {
    let x = data.data();
    let dim = x.dim(1)?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, x.dtype(), x.device());
    let weight_d = vb.get_with_hints(dim, "encoder.weight", candle_nn::Init::Const(0.0))?;
    let ln_std_d = vb.get_with_hints(dim, "encoder.ln_std", candle_nn::Init::Const(0.0))?;

    // Create optimizer AFTER parameters so varmap contains all variables
    let mut adam = candle_nn::AdamW::new_lr(varmap.all_vars(), learning_rate)?;

    let pb = ProgressBar::new(iters as u64);
    if verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut elbo_trace = Vec::with_capacity(iters);

    for i in 0..iters {
        let (q, _) = data.encode(&weight_d, &ln_std_d, num_samples)?;
        let p = data.decode(&q)?;

        let objective = elbo(&q, &p, Some(0), Some(1), config)?;
        let loss = objective.to_tensor(x)?.neg()?;
        adam.backward_step(&loss)?;

        let elbo_val = -loss.to_dtype(DType::F32)?.to_scalar::<f32>()?;
        elbo_trace.push(elbo_val);

        if verbose && (i % 50 == 0 || i == iters - 1) {
            let report = ObjectiveReport::compute(&q, &p, config)?;
            info!(
                "iter {:4}: elbo = {:10.4}, log_like = {:10.4}, kl = {:10.4}",
                i, report.elbo, report.log_like, report.kl
            );
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(FittedEncoder {
        weight: weight_d.to_dtype(DType::F32)?.to_vec1()?,
        std: ln_std_d.exp()?.to_dtype(DType::F32)?.to_vec1()?,
        elbo_trace,
    })
}

pub fn run(args: &FitArgs) -> Result<()> {
    let device = args.model.device();
    info!("Using device: {:?}", device);

    let data = ConjugateGaussian::simulate(
        args.model.batch_size,
        args.model.dim,
        args.model.noise_std,
        DType::F32,
        &device,
    )?;
    let config = ElboConfig::new(args.model.alpha, args.model.beta);

    info!(
        "Training for {} iterations, {} samples per data point",
        args.iters, args.model.samples
    );
    let fitted = fit_encoder(
        &data,
        args.model.samples,
        args.iters,
        args.lr,
        &config,
        args.verbose,
    )?;

    let (w_star, s_star) = data.exact_posterior();
    info!("log p(x) = {:10.4}", data.log_evidence()?);
    if let Some(last) = fitted.elbo_trace.last() {
        info!("final elbo = {:10.4}", last);
    }

    println!("dim\tweight\tstd\texact_weight\texact_std");
    for (d, (w, s)) in fitted.weight.iter().zip(fitted.std.iter()).enumerate() {
        println!("{}\t{:.4}\t{:.4}\t{:.4}\t{:.4}", d, w, s, w_star, s_star);
    }
    Ok(())
}
