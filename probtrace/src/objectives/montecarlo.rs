use candle_core::{Result, Tensor};
use candle_nn::ops::softmax;
use log::debug;

use crate::log_density::LogDensity;
use crate::trace::TraceT;

/// Coefficients of the semi-supervised ELBO.
#[derive(Debug, Clone)]
pub struct ElboConfig {
    /// Coefficient added to the ML term
    pub alpha: f64,
    /// Coefficient of the KL term
    pub beta: f64,
}

impl Default for ElboConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            beta: 1.0,
        }
    }
}

impl ElboConfig {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }
}

/// Names conditioned in `p` but absent from `q`
fn private_conditioned<'a, Q, P>(q: &Q, p: &'a P) -> Vec<&'a str>
where
    Q: TraceT + ?Sized,
    P: TraceT + ?Sized,
{
    p.conditioned()
        .into_iter()
        .filter(|n| !q.contains(n))
        .collect()
}

/// Names sampled in `q` that also appear in `p`
fn shared_sampled<'a, Q, P>(q: &'a Q, p: &P) -> Vec<&'a str>
where
    Q: TraceT + ?Sized,
    P: TraceT + ?Sized,
{
    q.sampled().into_iter().filter(|n| p.contains(n)).collect()
}

/// Self-normalized importance-weighted mean of `term`
///
/// mean_b sum_s softmax(log_w)(s, b) * term(s, b)
///
/// A constant `log_weights` carries no sample-level variation, so the
/// plain mean is returned instead.
fn importance_mean(term: &LogDensity, log_weights: &LogDensity) -> Result<LogDensity> {
    let log_w = match log_weights {
        LogDensity::Constant(_) => return term.mean(),
        LogDensity::Tensor(t) => t,
    };
    let weights = softmax(log_w, 0)?;
    match term {
        LogDensity::Constant(c) => Ok(LogDensity::Constant(*c)),
        LogDensity::Tensor(t) => {
            let weighted: Tensor = weights.broadcast_mul(t)?.sum(0)?;
            Ok(weighted.mean_all()?.into())
        }
    }
}

/// Monte Carlo estimate of the log-likelihood
///
/// E_{q(z | x, y)}[ log p(x | y, z) ]
///
/// where `x` are nodes conditioned in `p` but not present in `q`.
///
/// # Arguments
/// * `q` - encoder trace
/// * `p` - decoder trace
/// * `sample_dim` - dimension containing individual samples
/// * `batch_dim` - dimension containing batch items
/// * `log_weights` - log importance weights; computed from `q`'s
///   conditioned nodes when `None`
///
pub fn log_like<Q, P>(
    q: &Q,
    p: &P,
    sample_dim: Option<usize>,
    batch_dim: Option<usize>,
    log_weights: Option<&LogDensity>,
) -> Result<LogDensity>
where
    Q: TraceT + ?Sized,
    P: TraceT + ?Sized,
{
    let x = private_conditioned(q, p);
    debug!("log_like: x = {:?}", x);
    let log_px = p.log_joint(sample_dim, batch_dim, &x)?;

    if sample_dim.is_none() {
        return log_px.mean();
    }

    let log_weights = match log_weights {
        Some(lw) => lw.clone(),
        None => q.log_joint(sample_dim, batch_dim, &q.conditioned())?,
    };
    importance_mean(&log_px, &log_weights)
}

/// Monte Carlo estimate of the unnormalized KL divergence
///
/// E_{q(z | x, y)}[ log q(y, z | x) / p(y, z) ]
///
/// where `y` are nodes conditioned in `q` and `z` are nodes sampled in
/// `q` that also appear in `p`.
///
/// # Arguments
/// * `q` - encoder trace
/// * `p` - decoder trace
/// * `sample_dim` - dimension containing individual samples
/// * `batch_dim` - dimension containing batch items
/// * `log_weights` - stands in for log q(y) when given
///
pub fn kl<Q, P>(
    q: &Q,
    p: &P,
    sample_dim: Option<usize>,
    batch_dim: Option<usize>,
    log_weights: Option<&LogDensity>,
) -> Result<LogDensity>
where
    Q: TraceT + ?Sized,
    P: TraceT + ?Sized,
{
    let y = q.conditioned();
    let z = shared_sampled(q, p);
    debug!("kl: y = {:?}, z = {:?}", y, z);

    let log_qy = match log_weights {
        Some(lw) => lw.clone(),
        None => q.log_joint(sample_dim, batch_dim, &y)?,
    };
    let log_py = p.log_joint(sample_dim, batch_dim, &y)?;
    let log_pz = p.log_joint(sample_dim, batch_dim, &z)?;
    let log_qz = q.log_joint(sample_dim, batch_dim, &z)?;

    let log_qp = log_qy.add(&log_qz)?.sub(&log_py)?.sub(&log_pz)?;

    if sample_dim.is_none() {
        return log_qp.mean();
    }
    importance_mean(&log_qp, &log_qy)
}

/// Monte Carlo estimate of the maximum likelihood encoder objective
///
/// E_{q(z | x)}[ log q(y, z | x) / q(z | x) ]
///
/// No importance weighting is applied; this is the term that generates
/// the weights for the other objectives.
///
/// # Arguments
/// * `q` - encoder trace
/// * `sample_dim` - dimension containing individual samples
/// * `batch_dim` - dimension containing batch items
/// * `log_weights` - stands in for log q(y) when given
///
pub fn ml<Q>(
    q: &Q,
    sample_dim: Option<usize>,
    batch_dim: Option<usize>,
    log_weights: Option<&LogDensity>,
) -> Result<LogDensity>
where
    Q: TraceT + ?Sized,
{
    let log_qy = match log_weights {
        Some(lw) => lw.clone(),
        None => q.log_joint(sample_dim, batch_dim, &q.conditioned())?,
    };
    match log_qy {
        LogDensity::Constant(_) => Ok(log_qy),
        LogDensity::Tensor(_) => log_qy.mean(),
    }
}

/// Importance sampling estimate of the semi-supervised ELBO
///
/// E_q[ log p(x | y, z) ]
///   - β E_q[ log q(y, z | x) / p(y, z) ]
///   + (β + α) E_q[ log q(y, z | x) / q(z | x) ]
///
/// The log weights, log q(y), are computed once and shared by all three
/// terms.
///
/// # Arguments
/// * `q` - encoder trace
/// * `p` - decoder trace
/// * `sample_dim` - dimension containing individual samples
/// * `batch_dim` - dimension containing batch items
/// * `config` - α and β
///
pub fn elbo<Q, P>(
    q: &Q,
    p: &P,
    sample_dim: Option<usize>,
    batch_dim: Option<usize>,
    config: &ElboConfig,
) -> Result<LogDensity>
where
    Q: TraceT + ?Sized,
    P: TraceT + ?Sized,
{
    let log_weights = q.log_joint(sample_dim, batch_dim, &q.conditioned())?;
    let lw = Some(&log_weights);

    let llik = log_like(q, p, sample_dim, batch_dim, lw)?;
    let kl_div = kl(q, p, sample_dim, batch_dim, lw)?;
    let ml_term = ml(q, sample_dim, batch_dim, lw)?;

    llik.sub(&kl_div.scale(config.beta)?)?
        .add(&ml_term.scale(config.beta + config.alpha)?)
}
