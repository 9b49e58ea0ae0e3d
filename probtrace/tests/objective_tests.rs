use approx::assert_abs_diff_eq;
use candle_core::{DType, Device, Result, Tensor};

use probtrace::cli::gaussian_model::ConjugateGaussian;
use probtrace::distributions::{DistributionT, Normal};
use probtrace::{elbo, kl, log_like, ml, ElboConfig, LogDensity, RandomVariable, Trace, TraceT};

/// Node with a hand-picked (sample, batch) log-probability
fn fixed_node(log_prob_sb: &[[f64; 2]], observed: bool) -> Result<RandomVariable> {
    let flat: Vec<f64> = log_prob_sb.iter().flatten().copied().collect();
    let log_prob = Tensor::from_vec(flat, (log_prob_sb.len(), 2), &Device::Cpu)?;
    let value = log_prob.zeros_like()?;
    Ok(RandomVariable::from_log_prob(value, log_prob, observed))
}

fn scalar(ld: &LogDensity) -> f64 {
    ld.to_f64().expect("single-element estimate")
}

/// q: y conditioned, z sampled, h sampled (encoder only)
/// p: z sampled, y conditioned, x conditioned
fn semi_supervised_pair() -> Result<(Trace, Trace)> {
    let device = Device::Cpu;
    let (s, b, d) = (6, 4, 3);

    let y_loc = Tensor::randn(0f64, 1f64, (s, b, d), &device)?;
    let ones = Tensor::ones((s, b, d), DType::F64, &device)?;
    let zeros = Tensor::zeros((s, b, d), DType::F64, &device)?;
    let y_obs = Tensor::randn(0f64, 1f64, (b, d), &device)?
        .unsqueeze(0)?
        .broadcast_as((s, b, d))?
        .contiguous()?;

    let mut q = Trace::new();
    q.normal("y", &y_loc, &ones, Some(y_obs.clone()))?;
    let z = q.normal("z", &y_loc, &(&ones * 0.5)?, None)?;
    q.normal("h", &zeros, &ones, None)?;

    let mut p = Trace::new();
    let z_node = q.get("z").expect("z").clone();
    p.rescore("z", &Normal::new(zeros.clone(), ones.clone())?, &z_node)?;
    p.normal("y", &z, &ones, Some(y_obs))?;
    let x = Tensor::randn(0f64, 1f64, (s, b, d), &device)?;
    p.normal("x", &z, &ones, Some(x))?;

    Ok((q, p))
}

#[test]
fn variable_sets_follow_membership() -> Result<()> {
    let (q, p) = semi_supervised_pair()?;
    assert_eq!(q.conditioned(), vec!["y"]);
    assert_eq!(q.sampled(), vec!["z", "h"]);
    assert_eq!(p.sampled(), vec!["z"]);
    assert_eq!(p.conditioned(), vec!["y", "x"]);
    Ok(())
}

#[test]
fn without_sample_dim_objectives_are_plain_means() -> Result<()> {
    let (q, p) = semi_supervised_pair()?;
    let (s, b) = (None, Some(1));

    let log_px = p.log_joint(s, b, &["x"])?.mean()?;
    assert_abs_diff_eq!(scalar(&log_like(&q, &p, s, b, None)?), scalar(&log_px), epsilon = 1e-10);

    let log_qp = q
        .log_joint(s, b, &["y"])?
        .add(&q.log_joint(s, b, &["z"])?)?
        .sub(&p.log_joint(s, b, &["y"])?)?
        .sub(&p.log_joint(s, b, &["z"])?)?
        .mean()?;
    assert_abs_diff_eq!(scalar(&kl(&q, &p, s, b, None)?), scalar(&log_qp), epsilon = 1e-10);

    let log_qy = q.log_joint(s, b, &["y"])?.mean()?;
    assert_abs_diff_eq!(scalar(&ml(&q, s, b, None)?), scalar(&log_qy), epsilon = 1e-10);
    Ok(())
}

#[test]
fn elbo_combines_terms_with_shared_weights() -> Result<()> {
    let (q, p) = semi_supervised_pair()?;
    let (s, b) = (Some(0), Some(1));
    let config = ElboConfig::new(0.3, 2.0);

    let log_weights = q.log_joint(s, b, &q.conditioned())?;
    assert!(!log_weights.is_constant());
    let lw = Some(&log_weights);

    let expected = scalar(&log_like(&q, &p, s, b, lw)?) - config.beta * scalar(&kl(&q, &p, s, b, lw)?)
        + (config.beta + config.alpha) * scalar(&ml(&q, s, b, lw)?);

    let actual = scalar(&elbo(&q, &p, s, b, &config)?);
    assert_abs_diff_eq!(actual, expected, epsilon = 1e-8);
    Ok(())
}

#[test]
fn default_weights_match_supplied_log_qy() -> Result<()> {
    let (q, p) = semi_supervised_pair()?;
    let (s, b) = (Some(0), Some(1));
    let log_qy = q.log_joint(s, b, &["y"])?;

    let implicit = scalar(&log_like(&q, &p, s, b, None)?);
    let explicit = scalar(&log_like(&q, &p, s, b, Some(&log_qy))?);
    assert_abs_diff_eq!(implicit, explicit, epsilon = 1e-10);

    let implicit = scalar(&kl(&q, &p, s, b, None)?);
    let explicit = scalar(&kl(&q, &p, s, b, Some(&log_qy))?);
    assert_abs_diff_eq!(implicit, explicit, epsilon = 1e-10);
    Ok(())
}

#[test]
fn scalar_log_weights_bypass_softmax() -> Result<()> {
    let (q, p) = semi_supervised_pair()?;
    let (s, b) = (Some(0), Some(1));

    let constant = LogDensity::Constant(-3.0);
    let uniform = LogDensity::from(Tensor::zeros((6, 4), DType::F64, &Device::Cpu)?);
    let plain = p.log_joint(s, b, &["x"])?.mean()?;

    let with_constant = scalar(&log_like(&q, &p, s, b, Some(&constant))?);
    let with_uniform = scalar(&log_like(&q, &p, s, b, Some(&uniform))?);
    assert_abs_diff_eq!(with_constant, scalar(&plain), epsilon = 1e-10);
    assert_abs_diff_eq!(with_constant, with_uniform, epsilon = 1e-10);

    // ml hands a constant straight back
    assert_eq!(scalar(&ml(&q, s, b, Some(&constant))?), -3.0);
    Ok(())
}

#[test]
fn importance_weights_select_samples() -> Result<()> {
    // two samples, two batch items; q(y) puts all mass on sample 1
    let mut q = Trace::new();
    q.insert("y", fixed_node(&[[-1e3, -1e3], [0.0, 0.0]], true)?)?;

    let mut p = Trace::new();
    p.insert("x", fixed_node(&[[-10.0, -20.0], [-1.0, -3.0]], true)?)?;

    let est = scalar(&log_like(&q, &p, Some(0), Some(1), None)?);
    assert_abs_diff_eq!(est, -2.0, epsilon = 1e-9);

    // without a sample dimension the samples are summed, not averaged
    let unweighted = scalar(&log_like(&q, &p, None, Some(1), None)?);
    assert_abs_diff_eq!(unweighted, -17.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn kl_changes_sign_when_roles_swap() -> Result<()> {
    let device = Device::Cpu;
    let z = Tensor::randn(0f64, 1f64, (50, 3), &device)?;
    let q_z = Normal::new((z.ones_like()? * 0.7)?, (z.ones_like()? * 0.4)?)?;
    let p_z = Normal::standard((50, 3), DType::F64, &device)?;

    let mut q = Trace::new();
    q.insert("z", RandomVariable::new(&q_z, z.clone(), false)?)?;
    let mut p = Trace::new();
    p.insert("z", RandomVariable::new(&p_z, z, false)?)?;

    let forward = scalar(&kl(&q, &p, Some(0), Some(1), None)?);
    let backward = scalar(&kl(&p, &q, Some(0), Some(1), None)?);
    assert_abs_diff_eq!(forward, -backward, epsilon = 1e-10);
    Ok(())
}

#[test]
fn kl_estimate_converges_to_analytic_gaussian_kl() -> Result<()> {
    let device = Device::Cpu;
    let num_samples = 20_000;

    let loc = Tensor::new(&[1f64], &device)?.broadcast_as((num_samples, 1))?;
    let scale = Tensor::new(&[0.5f64], &device)?.broadcast_as((num_samples, 1))?;
    let q_z = Normal::new(loc, scale)?;
    let p_z = Normal::standard((num_samples, 1), DType::F64, &device)?;

    let mut q = Trace::new();
    let z = q.variable("z", &q_z, None)?;
    let mut p = Trace::new();
    p.insert("z", RandomVariable::new(&p_z, z, false)?)?;

    // no conditioned nodes in q, so the log weights are the constant 0
    let estimate = scalar(&kl(&q, &p, Some(0), Some(1), None)?);
    let analytic = 2f64.ln() + (0.25 + 1.0) / 2.0 - 0.5;
    assert_abs_diff_eq!(estimate, analytic, epsilon = 0.03);

    let element: Vec<Vec<f64>> = q_z.kl_divergence(&p_z)?.to_vec2()?;
    assert_abs_diff_eq!(element[0][0], analytic, epsilon = 1e-12);
    Ok(())
}

#[test]
fn sample_dim_after_batch_dim_is_equivalent() -> Result<()> {
    let device = Device::Cpu;
    let log_px_sb = Tensor::randn(0f64, 1f64, (5, 3), &device)?;
    let log_qy_sb = Tensor::randn(0f64, 1f64, (5, 3), &device)?;

    let build = |lp_x: &Tensor, lp_y: &Tensor| -> Result<(Trace, Trace)> {
        let mut q = Trace::new();
        q.insert("y", RandomVariable::from_log_prob(lp_y.zeros_like()?, lp_y.clone(), true))?;
        let mut p = Trace::new();
        p.insert("x", RandomVariable::from_log_prob(lp_x.zeros_like()?, lp_x.clone(), true))?;
        Ok((q, p))
    };

    let (q, p) = build(&log_px_sb, &log_qy_sb)?;
    let sample_first = scalar(&log_like(&q, &p, Some(0), Some(1), None)?);

    let (q_t, p_t) = build(&log_px_sb.t()?.contiguous()?, &log_qy_sb.t()?.contiguous()?)?;
    let batch_first = scalar(&log_like(&q_t, &p_t, Some(1), Some(0), None)?);

    assert_abs_diff_eq!(sample_first, batch_first, epsilon = 1e-10);
    Ok(())
}

#[test]
fn elbo_is_tight_at_exact_posterior() -> Result<()> {
    let device = Device::Cpu;
    let data = ConjugateGaussian::simulate(16, 2, 0.5, DType::F64, &device)?;
    let (w, s) = data.exact_posterior();

    let weight = (Tensor::ones(2, DType::F64, &device)? * w)?;
    let ln_std = (Tensor::ones(2, DType::F64, &device)? * s.ln())?;
    let (q, _) = data.encode(&weight, &ln_std, 8)?;
    let p = data.decode(&q)?;

    // nothing conditioned in q: ml is the constant 0 and alpha drops out
    let est = elbo(&q, &p, Some(0), Some(1), &ElboConfig::default())?;
    assert_abs_diff_eq!(scalar(&est), data.log_evidence()?, epsilon = 1e-6);
    assert!(ml(&q, Some(0), Some(1), None)?.is_constant());
    Ok(())
}

#[test]
fn objectives_accept_trait_objects() -> Result<()> {
    let (q, p) = semi_supervised_pair()?;
    let q_dyn: &dyn TraceT = &q;
    let p_dyn: &dyn TraceT = &p;
    let a = scalar(&elbo(q_dyn, p_dyn, Some(0), Some(1), &ElboConfig::default())?);
    let b = scalar(&elbo(&q, &p, Some(0), Some(1), &ElboConfig::default())?);
    assert_abs_diff_eq!(a, b, epsilon = 1e-12);

    let y = q.get("y").expect("y");
    let direct = Normal::new(y.value.clone(), y.value.ones_like()?)?;
    assert!(direct.reparameterized());
    Ok(())
}
