use candle_core::{DType, Device, Result, Shape, Tensor};

use super::traits::DistributionT;

/// Element-wise Gaussian N(μ, σ²)
///
/// `loc` and `scale` may have different shapes as long as they broadcast.
#[derive(Clone, Debug)]
pub struct Normal {
    loc: Tensor,
    scale: Tensor,
}

impl Normal {
    pub fn new(loc: Tensor, scale: Tensor) -> Result<Self> {
        loc.shape()
            .broadcast_shape_binary_op(scale.shape(), "normal")?;
        Ok(Self { loc, scale })
    }

    /// N(0, 1) with the given shape
    pub fn standard<S: Into<Shape>>(shape: S, dtype: DType, device: &Device) -> Result<Self> {
        let shape = shape.into();
        let loc = Tensor::zeros(shape.clone(), dtype, device)?;
        let scale = Tensor::ones(shape, dtype, device)?;
        Ok(Self { loc, scale })
    }

    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    pub fn scale(&self) -> &Tensor {
        &self.scale
    }

    fn shape(&self) -> Result<Shape> {
        self.loc
            .shape()
            .broadcast_shape_binary_op(self.scale.shape(), "normal")
    }

    /// Analytic KL(self || other), element-wise
    ///
    /// ln(σ₂/σ₁) + (σ₁² + (μ₁ - μ₂)²) / (2σ₂²) - 1/2
    ///
    pub fn kl_divergence(&self, other: &Normal) -> Result<Tensor> {
        let var_1 = self.scale.sqr()?;
        let var_2 = other.scale.sqr()?;
        let log_ratio = other.scale.log()?.broadcast_sub(&self.scale.log()?)?;
        let mean_sq = self.loc.broadcast_sub(&other.loc)?.sqr()?;
        let quad = mean_sq.broadcast_add(&var_1)?.broadcast_div(&(var_2 * 2.0)?)?;
        log_ratio.broadcast_add(&quad)? - 0.5
    }
}

impl DistributionT for Normal {
    /// θ = μ + σ * ε where ε ~ N(0, I)
    fn sample(&self) -> Result<Tensor> {
        let shape = self.shape()?;
        let device = self.loc.device();
        let dtype = self.loc.dtype();
        let epsilon = Tensor::randn(0f32, 1f32, shape, device)?.to_dtype(dtype)?;
        self.loc.broadcast_add(&epsilon.broadcast_mul(&self.scale)?)
    }

    /// log N(x; μ, σ²) = -0.5 * (x-μ)²/σ² - ln(σ) - 0.5 * ln(2π)
    fn log_prob(&self, value: &Tensor) -> Result<Tensor> {
        let half_ln_2pi = 0.5 * (2.0 * std::f64::consts::PI).ln();
        let z_sq = value
            .broadcast_sub(&self.loc)?
            .broadcast_div(&self.scale)?
            .sqr()?;
        (z_sq * (-0.5))?.broadcast_sub(&self.scale.log()?)? - half_ln_2pi
    }

    fn reparameterized(&self) -> bool {
        true
    }
}
