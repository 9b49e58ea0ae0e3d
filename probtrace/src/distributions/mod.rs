//! Distributions used to populate traces.

mod bernoulli;
mod categorical;
mod normal;
mod traits;

pub use bernoulli::Bernoulli;
pub use categorical::Categorical;
pub use normal::Normal;
pub use traits::DistributionT;

use candle_core::DType;

/// Smallest probability before taking logs; `1 - eps` must stay below 1
/// in `dtype`
pub(crate) fn prob_eps(dtype: DType) -> f64 {
    match dtype {
        DType::F64 => 1e-8,
        DType::F32 => 1e-6,
        _ => 1e-2,
    }
}
