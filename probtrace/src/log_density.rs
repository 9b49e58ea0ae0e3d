use candle_core::{DType, Result, Tensor};

/// Joint log-density returned by `TraceT::log_joint`.
///
/// An empty node set has no sample-level variation and yields a plain
/// constant; everything else is a tensor shaped by the kept sample/batch
/// dimensions (sample dimension first).
#[derive(Clone, Debug)]
pub enum LogDensity {
    Constant(f64),
    Tensor(Tensor),
}

impl LogDensity {
    pub fn zero() -> Self {
        LogDensity::Constant(0.0)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, LogDensity::Constant(_))
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            LogDensity::Tensor(t) => Some(t),
            LogDensity::Constant(_) => None,
        }
    }

    /// self + other, broadcasting tensors of different shape
    pub fn add(&self, other: &LogDensity) -> Result<LogDensity> {
        Ok(match (self, other) {
            (LogDensity::Constant(a), LogDensity::Constant(b)) => LogDensity::Constant(a + b),
            (LogDensity::Tensor(a), LogDensity::Constant(b))
            | (LogDensity::Constant(b), LogDensity::Tensor(a)) => LogDensity::Tensor((a + *b)?),
            (LogDensity::Tensor(a), LogDensity::Tensor(b)) => {
                LogDensity::Tensor(a.broadcast_add(b)?)
            }
        })
    }

    /// self - other, broadcasting tensors of different shape
    pub fn sub(&self, other: &LogDensity) -> Result<LogDensity> {
        self.add(&other.scale(-1.0)?)
    }

    /// c * self
    pub fn scale(&self, c: f64) -> Result<LogDensity> {
        Ok(match self {
            LogDensity::Constant(a) => LogDensity::Constant(c * a),
            LogDensity::Tensor(t) => LogDensity::Tensor((t * c)?),
        })
    }

    /// Mean over all elements. A constant is its own mean.
    pub fn mean(&self) -> Result<LogDensity> {
        Ok(match self {
            LogDensity::Constant(a) => LogDensity::Constant(*a),
            LogDensity::Tensor(t) => LogDensity::Tensor(t.mean_all()?),
        })
    }

    /// Read a single-element log-density back as `f64`
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            LogDensity::Constant(a) => Ok(*a),
            LogDensity::Tensor(t) => {
                if t.elem_count() != 1 {
                    return Err(candle_core::Error::Msg(format!(
                        "expected a single-element log-density, got shape {:?}",
                        t.dims()
                    )));
                }
                t.flatten_all()?
                    .to_dtype(DType::F64)?
                    .get(0)?
                    .to_scalar::<f64>()
            }
        }
    }

    /// Materialize as a tensor, using `like` for device and dtype when the
    /// value is a constant
    pub fn to_tensor(&self, like: &Tensor) -> Result<Tensor> {
        match self {
            LogDensity::Tensor(t) => Ok(t.clone()),
            LogDensity::Constant(a) => {
                Tensor::new(*a, like.device())?.to_dtype(like.dtype())
            }
        }
    }
}

impl From<Tensor> for LogDensity {
    fn from(t: Tensor) -> Self {
        LogDensity::Tensor(t)
    }
}

impl From<f64> for LogDensity {
    fn from(a: f64) -> Self {
        LogDensity::Constant(a)
    }
}
