//! Resampling of variable-length current traces onto a fixed grid.
//!
//! A trace of `n` samples is treated as values at `x = 0..n` and evaluated at
//! `target` evenly spaced points spanning `[0, n - 1]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpKind {
    Linear,
    Slinear,
    Nearest,
    NearestUp,
    Zero,
    Previous,
    Next,
    Cubic,
}

impl FromStr for InterpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(InterpKind::Linear),
            "slinear" | "1" => Ok(InterpKind::Slinear),
            "nearest" => Ok(InterpKind::Nearest),
            "nearest-up" | "nearest_up" => Ok(InterpKind::NearestUp),
            "zero" | "0" => Ok(InterpKind::Zero),
            "previous" => Ok(InterpKind::Previous),
            "next" => Ok(InterpKind::Next),
            "cubic" | "3" => Ok(InterpKind::Cubic),
            _ => Err(Error::UnsupportedInterpolation(s.to_string())),
        }
    }
}

impl fmt::Display for InterpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpKind::Linear => "linear",
            InterpKind::Slinear => "slinear",
            InterpKind::Nearest => "nearest",
            InterpKind::NearestUp => "nearest-up",
            InterpKind::Zero => "zero",
            InterpKind::Previous => "previous",
            InterpKind::Next => "next",
            InterpKind::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

/// Resample `samples` to exactly `target` points.
///
/// An empty input yields an empty output; a single sample is repeated.
pub fn resample(samples: &[f32], target: usize, kind: InterpKind) -> Vec<f32> {
    let n = samples.len();
    if n == 0 || target == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![samples[0]; target];
    }

    let step = if target > 1 { (n - 1) as f64 / (target - 1) as f64 } else { 0.0 };
    let xs = (0..target).map(|i| (i as f64 * step).min((n - 1) as f64));

    match kind {
        InterpKind::Cubic => {
            let m = natural_spline_moments(samples);
            xs.map(|x| eval_spline(samples, &m, x) as f32).collect()
        }
        _ => xs.map(|x| eval_piecewise(samples, x, kind)).collect(),
    }
}

fn eval_piecewise(y: &[f32], x: f64, kind: InterpKind) -> f32 {
    let last = y.len() - 1;
    let lo = (x.floor() as usize).min(last);
    let hi = (x.ceil() as usize).min(last);
    let frac = x - lo as f64;
    match kind {
        InterpKind::Linear | InterpKind::Slinear => {
            if lo == hi {
                y[lo]
            } else {
                (y[lo] as f64 + (y[hi] as f64 - y[lo] as f64) * frac) as f32
            }
        }
        // half-way points round down
        InterpKind::Nearest => if frac > 0.5 { y[hi] } else { y[lo] },
        InterpKind::NearestUp => if frac >= 0.5 { y[hi] } else { y[lo] },
        InterpKind::Zero | InterpKind::Previous => y[lo],
        InterpKind::Next => y[hi],
        InterpKind::Cubic => unreachable!("cubic is evaluated through the spline path"),
    }
}

/// Second derivatives of the natural cubic spline through `(i, y[i])`.
fn natural_spline_moments(y: &[f32]) -> Vec<f64> {
    let n = y.len();
    let mut m = vec![0.0f64; n];
    if n < 3 {
        return m;
    }
    // Thomas algorithm on the unit-spaced tridiagonal system 1·m[i-1] + 4·m[i] + 1·m[i+1] = 6·Δ²y
    let inner = n - 2;
    let mut c = vec![0.0f64; inner];
    let mut d = vec![0.0f64; inner];
    for k in 0..inner {
        let i = k + 1;
        let rhs = 6.0 * (y[i + 1] as f64 - 2.0 * y[i] as f64 + y[i - 1] as f64);
        if k == 0 {
            c[k] = 1.0 / 4.0;
            d[k] = rhs / 4.0;
        } else {
            let denom = 4.0 - c[k - 1];
            c[k] = 1.0 / denom;
            d[k] = (rhs - d[k - 1]) / denom;
        }
    }
    for k in (0..inner).rev() {
        let next = if k + 1 < inner { m[k + 2] } else { 0.0 };
        m[k + 1] = d[k] - c[k] * next;
    }
    m
}

fn eval_spline(y: &[f32], m: &[f64], x: f64) -> f64 {
    let last = y.len() - 1;
    let i = (x.floor() as usize).min(last - 1);
    let t = x - i as f64;
    let (y0, y1) = (y[i] as f64, y[i + 1] as f64);
    let (m0, m1) = (m[i], m[i + 1]);
    let a = 1.0 - t;
    a * y0 + t * y1 + ((a * a * a - a) * m0 + (t * t * t - t) * m1) / 6.0
}
