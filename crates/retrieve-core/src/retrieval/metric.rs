//! Distance metrics between embedding vectors.
//!
//! Names follow the scipy `cdist` vocabulary so experiment configs carry over.

use crate::error::RetrievalError;
use crate::math::{dot, l2_norm};

/// A distance function over equally sized `f32` vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Euclidean,
    SqEuclidean,
    Minkowski { p: f64 },
    Cityblock,
    Chebyshev,
    /// `1 - cos(u, v)`; `1.0` when either vector has zero norm
    Cosine,
}

impl Metric {
    /// Parse a metric name. `p` is only used by `minkowski`.
    pub fn parse(name: &str, p: f64) -> Result<Self, RetrievalError> {
        match name.to_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "sqeuclidean" => Ok(Self::SqEuclidean),
            "minkowski" => Ok(Self::Minkowski { p }),
            "cityblock" | "manhattan" | "l1" => Ok(Self::Cityblock),
            "chebyshev" => Ok(Self::Chebyshev),
            "cosine" => Ok(Self::Cosine),
            _ => Err(RetrievalError::UnknownMetric(name.to_string())),
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::SqEuclidean => "sqeuclidean",
            Self::Minkowski { .. } => "minkowski",
            Self::Cityblock => "cityblock",
            Self::Chebyshev => "chebyshev",
            Self::Cosine => "cosine",
        }
    }

    /// Distance between `a` and `b`. Callers guarantee equal lengths.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match *self {
            Self::Euclidean => sq_euclidean(a, b).sqrt() as f32,
            Self::SqEuclidean => sq_euclidean(a, b) as f32,
            Self::Minkowski { p } if p == 1.0 => cityblock(a, b) as f32,
            Self::Minkowski { p } if p == 2.0 => sq_euclidean(a, b).sqrt() as f32,
            Self::Minkowski { p } if p.is_infinite() => chebyshev(a, b),
            Self::Minkowski { p } => a
                .iter()
                .zip(b)
                .map(|(x, y)| ((x - y).abs() as f64).powf(p))
                .sum::<f64>()
                .powf(1.0 / p) as f32,
            Self::Cityblock => cityblock(a, b) as f32,
            Self::Chebyshev => chebyshev(a, b),
            Self::Cosine => {
                let (na, nb) = (l2_norm(a), l2_norm(b));
                if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    1.0 - dot(a, b) / (na * nb)
                }
            }
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minkowski { p } => write!(f, "minkowski(p={p})"),
            other => f.write_str(other.name()),
        }
    }
}

fn sq_euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum()
}

fn cityblock(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs() as f64).sum()
}

fn chebyshev(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}
