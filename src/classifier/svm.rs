use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use linfa::Dataset;
use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa_svm::Svm;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::{Scored, check_len};
use crate::config::SvmConfig;
use crate::error::{GestureError, Result};

/// Multi-class RBF-kernel SVM.
///
/// One probability machine per class (one-vs-rest). Each machine reports a
/// Platt-calibrated probability for its class; the per-class probabilities
/// are normalized to sum to one.
#[derive(Serialize, Deserialize)]
pub struct KernelSvm {
    n_features: usize,
    gamma: f32,
    machines: Vec<Svm<f32, Pr>>,
}

impl fmt::Debug for KernelSvm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSvm")
            .field("n_features", &self.n_features)
            .field("gamma", &self.gamma)
            .field("machines", &self.machines.len())
            .finish()
    }
}

impl KernelSvm {
    /// Train on `x` (`n_samples x n_features`) with class indices `y`.
    ///
    /// Every class in `0..n_classes` needs at least one sample, and there
    /// must be at least two classes.
    pub fn fit(params: &SvmConfig, x: &Array2<f32>, y: &[usize], n_classes: usize) -> Result<Self> {
        let (n_samples, n_features) = x.dim();

        if n_samples == 0 || n_features == 0 {
            return Err(GestureError::Training("cannot fit with an empty matrix".into()));
        }
        if y.len() != n_samples {
            return Err(GestureError::Training(
                "number of samples in x and y must match".into(),
            ));
        }
        if n_classes < 2 {
            return Err(GestureError::Training("need at least two classes".into()));
        }
        let mut per_class = vec![0usize; n_classes];
        for &class in y {
            let slot = per_class.get_mut(class).ok_or_else(|| {
                GestureError::Training(format!(
                    "class index {class} out of range for {n_classes} classes"
                ))
            })?;
            *slot += 1;
        }
        if let Some(empty) = per_class.iter().position(|&c| c == 0) {
            return Err(GestureError::Training(format!("class {empty} has no samples")));
        }

        let gamma = params.gamma.unwrap_or_else(|| scale_gamma(x));
        tracing::debug!(
            "Fitting RBF SVM: {} samples, {} features, {} classes, gamma {:.6}",
            n_samples, n_features, n_classes, gamma
        );

        let machines = (0..n_classes)
            .map(|class| {
                let targets: Array1<bool> = y.iter().map(|&c| c == class).collect();
                let dataset = Dataset::new(x.clone(), targets);
                Svm::<f32, Pr>::params()
                    .pos_neg_weights(params.c, params.c)
                    .eps(params.tolerance)
                    .shrinking(params.shrinking)
                    // linfa's gaussian kernel is exp(-|a-b|^2 / eps)
                    .gaussian_kernel(1.0 / gamma)
                    .fit(&dataset)
                    .map_err(|e| GestureError::Training(format!("SVM for class {class}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            n_features,
            gamma,
            machines,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.machines.len()
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Check that a deserialized model can actually score vectors.
    ///
    /// The solver state inside each machine is opaque, so a zero vector is
    /// scored once and any panic or non-finite output rejects the model.
    pub fn validate(&self) -> Result<()> {
        if self.n_features == 0 {
            return Err(GestureError::Artifact("SVM has no features".into()));
        }
        if self.machines.len() < 2 {
            return Err(GestureError::Artifact(format!(
                "SVM needs at least two class machines, has {}",
                self.machines.len()
            )));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(GestureError::Artifact(format!("SVM gamma {} is not usable", self.gamma)));
        }

        let zeros = vec![0.0f32; self.n_features];
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.raw_probabilities(&zeros)));
        match outcome {
            Ok(Ok(raw)) if raw.iter().all(|p| p.is_finite()) => Ok(()),
            Ok(Ok(_)) => Err(GestureError::Artifact("SVM produces non-finite scores".into())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GestureError::Artifact(
                "SVM machines do not match the stored feature length".into(),
            )),
        }
    }

    /// Normalized class probabilities for one sample.
    pub fn predict_proba(&self, x: &[f32]) -> Result<Vec<f32>> {
        check_len(self.n_features, x.len())?;

        let mut probs: Vec<f32> = self
            .raw_probabilities(x)?
            .into_iter()
            .map(|p| if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 })
            .collect();

        let total: f32 = probs.iter().sum();
        if total > f32::EPSILON {
            probs.iter_mut().for_each(|p| *p /= total);
        } else {
            let uniform = 1.0 / probs.len() as f32;
            probs.iter_mut().for_each(|p| *p = uniform);
        }
        Ok(probs)
    }

    /// Most probable class; ties go to the lower class index.
    pub fn predict_one(&self, x: &[f32]) -> Result<Scored> {
        let probs = self.predict_proba(x)?;
        let mut winner = 0;
        let mut best = f32::NEG_INFINITY;
        for (class, &p) in probs.iter().enumerate() {
            if p > best {
                winner = class;
                best = p;
            }
        }
        Ok(Scored {
            class: winner,
            confidence: best.clamp(0.0, 1.0),
        })
    }

    /// Calibrated probability of each machine's own class, not normalized.
    fn raw_probabilities(&self, x: &[f32]) -> Result<Vec<f32>> {
        let batch = Array2::from_shape_vec((1, x.len()), x.to_vec())
            .map_err(|e| GestureError::InvalidPayload(format!("bad feature vector: {e}")))?;

        Ok(self
            .machines
            .iter()
            .map(|machine| {
                let scored: Array1<Pr> = machine.predict(&batch);
                scored.first().map(|p| **p).unwrap_or(0.0)
            })
            .collect())
    }
}

/// `1 / (n_features * var(x))`, falling back to `1 / n_features` for
/// constant input.
fn scale_gamma(x: &Array2<f32>) -> f32 {
    let n_features = x.ncols().max(1) as f64;
    let count = x.len().max(1) as f64;
    let mean = x.iter().map(|&v| v as f64).sum::<f64>() / count;
    let var = x.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / count;
    if var > 1e-12 {
        (1.0 / (n_features * var)) as f32
    } else {
        (1.0 / n_features) as f32
    }
}
