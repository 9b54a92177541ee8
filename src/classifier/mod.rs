//! Classifiers for the two feature families.
//!
//! The pixel family uses an RBF-kernel SVM (linfa-svm, one-vs-rest,
//! calibrated probabilities); the landmark family uses k-nearest-neighbour
//! voting over a linfa-nn index.
//! [`FamilyModel`] ties each classifier to its family so a vector from one
//! family can never be scored by the other's model.

pub mod knn;
pub mod svm;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{GestureError, Result};
use crate::models::{Family, FeatureVector};

pub use knn::KnnClassifier;
pub use svm::KernelSvm;

/// Winning class index with its confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub class: usize,
    pub confidence: f32,
}

/// A fitted classifier, bound to exactly one feature family.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FamilyModel {
    /// Confidence is the calibrated probability of the winning class.
    Pixel(KernelSvm),
    /// Confidence is the fraction of neighbours voting for the winner.
    Landmark(KnnClassifier),
}

impl FamilyModel {
    pub fn family(&self) -> Family {
        match self {
            FamilyModel::Pixel(_) => Family::Pixel,
            FamilyModel::Landmark(_) => Family::Landmark,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            FamilyModel::Pixel(svm) => svm.n_features(),
            FamilyModel::Landmark(knn) => knn.n_features(),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            FamilyModel::Pixel(svm) => svm.n_classes(),
            FamilyModel::Landmark(knn) => knn.n_classes(),
        }
    }

    /// Internal consistency of a classifier read back from disk.
    pub fn validate(&self) -> Result<()> {
        match self {
            FamilyModel::Pixel(svm) => svm.validate(),
            FamilyModel::Landmark(knn) => knn.validate(),
        }
    }

    /// Score one vector of this model's family.
    pub fn score(&self, vector: &FeatureVector) -> Result<Scored> {
        if vector.family() != self.family() {
            return Err(GestureError::FamilyMismatch {
                expected: self.family(),
                found: vector.family(),
            });
        }
        match self {
            FamilyModel::Pixel(svm) => svm.predict_one(vector.as_slice()),
            FamilyModel::Landmark(knn) => knn.predict_one(vector.as_slice()),
        }
    }
}

/// Stack equally sized rows into an `n x d` matrix.
pub fn stack_rows<'a, I>(rows: I, n_features: usize) -> Result<Array2<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut flat = Vec::new();
    let mut n_rows = 0;
    for row in rows {
        check_len(n_features, row.len())?;
        flat.extend_from_slice(row);
        n_rows += 1;
    }
    Array2::from_shape_vec((n_rows, n_features), flat)
        .map_err(|e| GestureError::Training(format!("bad training matrix: {e}")))
}

pub(crate) fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(GestureError::InvalidPayload(format!(
            "feature length mismatch: model expects {expected}, got {got}"
        )));
    }
    Ok(())
}
