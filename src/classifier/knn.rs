use linfa_nn::distance::{Distance, L2Dist};
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour, NearestNeighbourIndex};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{Scored, check_len};
use crate::error::{GestureError, Result};

/// K-Nearest Neighbors classifier with uniform votes and Euclidean distance.
///
/// The reported confidence is the share of the `k` nearest training samples
/// that voted for the winning class.
#[derive(Debug, Serialize, Deserialize)]
pub struct KnnClassifier {
    /// Number of neighbors that vote, already clamped to the training size
    k: usize,
    n_classes: usize,
    x_train: Array2<f32>,
    y_train: Vec<usize>,
}

impl KnnClassifier {
    /// Fits the model by storing the training data.
    ///
    /// `k` larger than the number of samples is reduced to the sample count.
    pub fn fit(k: usize, x: Array2<f32>, y: Vec<usize>, n_classes: usize) -> Result<Self> {
        let (n_samples, _n_features) = x.dim();

        if n_samples == 0 {
            return Err(GestureError::Training("cannot fit with zero samples".into()));
        }
        if y.len() != n_samples {
            return Err(GestureError::Training(
                "number of samples in x and y must match".into(),
            ));
        }
        if k == 0 {
            return Err(GestureError::Training("k must be at least 1".into()));
        }
        if let Some(bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(GestureError::Training(format!(
                "class index {bad} out of range for {n_classes} classes"
            )));
        }

        Ok(Self {
            k: k.min(n_samples),
            n_classes,
            x_train: x,
            y_train: y,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_samples(&self) -> usize {
        self.x_train.nrows()
    }

    /// Check the invariants `fit` establishes, for models read from disk.
    pub fn validate(&self) -> Result<()> {
        let n_samples = self.n_samples();
        if n_samples == 0 || self.n_features() == 0 {
            return Err(GestureError::Artifact("k-NN model has no training data".into()));
        }
        if self.y_train.len() != n_samples {
            return Err(GestureError::Artifact(format!(
                "k-NN model has {} rows but {} labels",
                n_samples,
                self.y_train.len()
            )));
        }
        if self.k == 0 || self.k > n_samples {
            return Err(GestureError::Artifact(format!(
                "k-NN model uses k = {} with {} samples",
                self.k, n_samples
            )));
        }
        if let Some(bad) = self.y_train.iter().find(|&&c| c >= self.n_classes) {
            return Err(GestureError::Artifact(format!(
                "k-NN label {bad} out of range for {} classes",
                self.n_classes
            )));
        }
        if !self.x_train.iter().all(|v| v.is_finite()) {
            return Err(GestureError::Artifact("k-NN training data is not finite".into()));
        }
        Ok(())
    }

    /// Majority vote among the `k` nearest samples.
    ///
    /// Ties between classes go to the one whose voters are closer in total,
    /// then to the lower class index.
    pub fn predict_one(&self, x: &[f32]) -> Result<Scored> {
        check_len(self.n_features(), x.len())?;

        let index = CommonNearestNeighbour::LinearSearch
            .from_batch(&self.x_train, L2Dist)
            .map_err(|e| GestureError::Artifact(format!("cannot index k-NN data: {e}")))?;
        let query = ArrayView1::from(x);
        let neighbours = index
            .k_nearest(query, self.k.min(self.n_samples()))
            .map_err(|e| GestureError::Artifact(format!("k-NN search failed: {e}")))?;

        let mut votes = vec![0usize; self.n_classes];
        let mut spread = vec![0.0f32; self.n_classes];
        let mut counted = 0usize;
        for (point, row) in neighbours.into_iter().take(self.k) {
            let Some(&label) = self.y_train.get(row) else {
                continue;
            };
            if let (Some(vote), Some(total)) = (votes.get_mut(label), spread.get_mut(label)) {
                *vote += 1;
                *total += L2Dist.distance(point, query);
                counted += 1;
            }
        }
        if counted == 0 {
            return Err(GestureError::Artifact("k-NN found no labelled neighbours".into()));
        }

        let mut winner = 0;
        for class in 1..self.n_classes {
            let better = votes[class] > votes[winner]
                || (votes[class] == votes[winner] && spread[class] < spread[winner]);
            if better {
                winner = class;
            }
        }

        Ok(Scored {
            class: winner,
            confidence: votes[winner] as f32 / counted as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn two_clusters() -> (Array2<f32>, Vec<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [5.0, 5.0],
            [5.0, 6.0],
            [6.0, 5.0],
        ];
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn votes_for_closest_cluster() {
        let (x, y) = two_clusters();
        let knn = KnnClassifier::fit(3, x, y, 2).unwrap();

        let near_zero = knn.predict_one(&[0.5, 0.5]).unwrap();
        assert_eq!(near_zero.class, 0);
        assert_relative_eq!(near_zero.confidence, 1.0);

        let near_one = knn.predict_one(&[5.5, 5.5]).unwrap();
        assert_eq!(near_one.class, 1);
    }

    #[test]
    fn confidence_is_vote_share() {
        let (x, y) = two_clusters();
        let knn = KnnClassifier::fit(5, x, y, 2).unwrap();

        // 3 of class 0 and 2 of class 1 among the 5 nearest
        let scored = knn.predict_one(&[1.0, 1.0]).unwrap();
        assert_eq!(scored.class, 0);
        assert_relative_eq!(scored.confidence, 0.6);
    }

    #[test]
    fn k_is_clamped_to_training_size() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let knn = KnnClassifier::fit(3, x, vec![0, 1], 2).unwrap();
        assert_eq!(knn.k(), 2);
        assert!(knn.validate().is_ok());
    }

    #[test]
    fn rejects_wrong_feature_length() {
        let (x, y) = two_clusters();
        let knn = KnnClassifier::fit(3, x, y, 2).unwrap();
        assert!(knn.predict_one(&[0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn validate_rejects_inconsistent_fields() {
        let (x, y) = two_clusters();
        let mut knn = KnnClassifier::fit(3, x, y, 2).unwrap();
        assert!(knn.validate().is_ok());

        knn.k = 50;
        assert!(knn.validate().is_err());
        // Still answers without indexing past the training data
        assert!(knn.predict_one(&[0.5, 0.5]).is_ok());

        knn.k = 3;
        knn.y_train[0] = 7;
        assert!(knn.validate().is_err());

        knn.y_train.pop();
        assert!(knn.validate().is_err());
    }
}
