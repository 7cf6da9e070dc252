//! Seeded sampling, splitting, and random forest fitting shared by both
//! models.

use rand::{SeedableRng as _, rngs::StdRng, seq::SliceRandom as _};
use smartcore::{
    ensemble::random_forest_classifier::{
        RandomForestClassifier, RandomForestClassifierParameters,
    },
    linalg::basic::matrix::DenseMatrix,
};

use crate::{ForestParams, ModelError, TrainingMetrics};

/// The concrete learner behind both models.
pub type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Seeded subsample of row indices, in ascending order. Everything is kept
/// when there is no cap or the cap is not below `len`.
pub fn sample_indices(len: usize, cap: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    match cap {
        Some(cap) if cap < len => {
            let mut indices = rand::seq::index::sample(rng, len, cap).into_vec();
            indices.sort_unstable();
            indices
        }
        _ => (0..len).collect(),
    }
}

/// Seeded shuffle split into `(train, test)`.
///
/// The test side gets `ceil(len * fraction)` rows, but never so many that
/// the training side is empty.
pub fn split(
    mut indices: Vec<usize>,
    test_fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    if test_fraction <= 0.0 || indices.len() < 2 {
        return (indices, Vec::new());
    }
    indices.shuffle(rng);

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let wanted = (indices.len() as f64 * test_fraction).ceil() as usize;
    let test_len = wanted.min(indices.len() - 1);

    let train = indices.split_off(test_len);
    (train, indices)
}

/// Share of positions where `predicted` equals `truth`.
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(predicted: &[u32], truth: &[u32]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    hits as f64 / truth.len() as f64
}

fn matrix(rows: &[&Vec<f64>]) -> DenseMatrix<f64> {
    let owned: Vec<Vec<f64>> = rows.iter().map(|r| (*r).clone()).collect();
    DenseMatrix::from_2d_vec(&owned)
}

/// Fits a forest on `features`/`labels` and measures it on a held-out split.
///
/// # Errors
///
/// * [`ModelError::InvalidParameters`] for unusable parameters
/// * [`ModelError::InsufficientData`] with fewer than two rows
/// * [`ModelError::Learner`] if the learner fails
pub fn train(
    features: &[Vec<f64>],
    labels: &[u32],
    params: &ForestParams,
    what: &str,
) -> Result<(Forest, TrainingMetrics), ModelError> {
    params.validate()?;
    if features.len() != labels.len() {
        return Err(ModelError::InvalidParameters {
            message: format!(
                "{} feature rows for {} labels",
                features.len(),
                labels.len()
            ),
        });
    }
    if features.len() < 2 {
        return Err(ModelError::InsufficientData {
            message: format!("{what} needs at least 2 rows, got {}", features.len()),
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let sampled = sample_indices(features.len(), params.sample_cap, &mut rng);
    let (train_idx, test_idx) = split(sampled, params.test_fraction, &mut rng);

    log::info!(
        "Training {what}: {} trees, max depth {}, {} train / {} test rows",
        params.trees,
        params.max_depth,
        train_idx.len(),
        test_idx.len()
    );

    let train_x: Vec<&Vec<f64>> = train_idx.iter().map(|&i| &features[i]).collect();
    let train_y: Vec<u32> = train_idx.iter().map(|&i| labels[i]).collect();
    let x = matrix(&train_x);

    let parameters = RandomForestClassifierParameters::default()
        .with_n_trees(params.trees)
        .with_max_depth(params.max_depth)
        .with_seed(params.seed);
    let forest = Forest::fit(&x, &train_y, parameters).map_err(|e| ModelError::Learner {
        message: e.to_string(),
    })?;

    let train_pred = predict_matrix(&forest, &x)?;
    let train_accuracy = accuracy(&train_pred, &train_y);

    let test_accuracy = if test_idx.is_empty() {
        None
    } else {
        let test_x: Vec<&Vec<f64>> = test_idx.iter().map(|&i| &features[i]).collect();
        let test_y: Vec<u32> = test_idx.iter().map(|&i| labels[i]).collect();
        let test_pred = predict_matrix(&forest, &matrix(&test_x))?;
        Some(accuracy(&test_pred, &test_y))
    };

    log::info!(
        "{what} accuracy: train {train_accuracy:.4}, test {}",
        test_accuracy.map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}"))
    );

    let metrics = TrainingMetrics {
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        train_accuracy,
        test_accuracy,
        trained_at: chrono::Utc::now().to_rfc3339(),
    };
    Ok((forest, metrics))
}

fn predict_matrix(forest: &Forest, x: &DenseMatrix<f64>) -> Result<Vec<u32>, ModelError> {
    forest.predict(x).map_err(|e| ModelError::Learner {
        message: e.to_string(),
    })
}

/// Predicts the label of one feature row.
///
/// # Errors
///
/// Returns [`ModelError::Learner`] if the learner fails.
pub fn predict_one(forest: &Forest, values: &[f64]) -> Result<u32, ModelError> {
    let x = DenseMatrix::from_2d_vec(&vec![values.to_vec()]);
    predict_matrix(forest, &x)?
        .first()
        .copied()
        .ok_or_else(|| ModelError::Learner {
            message: "learner returned no prediction".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_seeded_sorted_and_capped() {
        let a = sample_indices(100, Some(10), &mut StdRng::seed_from_u64(42));
        let b = sample_indices(100, Some(10), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(sample_indices(5, Some(10), &mut StdRng::seed_from_u64(1)).len(), 5);
        assert_eq!(sample_indices(5, None, &mut StdRng::seed_from_u64(1)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn split_holds_out_a_fifth() {
        let (train, test) = split((0..100).collect(), 0.2, &mut StdRng::seed_from_u64(42));
        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn split_never_empties_training_side() {
        let (train, test) = split(vec![0, 1], 0.9, &mut StdRng::seed_from_u64(3));
        assert_eq!((train.len(), test.len()), (1, 1));

        let (train, test) = split(vec![0, 1, 2], 0.0, &mut StdRng::seed_from_u64(3));
        assert_eq!((train.len(), test.len()), (3, 0));
    }

    #[test]
    fn accuracy_counts_matches() {
        assert!((accuracy(&[1, 2, 3, 4], &[1, 2, 0, 4]) - 0.75).abs() < 1e-12);
        assert!(accuracy(&[], &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn too_few_rows_is_insufficient_data() {
        let err = train(&[vec![1.0]], &[0], &ForestParams::category(), "test model").unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData { .. }));
    }
}
