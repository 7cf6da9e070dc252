//! Seeded k-means with k-means++ initialisation.

use rand::{Rng as _, rngs::StdRng};

use crate::Coordinate;

/// Outcome of one k-means run.
#[derive(Debug, Clone)]
pub struct KMeansRun {
    /// Final centers, index = zone id.
    pub centers: Vec<Coordinate>,
    /// Sum of squared distances of every point to its center.
    pub inertia: f64,
    /// Lloyd iterations performed.
    pub iterations: usize,
}

/// Index of the nearest center and its squared distance.
///
/// Linear scan; on an exact tie the lowest index wins. Both fitting and
/// assignment go through this function so they can never disagree.
#[must_use]
pub fn nearest(centers: &[Coordinate], point: Coordinate) -> (usize, f64) {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = point.distance_squared(*center);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    (best, best_distance)
}

/// Runs k-means `n_init` times and keeps the run with the lowest inertia.
/// Ties keep the earlier run.
///
/// The caller guarantees `points` holds at least `k` distinct coordinates
/// and that `k`, `n_init` are non-zero.
pub fn fit_best(
    points: &[Coordinate],
    k: usize,
    n_init: u32,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut StdRng,
) -> KMeansRun {
    let mut best: Option<KMeansRun> = None;

    for run_index in 0..n_init {
        let seeds = init_plus_plus(points, k, rng);
        let run = lloyd(points, seeds, max_iterations, tolerance);
        log::debug!(
            "k-means run {}/{n_init}: inertia={:.6} after {} iterations",
            run_index + 1,
            run.inertia,
            run.iterations
        );
        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    best.unwrap_or_else(|| KMeansRun {
        centers: Vec::new(),
        inertia: 0.0,
        iterations: 0,
    })
}

/// k-means++ seeding: the first center is uniform, each following one is
/// drawn with probability proportional to its squared distance from the
/// closest center chosen so far.
fn init_plus_plus(points: &[Coordinate], k: usize, rng: &mut StdRng) -> Vec<Coordinate> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| p.distance_squared(centers[0]))
        .collect();

    while centers.len() < k {
        let total: f64 = distances.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|d| {
                    cumulative += d;
                    cumulative > target
                })
                .or_else(|| distances.iter().rposition(|d| *d > 0.0))
                .unwrap_or(0)
        } else {
            rng.gen_range(0..points.len())
        };

        let center = points[chosen];
        centers.push(center);
        for (d, p) in distances.iter_mut().zip(points) {
            *d = d.min(p.distance_squared(center));
        }
    }

    centers
}

/// Lloyd iterations until no center moves more than `tolerance`.
fn lloyd(
    points: &[Coordinate],
    mut centers: Vec<Coordinate>,
    max_iterations: usize,
    tolerance: f64,
) -> KMeansRun {
    let k = centers.len();
    let mut labels = vec![0usize; points.len()];
    let mut distances = vec![0.0f64; points.len()];
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        assign_all(points, &centers, &mut labels, &mut distances);

        let mut sums = vec![(0.0f64, 0.0f64, 0usize); k];
        for (p, &label) in points.iter().zip(&labels) {
            let entry = &mut sums[label];
            entry.0 += p.latitude;
            entry.1 += p.longitude;
            entry.2 += 1;
        }

        let mut updated = Vec::with_capacity(k);
        for (i, (lat, lon, n)) in sums.into_iter().enumerate() {
            if n == 0 {
                updated.push(reseed_empty(points, &mut distances, centers[i]));
            } else {
                #[allow(clippy::cast_precision_loss)]
                let count = n as f64;
                updated.push(Coordinate::new(lat / count, lon / count));
            }
        }

        let shift = centers
            .iter()
            .zip(&updated)
            .map(|(a, b)| a.distance_squared(*b).sqrt())
            .fold(0.0, f64::max);
        centers = updated;

        if shift <= tolerance {
            break;
        }
    }

    assign_all(points, &centers, &mut labels, &mut distances);
    let inertia = distances.iter().sum();

    KMeansRun {
        centers,
        inertia,
        iterations,
    }
}

fn assign_all(
    points: &[Coordinate],
    centers: &[Coordinate],
    labels: &mut [usize],
    distances: &mut [f64],
) {
    for ((p, label), distance) in points.iter().zip(labels).zip(distances) {
        let (index, d) = nearest(centers, *p);
        *label = index;
        *distance = d;
    }
}

/// Moves an empty cluster onto the point farthest from its current center.
/// That point's distance is zeroed so a second empty cluster in the same
/// iteration picks a different one.
fn reseed_empty(points: &[Coordinate], distances: &mut [f64], fallback: Coordinate) -> Coordinate {
    let farthest = distances
        .iter()
        .enumerate()
        .fold(None, |acc: Option<(usize, f64)>, (i, &d)| match acc {
            Some((_, best)) if best >= d => acc,
            _ => Some((i, d)),
        });

    match farthest {
        Some((i, d)) if d > 0.0 => {
            distances[i] = 0.0;
            points[i]
        }
        _ => fallback,
    }
}
