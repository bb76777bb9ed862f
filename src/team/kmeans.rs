//! K-means clustering with k-means++ seeding and restarts.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand::rngs::StdRng;

#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    pub k: usize,
    /// Independent restarts; the run with the lowest inertia wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold on total squared centroid movement, relative
    /// to the mean per-feature variance of the data
    pub tol: f32,
}

/// A fitted k-means model.
#[derive(Debug, Clone)]
pub struct KMeans {
    centroids: Array2<f32>,
    inertia: f32,
}

impl KMeans {
    /// Fit `params.k` clusters to the rows of `data`.
    ///
    /// Returns `None` when there are fewer rows than clusters.
    pub fn fit(data: ArrayView2<f32>, params: &KMeansParams, rng: &mut StdRng) -> Option<Self> {
        if params.k == 0 || data.nrows() < params.k {
            return None;
        }
        let tol = params.tol * mean_variance(data);

        (0..params.n_init.max(1))
            .map(|_| {
                let init = kmeans_plus_plus(data, params.k, rng);
                lloyd(data, init, params.max_iter, tol)
            })
            .fold(None, |best: Option<KMeans>, run| match best {
                Some(b) if b.inertia <= run.inertia => Some(b),
                _ => Some(run),
            })
    }

    pub fn centroids(&self) -> &Array2<f32> {
        &self.centroids
    }

    pub fn centroid(&self, label: usize) -> ArrayView1<'_, f32> {
        self.centroids.row(label)
    }

    /// Sum of squared distances of the training rows to their centroid.
    pub fn inertia(&self) -> f32 {
        self.inertia
    }

    /// Label of the nearest centroid; ties go to the lower label.
    pub fn predict(&self, point: ArrayView1<f32>) -> usize {
        nearest(&self.centroids, point).0
    }

    pub fn labels(&self, data: ArrayView2<f32>) -> Vec<usize> {
        data.rows().into_iter().map(|row| self.predict(row)).collect()
    }
}

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(centroids: &Array2<f32>, point: ArrayView1<f32>) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (label, centroid) in centroids.rows().into_iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best.1 {
            best = (label, dist);
        }
    }
    best
}

fn mean_variance(data: ArrayView2<f32>) -> f32 {
    data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

/// Choose initial centroids with probability proportional to squared
/// distance from the centroids chosen so far.
fn kmeans_plus_plus(data: ArrayView2<f32>, k: usize, rng: &mut StdRng) -> Array2<f32> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    centroids.row_mut(0).assign(&data.row(rng.gen_range(0..n)));

    let mut closest: Array1<f32> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f32 = closest.sum();
        let idx = if total > 0.0 {
            let threshold = rng.gen_range(0.0..total);
            let mut cumsum = 0.0;
            closest
                .iter()
                .position(|&d| {
                    cumsum += d;
                    cumsum > threshold
                })
                .unwrap_or(n - 1)
        } else {
            rng.gen_range(0..n)
        };
        centroids.row_mut(c).assign(&data.row(idx));

        for (i, row) in data.rows().into_iter().enumerate() {
            closest[i] = closest[i].min(squared_distance(row, centroids.row(c)));
        }
    }

    centroids
}

fn lloyd(data: ArrayView2<f32>, mut centroids: Array2<f32>, max_iter: usize, tol: f32) -> KMeans {
    let k = centroids.nrows();
    let mut labels = vec![0usize; data.nrows()];

    for _ in 0..max_iter.max(1) {
        for (label, row) in labels.iter_mut().zip(data.rows()) {
            *label = nearest(&centroids, row).0;
        }

        let mut sums = Array2::<f32>::zeros(centroids.raw_dim());
        let mut counts = vec![0usize; k];
        for (&label, row) in labels.iter().zip(data.rows()) {
            let mut sum = sums.row_mut(label);
            sum += &row;
            counts[label] += 1;
        }

        let mut new_centroids = centroids.clone();
        for (c, &count) in counts.iter().enumerate() {
            if count > 0 {
                new_centroids.row_mut(c).assign(&(&sums.row(c) / count as f32));
            } else {
                // empty cluster: restart it on the point worst served by its centroid
                let (far, _) = data
                    .rows()
                    .into_iter()
                    .zip(&labels)
                    .map(|(row, &l)| squared_distance(row, centroids.row(l)))
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |acc, (i, d)| {
                        if d > acc.1 { (i, d) } else { acc }
                    });
                new_centroids.row_mut(c).assign(&data.row(far));
            }
        }

        let shift: f32 = centroids
            .rows()
            .into_iter()
            .zip(new_centroids.rows())
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = new_centroids;
        if shift <= tol {
            break;
        }
    }

    let inertia = data.rows().into_iter().map(|row| nearest(&centroids, row).1).sum();
    KMeans { centroids, inertia }
}
