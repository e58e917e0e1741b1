//! K-means clustering of matrix rows or columns
//!
//! Wraps the `clustering` crate with several random restarts and keeps
//! the solution with the smallest within-cluster sum of squares.

use nalgebra::DMatrix;
use rayon::prelude::*;

/// Arguments for k-means clustering
#[derive(Debug, Clone)]
pub struct KmeansArgs {
    /// Number of clusters
    pub num_clusters: usize,
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Number of random restarts
    pub num_init: usize,
}

impl Default for KmeansArgs {
    fn default() -> Self {
        Self {
            num_clusters: 1,
            max_iter: 300,
            num_init: 5,
        }
    }
}

impl KmeansArgs {
    /// Create args with specified number of clusters
    pub fn with_clusters(num_clusters: usize) -> Self {
        Self {
            num_clusters,
            ..Default::default()
        }
    }
}

/// Trait for k-means clustering on matrices
pub trait Kmeans {
    /// Cluster columns and return membership vector
    ///
    /// # Returns
    /// Vector of cluster assignments, one per column
    fn kmeans_columns(&self, args: KmeansArgs) -> Vec<usize>;

    /// Cluster rows and return membership vector
    ///
    /// # Returns
    /// Vector of cluster assignments, one per row
    fn kmeans_rows(&self, args: KmeansArgs) -> Vec<usize>;
}

impl Kmeans for DMatrix<f32> {
    fn kmeans_columns(&self, args: KmeansArgs) -> Vec<usize> {
        let data: Vec<Vec<f32>> = self
            .column_iter()
            .map(|x| x.iter().copied().collect())
            .collect();
        kmeans_restarts(&data, &args)
    }

    fn kmeans_rows(&self, args: KmeansArgs) -> Vec<usize> {
        let data: Vec<Vec<f32>> = self
            .row_iter()
            .map(|x| x.iter().copied().collect())
            .collect();
        kmeans_restarts(&data, &args)
    }
}

fn kmeans_restarts(data: &[Vec<f32>], args: &KmeansArgs) -> Vec<usize> {
    if args.num_clusters <= 1 || data.is_empty() {
        return vec![0; data.len()];
    }

    let data = data.to_vec();

    (0..args.num_init.max(1))
        .into_par_iter()
        .map(|_| {
            let membership = clustering::kmeans(args.num_clusters, &data, args.max_iter).membership;
            let score = within_cluster_sum_of_squares(&data, &membership, args.num_clusters);
            (score, membership)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, membership)| membership)
        .unwrap_or_else(|| vec![0; data.len()])
}

/// sum_i || x_i - mu_{c(i)} ||^2
pub fn within_cluster_sum_of_squares(
    data: &[Vec<f32>],
    membership: &[usize],
    num_clusters: usize,
) -> f64 {
    let dim = data.first().map(|x| x.len()).unwrap_or(0);
    let mut centres = vec![vec![0_f64; dim]; num_clusters];
    let mut counts = vec![0_usize; num_clusters];

    for (x, &k) in data.iter().zip(membership) {
        if k < num_clusters {
            counts[k] += 1;
            for (c, &v) in centres[k].iter_mut().zip(x) {
                *c += v as f64;
            }
        }
    }

    for (centre, &n) in centres.iter_mut().zip(&counts) {
        if n > 0 {
            centre.iter_mut().for_each(|c| *c /= n as f64);
        }
    }

    data.iter()
        .zip(membership)
        .filter(|(_, &k)| k < num_clusters)
        .map(|(x, &k)| {
            x.iter()
                .zip(&centres[k])
                .map(|(&v, &c)| (v as f64 - c).powi(2))
                .sum::<f64>()
        })
        .sum()
}

/// Clustering result
#[derive(Debug, Clone)]
pub struct ClusterResult {
    /// Cluster assignment for each spot
    pub labels: Vec<usize>,
    /// Number of clusters
    pub n_clusters: usize,
}

impl ClusterResult {
    /// Get cluster size distribution
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_clusters];
        for &label in &self.labels {
            if label < self.n_clusters {
                counts[label] += 1;
            }
        }
        counts
    }

    /// Get cluster assignment histogram as ASCII, showing up to
    /// `max_show` largest clusters sorted by size (descending).
    pub fn histogram_ascii(&self, max_width: usize, max_show: usize) -> String {
        let sizes = self.cluster_sizes();

        let mut ranked: Vec<(usize, usize)> = sizes
            .iter()
            .enumerate()
            .filter(|(_, &s)| s > 0)
            .map(|(id, &s)| (id, s))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let n_total = ranked.len();
        let n_show = max_show.min(n_total);
        let max_size = ranked.first().map(|&(_, s)| s).unwrap_or(1);
        let n_spots = self.labels.len().max(1) as f64;

        let mut lines = Vec::new();
        lines.push(format!(
            "Cluster assignments ({} spots, {} clusters):",
            self.labels.len(),
            n_total
        ));
        lines.push(String::new());

        for &(cluster_id, size) in ranked.iter().take(n_show) {
            let pct = 100.0 * size as f64 / n_spots;
            let bar_len = ((size as f64 / max_size as f64) * max_width as f64) as usize;
            let bar = "█".repeat(bar_len.max(1));

            lines.push(format!(
                "  Cluster {:3}  {:>6} spots ({:>5.1}%)  {}",
                cluster_id, size, pct, bar
            ));
        }

        if n_total > n_show {
            let hidden: usize = ranked[n_show..].iter().map(|&(_, s)| s).sum();
            lines.push(format!(
                "  ... and {} more clusters ({} spots, {:.1}%)",
                n_total - n_show,
                hidden,
                100.0 * hidden as f64 / n_spots
            ));
        }

        lines.join("\n")
    }
}

/// Run k-means on the rows of `latent` (spots x features)
pub fn kmeans_clustering(latent: &DMatrix<f32>, args: KmeansArgs) -> anyhow::Result<ClusterResult> {
    let nn = latent.nrows();
    let k = args.num_clusters;

    if k == 0 {
        return Err(anyhow::anyhow!("number of clusters must be positive"));
    }
    if k > nn {
        return Err(anyhow::anyhow!("{} clusters for {} spots", k, nn));
    }

    let labels = latent.kmeans_rows(args);

    Ok(ClusterResult {
        labels,
        n_clusters: k,
    })
}
