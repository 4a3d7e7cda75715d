//! Online single-link clustering shared by the snapping and mode checks.
//!
//! A sample joins the nearest existing center when within `epsilon`
//! (inclusive), and that center moves to the mean of itself and the sample;
//! otherwise the sample starts a new cluster.

/// Cluster count for a scalar series (distance is `|a - b|`).
#[must_use]
pub fn scalar_cluster_count(values: impl IntoIterator<Item = f64>, epsilon: f64) -> usize {
    let mut centers: Vec<f64> = Vec::new();
    for value in values {
        let nearest = centers
            .iter()
            .enumerate()
            .map(|(i, c)| (i, (c - value).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match nearest {
            Some((i, distance)) if distance <= epsilon => {
                centers[i] = 0.5 * (centers[i] + value);
            }
            _ => centers.push(value),
        }
    }
    centers.len()
}

/// Cluster count for equal-length vectors (Euclidean distance).
#[must_use]
pub fn vector_cluster_count(vectors: &[Vec<f64>], epsilon: f64) -> usize {
    let mut centers: Vec<Vec<f64>> = Vec::new();
    for vector in vectors {
        let nearest = centers
            .iter()
            .enumerate()
            .map(|(i, c)| (i, euclidean(c, vector)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match nearest {
            Some((i, distance)) if distance <= epsilon => {
                for (c, v) in centers[i].iter_mut().zip(vector) {
                    *c = 0.5 * (*c + v);
                }
            }
            _ => centers.push(vector.clone()),
        }
    }
    centers.len()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
