use rand::{rngs::StdRng, SeedableRng};

use crate::warp::{compose_homography, invert_homography, transform_point, Homography};

type Point = (f64, f64);

// translate to the centroid and scale to a mean distance of sqrt(2)
fn normalization(points: &[Point]) -> Homography {
    let n = points.len() as f64;
    let (cx, cy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
    let (cx, cy) = (cx / n, cy / n);
    let mean_dist = points
        .iter()
        .map(|&(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > f64::EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    [s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0]
}

/// Estimate the homography mapping `src` points onto `dst` points.
///
/// Uses the normalised direct linear transform: the points are conditioned,
/// the null vector of the stacked constraints is taken from the SVD of the
/// normal matrix and the conditioning is undone.
///
/// # Arguments
///
/// * `src` - The source points, at least four.
/// * `dst` - The destination points, as many as `src`.
///
/// # Returns
///
/// The homography with `h[8] == 1`, or `None` when the problem is degenerate.
pub fn find_homography(src: &[Point], dst: &[Point]) -> Option<Homography> {
    if src.len() < 4 || src.len() != dst.len() || all_collinear(src) {
        return None;
    }

    let t1 = normalization(src);
    let t2 = normalization(dst);

    let mut ata = [[0.0f64; 9]; 9];
    for (&p, &q) in src.iter().zip(dst) {
        let (x, y) = transform_point(&t1, p.0, p.1)?;
        let (u, v) = transform_point(&t2, q.0, q.1)?;
        let rows = [
            [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
            [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v],
        ];
        for row in rows.iter() {
            for i in 0..9 {
                for j in 0..9 {
                    ata[i][j] += row[i] * row[j];
                }
            }
        }
    }

    // the singular vector of the smallest singular value
    let mat = faer::Mat::<f64>::from_fn(9, 9, |i, j| ata[i][j]);
    let svd = mat.svd();
    let h = svd.v().col(8);
    let hn: Homography = [h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]];

    let t2_inv = invert_homography(&t2)?;
    let hm = compose_homography(&t2_inv, &compose_homography(&hn, &t1));
    if hm[8].abs() < 1e-12 {
        return None;
    }
    let scale = hm[8];
    let hm = hm.map(|v| v / scale);

    let det = hm[0] * (hm[4] * hm[8] - hm[5] * hm[7]) - hm[1] * (hm[3] * hm[8] - hm[5] * hm[6])
        + hm[2] * (hm[3] * hm[7] - hm[4] * hm[6]);
    if det.abs() < 1e-8 || hm.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(hm)
}

/// Parameters of [`ransac_homography`].
#[derive(Debug, Clone, Copy)]
pub struct RansacParams {
    /// Number of random minimal samples drawn.
    pub max_iterations: usize,
    /// Largest reprojection error of an inlier, in pixels.
    pub reprojection_threshold: f64,
    /// Inliers needed to accept a model.
    pub min_inliers: usize,
    /// Seed of the sampling generator.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            reprojection_threshold: 3.0,
            min_inliers: 8,
            seed: 0x5eed,
        }
    }
}

/// A homography together with the correspondences that support it.
#[derive(Debug, Clone)]
pub struct RansacHomography {
    /// The refined homography src -> dst.
    pub homography: Homography,
    /// Inlier flag per correspondence.
    pub inliers: Vec<bool>,
}

impl RansacHomography {
    /// The number of inliers.
    pub fn num_inliers(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

fn collinear(a: Point, b: Point, c: Point) -> bool {
    ((b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)).abs() < 1e-6
}

fn all_collinear(points: &[Point]) -> bool {
    let a = points[0];
    let far = points
        .iter()
        .copied()
        .max_by(|p, q| {
            let dp = (p.0 - a.0).powi(2) + (p.1 - a.1).powi(2);
            let dq = (q.0 - a.0).powi(2) + (q.1 - a.1).powi(2);
            dp.total_cmp(&dq)
        })
        .unwrap_or(a);
    points.iter().all(|&c| collinear(a, far, c))
}

fn degenerate_sample(points: &[Point]) -> bool {
    (0..points.len()).any(|i| {
        (i + 1..points.len())
            .any(|j| (j + 1..points.len()).any(|k| collinear(points[i], points[j], points[k])))
    })
}

fn classify(h: &Homography, src: &[Point], dst: &[Point], threshold: f64) -> Vec<bool> {
    let t2 = threshold * threshold;
    src.iter()
        .zip(dst)
        .map(|(&p, &q)| {
            transform_point(h, p.0, p.1)
                .map(|(x, y)| (x - q.0).powi(2) + (y - q.1).powi(2) <= t2)
                .unwrap_or(false)
        })
        .collect()
}

/// Robustly estimate a homography from noisy correspondences.
///
/// Random four point samples are drawn from a seeded generator, so a run is
/// reproducible. The model with most inliers is refitted on all of its
/// inliers.
///
/// # Returns
///
/// `None` when no model reaches `min_inliers`.
pub fn ransac_homography(
    src: &[Point],
    dst: &[Point],
    params: &RansacParams,
) -> Option<RansacHomography> {
    let n = src.len();
    if n < 4 || n != dst.len() || n < params.min_inliers {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(usize, Vec<bool>)> = None;

    for _ in 0..params.max_iterations {
        let idx = rand::seq::index::sample(&mut rng, n, 4).into_vec();
        let s: Vec<Point> = idx.iter().map(|&i| src[i]).collect();
        let d: Vec<Point> = idx.iter().map(|&i| dst[i]).collect();
        if degenerate_sample(&s) || degenerate_sample(&d) {
            continue;
        }
        let Some(h) = find_homography(&s, &d) else {
            continue;
        };

        let inliers = classify(&h, src, dst, params.reprojection_threshold);
        let count = inliers.iter().filter(|&&b| b).count();
        if best.as_ref().map_or(true, |(c, _)| count > *c) {
            let all = count == n;
            best = Some((count, inliers));
            if all {
                break;
            }
        }
    }

    let (count, inliers) = best?;
    if count < params.min_inliers.max(4) {
        return None;
    }

    let (s, d): (Vec<Point>, Vec<Point>) = src
        .iter()
        .zip(dst)
        .zip(&inliers)
        .filter(|(_, &keep)| keep)
        .map(|((&p, &q), _)| (p, q))
        .unzip();
    let homography = find_homography(&s, &d)?;
    let inliers = classify(&homography, src, dst, params.reprojection_threshold);

    Some(RansacHomography {
        homography,
        inliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    const H: Homography = [1.1, 0.05, 12.0, -0.03, 0.95, -4.0, 2e-4, -1e-4, 1.0];

    fn correspondences(n: usize) -> (Vec<Point>, Vec<Point>) {
        let mut rng = StdRng::seed_from_u64(7);
        let src: Vec<Point> = (0..n)
            .map(|_| (rng.random_range(0.0..300.0), rng.random_range(0.0..200.0)))
            .collect();
        let dst = src
            .iter()
            .map(|&(x, y)| transform_point(&H, x, y).unwrap_or((0.0, 0.0)))
            .collect();
        (src, dst)
    }

    #[test]
    fn test_find_homography_exact() {
        let (src, dst) = correspondences(10);
        let h = find_homography(&src, &dst);
        assert!(h.is_some());
        for (a, b) in h.unwrap_or([0.0; 9]).iter().zip(H) {
            assert_relative_eq!(*a, b, epsilon = 1e-6, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_find_homography_degenerate() {
        let line: Vec<Point> = (0..6).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert!(find_homography(&line, &line).is_none());
        assert!(find_homography(&line[..3], &line[..3]).is_none());
    }

    #[test]
    fn test_ransac_with_outliers() {
        let (src, mut dst) = correspondences(60);
        // corrupt every fifth correspondence
        for (i, q) in dst.iter_mut().enumerate() {
            if i % 5 == 0 {
                q.0 += 40.0 + i as f64;
                q.1 -= 25.0;
            }
        }
        let res = ransac_homography(&src, &dst, &RansacParams::default());
        let Some(res) = res else {
            panic!("no model found");
        };
        assert_eq!(res.num_inliers(), 48);
        for (i, &inlier) in res.inliers.iter().enumerate() {
            assert_eq!(inlier, i % 5 != 0);
        }
        for (a, b) in res.homography.iter().zip(H) {
            assert_relative_eq!(*a, b, epsilon = 1e-6, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_ransac_too_few() {
        let (src, dst) = correspondences(5);
        let params = RansacParams {
            min_inliers: 8,
            ..Default::default()
        };
        assert!(ransac_homography(&src, &dst, &params).is_none());
    }
}
