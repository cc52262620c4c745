use camlab_image::Image;

use super::Keypoint;

/// Describe keypoints by their normalised square intensity patches.
///
/// The patch of side `2 * radius + 1` is sampled every `step` pixels, made
/// zero mean and scaled to unit norm, which makes it invariant to affine
/// changes of brightness. Keypoints whose patch leaves the image or is flat
/// are dropped.
///
/// # Returns
///
/// The kept keypoints and their descriptors, in the same order.
pub fn patch_descriptors(
    src: &Image<u8, 1>,
    keypoints: &[Keypoint],
    radius: usize,
    step: usize,
) -> (Vec<Keypoint>, Vec<Vec<f32>>) {
    let step = step.max(1);
    let reach = (radius * step) as i64;
    let (width, height) = (src.width() as i64, src.height() as i64);

    let mut kept = Vec::new();
    let mut descriptors = Vec::new();

    for kp in keypoints {
        let (cx, cy) = (kp.x.round() as i64, kp.y.round() as i64);
        if cx < reach || cy < reach || cx + reach >= width || cy + reach >= height {
            continue;
        }

        let mut desc = Vec::with_capacity((2 * radius + 1).pow(2));
        let mut dy = -reach;
        while dy <= reach {
            let mut dx = -reach;
            while dx <= reach {
                desc.push(src.pixel((cx + dx) as usize, (cy + dy) as usize)[0] as f32);
                dx += step as i64;
            }
            dy += step as i64;
        }

        let mean = desc.iter().sum::<f32>() / desc.len() as f32;
        desc.iter_mut().for_each(|v| *v -= mean);
        let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm < 1e-3 {
            continue;
        }
        desc.iter_mut().for_each(|v| *v /= norm);

        kept.push(*kp);
        descriptors.push(desc);
    }

    (kept, descriptors)
}

#[inline]
fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Match float descriptors using brute-force euclidean distance.
///
/// For each descriptor in `descriptors1`, finds the nearest neighbor in
/// `descriptors2`. Only mutual nearest neighbours are kept, and when
/// `max_ratio` is set the best distance must also be below `max_ratio`
/// times the second best (Lowe's ratio test).
///
/// # Returns
///
/// Vector of `(i, j)` index pairs into `descriptors1` and `descriptors2`.
pub fn match_descriptors(
    descriptors1: &[Vec<f32>],
    descriptors2: &[Vec<f32>],
    max_ratio: Option<f32>,
) -> Vec<(usize, usize)> {
    let m = descriptors1.len();
    let n = descriptors2.len();
    if m == 0 || n == 0 {
        return vec![];
    }

    let mut fwd_best_j = vec![0usize; m];
    let mut fwd_best_dist = vec![f32::MAX; m];
    let mut fwd_second_dist = vec![f32::MAX; m];
    let mut rev_best_i = vec![0usize; n];
    let mut rev_best_dist = vec![f32::MAX; n];

    for (i, d1) in descriptors1.iter().enumerate() {
        for (j, d2) in descriptors2.iter().enumerate() {
            let dist = l2_distance(d1, d2);
            if dist < fwd_best_dist[i] {
                fwd_second_dist[i] = fwd_best_dist[i];
                fwd_best_dist[i] = dist;
                fwd_best_j[i] = j;
            } else if dist < fwd_second_dist[i] {
                fwd_second_dist[i] = dist;
            }
            if dist < rev_best_dist[j] {
                rev_best_dist[j] = dist;
                rev_best_i[j] = i;
            }
        }
    }

    let mut matches = Vec::new();
    for i in 0..m {
        let j = fwd_best_j[i];
        if rev_best_i[j] != i {
            continue;
        }
        if let Some(ratio) = max_ratio {
            let second = fwd_second_dist[i];
            if second < f32::MAX && fwd_best_dist[i] >= ratio * second {
                continue;
            }
        }
        matches.push((i, j));
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::{ImageError, ImageSize};

    #[test]
    fn test_patch_descriptors_border_and_flat() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 20,
            height: 20,
        };
        let data = (0..size.area()).map(|i| ((i * 37) % 251) as u8).collect();
        let img = Image::<u8, 1>::new(size, data)?;
        let kps = [
            Keypoint {
                x: 10.0,
                y: 10.0,
                response: 1.0,
            },
            Keypoint {
                x: 1.0,
                y: 10.0,
                response: 1.0,
            },
        ];
        let (kept, desc) = patch_descriptors(&img, &kps, 3, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(desc[0].len(), 49);
        let norm: f32 = desc[0].iter().map(|v| v * v).sum();
        approx::assert_relative_eq!(norm, 1.0, epsilon = 1e-4);

        let flat = Image::<u8, 1>::from_size_val(size, 5)?;
        let (kept, _) = patch_descriptors(&flat, &kps, 3, 1);
        assert!(kept.is_empty());
        Ok(())
    }

    #[test]
    fn test_match_descriptors_mutual() {
        let d1 = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]];
        let d2 = vec![vec![0.0, 0.98], vec![0.99, 0.05]];
        let matches = match_descriptors(&d1, &d2, None);
        assert_eq!(matches, vec![(0, 1), (1, 0)]);

        // an ambiguous second candidate fails the ratio test
        let d2 = vec![vec![1.0, 0.0], vec![0.9, 0.0]];
        let d1 = vec![vec![0.96, 0.0]];
        assert!(match_descriptors(&d1, &d2, Some(0.5)).is_empty());
        assert_eq!(match_descriptors(&d1, &d2, None), vec![(0, 0)]);
    }
}
