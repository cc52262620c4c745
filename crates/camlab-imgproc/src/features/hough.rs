use camlab_image::{Image, ImageError};

use crate::{
    edges::canny,
    filter::{kernels::gaussian_kernel_1d, separable_filter, spatial_gradient},
};

/// A line in normal form `x * cos(theta) + y * sin(theta) = rho`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarLine {
    /// Signed distance of the line to the origin.
    pub rho: f32,
    /// Angle of the line normal in radians, in `[0, pi)`.
    pub theta: f32,
    /// Number of edge pixels that voted for the line.
    pub votes: usize,
}

impl PolarLine {
    /// Two points of the line, `reach` pixels away on each side of the
    /// point closest to the origin.
    pub fn endpoints(&self, reach: f32) -> ((i64, i64), (i64, i64)) {
        let (sin, cos) = self.theta.sin_cos();
        let (x0, y0) = (cos * self.rho, sin * self.rho);
        (
            (
                (x0 - reach * sin).round() as i64,
                (y0 + reach * cos).round() as i64,
            ),
            (
                (x0 + reach * sin).round() as i64,
                (y0 - reach * cos).round() as i64,
            ),
        )
    }
}

/// Detect lines in a binary edge image with the standard Hough transform.
///
/// # Arguments
///
/// * `edges` - The edge image, non-zero pixels vote.
/// * `rho` - The distance resolution of the accumulator in pixels.
/// * `theta` - The angle resolution of the accumulator in radians.
/// * `threshold` - Minimal number of votes of a returned line.
///
/// # Returns
///
/// The lines at accumulator local maxima, most voted first.
pub fn hough_lines(
    edges: &Image<u8, 1>,
    rho: f32,
    theta: f32,
    threshold: usize,
) -> Result<Vec<PolarLine>, ImageError> {
    if rho <= 0.0 || theta <= 0.0 {
        return Err(ImageError::InvalidKernelSize(0));
    }
    let (width, height) = (edges.width(), edges.height());

    let num_angle = (std::f32::consts::PI / theta).round().max(1.0) as usize;
    let num_rho = (((width + height) * 2 + 1) as f32 / rho).round() as usize;
    let half = (num_rho as isize - 1) / 2;
    let trig: Vec<(f32, f32)> = (0..num_angle)
        .map(|n| {
            let (s, c) = (n as f32 * theta).sin_cos();
            (c / rho, s / rho)
        })
        .collect();

    // one guard cell on each side of both axes
    let stride = num_rho + 2;
    let mut acc = vec![0usize; (num_angle + 2) * stride];

    for y in 0..height {
        for (x, _) in edges.row(y).iter().enumerate().filter(|(_, &v)| v != 0) {
            for (n, &(c, s)) in trig.iter().enumerate() {
                let r = (x as f32 * c + y as f32 * s).round() as isize + half;
                if r >= 0 && (r as usize) < num_rho {
                    acc[(n + 1) * stride + r as usize + 1] += 1;
                }
            }
        }
    }

    let mut lines = Vec::new();
    for n in 0..num_angle {
        for r in 0..num_rho {
            let base = (n + 1) * stride + r + 1;
            let v = acc[base];
            if v > threshold
                && v > acc[base - 1]
                && v >= acc[base + 1]
                && v > acc[base - stride]
                && v >= acc[base + stride]
            {
                lines.push(PolarLine {
                    rho: (r as isize - half) as f32 * rho,
                    theta: n as f32 * theta,
                    votes: v,
                });
            }
        }
    }
    lines.sort_by(|a, b| b.votes.cmp(&a.votes));

    Ok(lines)
}

/// A circle found by [`hough_circles`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Center column.
    pub x: f32,
    /// Center row.
    pub y: f32,
    /// Radius in pixels.
    pub radius: f32,
}

/// Parameters of the gradient Hough circle transform.
#[derive(Debug, Clone, Copy)]
pub struct HoughCircleParams {
    /// Inverse ratio of the accumulator resolution to the image resolution.
    pub dp: f32,
    /// Minimal distance between detected centers.
    pub min_dist: f32,
    /// Upper canny threshold, the lower one is half of it.
    pub canny_high: f32,
    /// Accumulator votes needed for a center candidate, and edge pixels
    /// needed on the circle.
    pub acc_threshold: usize,
    /// Smallest radius searched.
    pub min_radius: usize,
    /// Largest radius searched, 0 for the image size.
    pub max_radius: usize,
}

/// Detect circles with the gradient Hough transform.
///
/// Every edge pixel votes along its gradient direction, both ways, for the
/// centers at all admissible radii. The direction is measured on a 5x5
/// binomial smoothing of the image so that the votes of a rasterised
/// boundary converge on its center. Accumulator local
/// maxima are then visited by decreasing votes; for each one the radius is
/// the distance shared by most edge pixels relative to its length.
pub fn hough_circles(
    src: &Image<u8, 1>,
    params: &HoughCircleParams,
) -> Result<Vec<Circle>, ImageError> {
    let dp = params.dp.max(1.0);
    let (width, height) = (src.width(), src.height());
    let min_r = params.min_radius.max(1);
    let max_r = if params.max_radius == 0 {
        width.max(height)
    } else {
        params.max_radius
    };
    if max_r < min_r || src.is_empty() {
        return Ok(Vec::new());
    }

    let edges = canny(src, params.canny_high * 0.5, params.canny_high)?;
    let src_f32 = src.cast::<f32>()?;
    let mut smoothed = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
    let binomial = gaussian_kernel_1d(5, 0.0);
    separable_filter(&src_f32, &mut smoothed, &binomial, &binomial)?;
    let (gx, gy) = spatial_gradient(&smoothed)?;

    let acc_w = (width as f32 / dp).ceil() as usize + 2;
    let acc_h = (height as f32 / dp).ceil() as usize + 2;
    let mut acc = vec![0usize; acc_w * acc_h];
    let mut edge_points = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            if edges.as_slice()[i] == 0 {
                continue;
            }
            edge_points.push((x as f32, y as f32));
            let (vx, vy) = (gx.as_slice()[i], gy.as_slice()[i]);
            let mag = (vx * vx + vy * vy).sqrt();
            if mag <= f32::EPSILON {
                continue;
            }
            let (ux, uy) = (vx / mag, vy / mag);
            for sign in [-1.0f32, 1.0] {
                for r in min_r..=max_r {
                    let cx = (x as f32 + sign * r as f32 * ux) / dp;
                    let cy = (y as f32 + sign * r as f32 * uy) / dp;
                    if cx < 0.0 || cy < 0.0 {
                        break;
                    }
                    let (ix, iy) = (cx.round() as usize + 1, cy.round() as usize + 1);
                    if ix >= acc_w - 1 || iy >= acc_h - 1 {
                        break;
                    }
                    acc[iy * acc_w + ix] += 1;
                }
            }
        }
    }

    let mut centers = Vec::new();
    for iy in 1..acc_h - 1 {
        for ix in 1..acc_w - 1 {
            let base = iy * acc_w + ix;
            let v = acc[base];
            if v > params.acc_threshold
                && v > acc[base - 1]
                && v >= acc[base + 1]
                && v > acc[base - acc_w]
                && v >= acc[base + acc_w]
            {
                centers.push((v, ix, iy));
            }
        }
    }
    centers.sort_by(|a, b| b.0.cmp(&a.0));

    let min_d2 = params.min_dist * params.min_dist;
    let mut hist = vec![0usize; max_r + 2];
    let mut circles: Vec<Circle> = Vec::new();

    for (_, ix, iy) in centers {
        let (cx, cy) = ((ix - 1) as f32 * dp, (iy - 1) as f32 * dp);
        let crowded = circles.iter().any(|c| {
            let (dx, dy) = (c.x - cx, c.y - cy);
            dx * dx + dy * dy < min_d2
        });
        if crowded {
            continue;
        }

        hist.iter_mut().for_each(|h| *h = 0);
        for &(x, y) in &edge_points {
            let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt().round() as usize;
            if (min_r..=max_r).contains(&d) {
                hist[d] += 1;
            }
        }

        // ring support over three neighbouring radii
        let mut best: Option<(usize, usize)> = None;
        for r in min_r..=max_r {
            let support = hist[r - 1] + hist[r] + hist[r + 1];
            let better = match best {
                None => support > 0,
                Some((best_r, best_support)) => support * best_r > best_support * r,
            };
            if better {
                best = Some((r, support));
            }
        }

        if let Some((r, support)) = best {
            if support > params.acc_threshold {
                circles.push(Circle {
                    x: cx,
                    y: cy,
                    radius: r as f32,
                });
            }
        }
    }

    Ok(circles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw;
    use camlab_image::ImageSize;

    #[test]
    fn test_hough_lines_horizontal() -> Result<(), ImageError> {
        let mut edges = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 60,
                height: 40,
            },
            0,
        )?;
        draw::draw_line(&mut edges, (5, 20), (54, 20), [255], 1);

        let lines = hough_lines(&edges, 1.0, std::f32::consts::PI / 180.0, 30)?;
        assert!(!lines.is_empty());
        let best = lines[0];
        assert_eq!(best.votes, 50);
        approx::assert_relative_eq!(best.theta, std::f32::consts::FRAC_PI_2, epsilon = 1e-4);
        approx::assert_relative_eq!(best.rho, 20.0);

        let (p0, p1) = best.endpoints(1000.0);
        assert_eq!(p0.1, 20);
        assert_eq!(p1.1, 20);

        assert!(hough_lines(&edges, 1.0, std::f32::consts::PI / 180.0, 60)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_hough_circles_disc() -> Result<(), ImageError> {
        let mut img = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 100,
                height: 100,
            },
            0,
        )?;
        draw::draw_filled_circle(&mut img, (50, 50), 20, [255]);

        let params = HoughCircleParams {
            dp: 1.0,
            min_dist: 10.0,
            canny_high: 100.0,
            acc_threshold: 20,
            min_radius: 5,
            max_radius: 40,
        };
        let circles = hough_circles(&img, &params)?;
        assert!(!circles.is_empty());
        let c = circles[0];
        assert!((c.x - 50.0).abs() <= 2.0, "{c:?}");
        assert!((c.y - 50.0).abs() <= 2.0, "{c:?}");
        assert!((c.radius - 20.0).abs() <= 2.0, "{c:?}");

        let flat = Image::<u8, 1>::from_size_val(img.size(), 80)?;
        assert!(hough_circles(&flat, &params)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_hough_circles_two_discs() -> Result<(), ImageError> {
        let mut img = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 100,
                height: 90,
            },
            0,
        )?;
        draw::draw_filled_circle(&mut img, (30, 30), 12, [255]);
        draw::draw_filled_circle(&mut img, (70, 55), 18, [255]);

        let params = HoughCircleParams {
            dp: 1.0,
            min_dist: 10.0,
            canny_high: 100.0,
            acc_threshold: 20,
            min_radius: 5,
            max_radius: 30,
        };
        let circles = hough_circles(&img, &params)?;
        assert_eq!(circles.len(), 2, "{circles:?}");
        for (x, y, radius) in [(30.0, 30.0, 12.0), (70.0, 55.0, 18.0)] {
            let found = circles.iter().any(|c: &Circle| {
                (c.x - x).abs() <= 2.0 && (c.y - y).abs() <= 2.0 && (c.radius - radius).abs() <= 2.0
            });
            assert!(found, "no circle at ({x}, {y}) r {radius} in {circles:?}");
        }
        Ok(())
    }
}
