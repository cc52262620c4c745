use camlab_image::Image;

mod font;
pub use font::{draw_text, text_size};

// writes outside the image are clipped
#[inline]
fn set_pixel<const C: usize>(img: &mut Image<u8, C>, x: i64, y: i64, color: [u8; C]) {
    if x >= 0 && x < img.cols() as i64 && y >= 0 && y < img.rows() as i64 {
        img.pixel_mut(x as usize, y as usize).copy_from_slice(&color);
    }
}

fn stamp_disc<const C: usize>(
    img: &mut Image<u8, C>,
    x: i64,
    y: i64,
    radius: i64,
    color: [u8; C],
) {
    for j in -radius..=radius {
        for i in -radius..=radius {
            if i * i + j * j <= radius * radius + radius {
                set_pixel(img, x + i, y + j, color);
            }
        }
    }
}

/// Draws a line on an image inplace using Bresenham's line algorithm.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `p0` - The start point of the line as a tuple of (x, y).
/// * `p1` - The end point of the line as a tuple of (x, y).
/// * `color` - The color of the line as an array of `C` elements.
/// * `thickness` - The thickness of the line. Thick lines get round caps.
pub fn draw_line<const C: usize>(
    img: &mut Image<u8, C>,
    p0: (i64, i64),
    p1: (i64, i64),
    color: [u8; C],
    thickness: usize,
) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };

    let mut err = dx - dy;
    let radius = thickness as i64 / 2;

    loop {
        if radius == 0 {
            set_pixel(img, x0, y0, color);
        } else {
            stamp_disc(img, x0, y0, radius, color);
        }

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draws a rectangle outline on an image inplace.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `top_left` - The top-left corner coordinates (x, y).
/// * `bottom_right` - The bottom-right corner coordinates (x, y), inclusive.
/// * `color` - The color of the rectangle outline.
/// * `thickness` - The thickness of the lines.
pub fn draw_rect<const C: usize>(
    img: &mut Image<u8, C>,
    top_left: (i64, i64),
    bottom_right: (i64, i64),
    color: [u8; C],
    thickness: usize,
) {
    let (x0, y0) = top_left;
    let (x1, y1) = bottom_right;
    let (lx0, lx1) = (x0.min(x1), x0.max(x1));
    let (ly0, ly1) = (y0.min(y1), y0.max(y1));

    draw_line(img, (lx0, ly0), (lx1, ly0), color, thickness);
    draw_line(img, (lx0, ly1), (lx1, ly1), color, thickness);
    draw_line(img, (lx0, ly0), (lx0, ly1), color, thickness);
    draw_line(img, (lx1, ly0), (lx1, ly1), color, thickness);
}

/// Draws a circle outline on an image inplace.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `center` - The circle center (x, y).
/// * `radius` - The circle radius in pixels.
/// * `color` - The color of the outline.
/// * `thickness` - The width of the ring.
pub fn draw_circle<const C: usize>(
    img: &mut Image<u8, C>,
    center: (i64, i64),
    radius: i64,
    color: [u8; C],
    thickness: usize,
) {
    let half = thickness.max(1) as f64 / 2.0;
    let reach = radius + half.ceil() as i64;
    let (cx, cy) = center;
    for y in -reach..=reach {
        for x in -reach..=reach {
            let d = ((x * x + y * y) as f64).sqrt();
            if (d - radius as f64).abs() <= half {
                set_pixel(img, cx + x, cy + y, color);
            }
        }
    }
}

/// Draws a filled disc on an image inplace.
pub fn draw_filled_circle<const C: usize>(
    img: &mut Image<u8, C>,
    center: (i64, i64),
    radius: i64,
    color: [u8; C],
) {
    stamp_disc(img, center.0, center.1, radius.max(0), color);
}

/// Draws the segments joining consecutive points.
///
/// With `closed` the last point is joined back to the first one.
pub fn draw_polyline<const C: usize>(
    img: &mut Image<u8, C>,
    points: &[(i64, i64)],
    closed: bool,
    color: [u8; C],
    thickness: usize,
) {
    if points.is_empty() {
        return;
    }
    for pair in points.windows(2) {
        draw_line(img, pair[0], pair[1], color, thickness);
    }
    if closed && points.len() > 2 {
        draw_line(img, points[points.len() - 1], points[0], color, thickness);
    }
    if points.len() == 1 {
        draw_line(img, points[0], points[0], color, thickness);
    }
}

/// Fills a convex polygon on an image inplace.
///
/// Each row between the topmost and bottommost vertex is filled between the
/// leftmost and rightmost crossing of the polygon edges.
pub fn fill_convex_poly<const C: usize>(
    img: &mut Image<u8, C>,
    points: &[(i64, i64)],
    color: [u8; C],
) {
    if points.is_empty() {
        return;
    }
    let y_min = points.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let y_max = points
        .iter()
        .map(|p| p.1)
        .max()
        .unwrap_or(-1)
        .min(img.rows() as i64 - 1);

    let n = points.len();
    for y in y_min..=y_max {
        let mut x_lo = i64::MAX;
        let mut x_hi = i64::MIN;
        for i in 0..n {
            let (px, py) = points[i];
            let (qx, qy) = points[(i + 1) % n];
            if y < py.min(qy) || y > py.max(qy) {
                continue;
            }
            if py == qy {
                x_lo = x_lo.min(px.min(qx));
                x_hi = x_hi.max(px.max(qx));
            } else {
                let t = (y - py) as f64 / (qy - py) as f64;
                let x = (px as f64 + t * (qx - px) as f64).round() as i64;
                x_lo = x_lo.min(x);
                x_hi = x_hi.max(x);
            }
        }
        for x in x_lo.max(0)..=x_hi.min(img.cols() as i64 - 1) {
            set_pixel(img, x, y, color);
        }
    }
}

/// Approximates an elliptic arc with a polygon.
///
/// # Arguments
///
/// * `center` - The ellipse center (x, y).
/// * `axes` - The half axes (a, b) in pixels.
/// * `angle` - The rotation of the ellipse in degrees.
/// * `arc_start` - The start angle of the arc in degrees.
/// * `arc_end` - The end angle of the arc in degrees.
/// * `delta` - The angle between consecutive vertices in degrees.
pub fn ellipse_poly(
    center: (i64, i64),
    axes: (i64, i64),
    angle: i32,
    arc_start: i32,
    arc_end: i32,
    delta: i32,
) -> Vec<(i64, i64)> {
    let (sin_a, cos_a) = (angle as f64).to_radians().sin_cos();
    let delta = delta.max(1);
    let (a, b) = (axes.0.abs() as f64, axes.1.abs() as f64);

    let mut points: Vec<(i64, i64)> = Vec::new();
    let mut t = arc_start;
    loop {
        let t_clamped = t.min(arc_end);
        let (sin_t, cos_t) = (t_clamped as f64).to_radians().sin_cos();
        let x = a * cos_t;
        let y = b * sin_t;
        let p = (
            center.0 + (x * cos_a - y * sin_a).round() as i64,
            center.1 + (x * sin_a + y * cos_a).round() as i64,
        );
        if points.last() != Some(&p) {
            points.push(p);
        }
        if t_clamped >= arc_end {
            break;
        }
        t += delta;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::{ImageError, ImageSize};

    #[rustfmt::skip]
    #[test]
    fn test_draw_line() -> Result<(), ImageError> {
        let mut img = Image::new(
            ImageSize { width: 5, height: 5 }, vec![0u8; 25],
        )?;
        draw_line(&mut img, (0, 0), (4, 4), [255], 1);
        assert_eq!(
            img.as_slice(),
            &[
                255, 0, 0, 0, 0,
                0, 255, 0, 0, 0,
                0, 0, 255, 0, 0,
                0, 0, 0, 255, 0,
                0, 0, 0, 0, 255,
            ]
        );
        Ok(())
    }

    #[rustfmt::skip]
    #[test]
    fn test_draw_rect() -> Result<(), ImageError> {
        let mut img = Image::new(
            ImageSize { width: 5, height: 4 }, vec![0u8; 20],
        )?;
        draw_rect(&mut img, (1, 1), (3, 2), [1], 1);
        assert_eq!(
            img.as_slice(),
            &[
                0, 0, 0, 0, 0,
                0, 1, 1, 1, 0,
                0, 1, 1, 1, 0,
                0, 0, 0, 0, 0,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_filled_circle_and_ring() -> Result<(), ImageError> {
        let size = ImageSize {
            width: 41,
            height: 41,
        };
        let mut img = Image::<u8, 3>::from_size_val(size, 0)?;
        draw_filled_circle(&mut img, (20, 20), 15, [255, 0, 0]);
        assert_eq!(img.pixel(20, 20), &[255, 0, 0]);
        assert_eq!(img.pixel(20, 5), &[255, 0, 0]);
        assert_eq!(img.pixel(0, 0), &[0, 0, 0]);

        let mut ring = Image::<u8, 1>::from_size_val(size, 0)?;
        draw_circle(&mut ring, (20, 20), 10, [1], 2);
        assert_eq!(ring.get([20, 30, 0]), Some(&1));
        assert_eq!(ring.get([20, 20, 0]), Some(&0));
        Ok(())
    }

    #[test]
    fn test_fill_convex_poly() -> Result<(), ImageError> {
        let mut img = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 6,
                height: 6,
            },
            0,
        )?;
        fill_convex_poly(&mut img, &[(1, 1), (4, 1), (4, 4), (1, 4)], [7]);
        let filled = img.as_slice().iter().filter(|&&v| v == 7).count();
        assert_eq!(filled, 16);
        Ok(())
    }

    #[test]
    fn test_ellipse_poly() {
        let pts = ellipse_poly((50, 50), (30, 10), 0, 0, 360, 10);
        assert_eq!(pts.first(), Some(&(80, 50)));
        assert_eq!(pts.last(), Some(&(80, 50)));
        assert!(pts.contains(&(50, 60)));
        assert_eq!(pts.len(), 37);
    }

    #[test]
    fn test_polyline_closed() -> Result<(), ImageError> {
        let mut img = Image::<u8, 1>::from_size_val(
            ImageSize {
                width: 5,
                height: 5,
            },
            0,
        )?;
        draw_polyline(&mut img, &[(0, 0), (4, 0), (4, 4)], true, [3], 1);
        // closing segment is the diagonal back to the origin
        assert_eq!(img.get([2, 2, 0]), Some(&3));
        Ok(())
    }
}
