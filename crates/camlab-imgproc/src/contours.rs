use camlab_image::Image;

/// An axis aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left column.
    pub x: i64,
    /// Top row.
    pub y: i64,
    /// Number of columns covered.
    pub width: i64,
    /// Number of rows covered.
    pub height: i64,
}

impl Rect {
    /// The inclusive bottom-right corner.
    pub fn bottom_right(&self) -> (i64, i64) {
        (self.x + self.width - 1, self.y + self.height - 1)
    }

    /// Whether two rectangles share at least one pixel.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// The outer border of a connected foreground region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    /// Border pixels in tracing order.
    pub points: Vec<(i64, i64)>,
}

impl Contour {
    /// The smallest rectangle containing every border pixel.
    pub fn bounding_rect(&self) -> Rect {
        bounding_rect(&self.points)
    }
}

/// The smallest rectangle containing all points.
///
/// An empty point set gives an empty rectangle at the origin.
pub fn bounding_rect(points: &[(i64, i64)]) -> Rect {
    let Some(&(x0, y0)) = points.first() else {
        return Rect {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Rect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    }
}

// clockwise with y pointing down
const DIRS_8: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const DIRS_4: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

struct Grid<'a> {
    data: &'a [u8],
    width: i64,
    height: i64,
}

impl Grid<'_> {
    #[inline]
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    #[inline]
    fn is_set(&self, x: i64, y: i64) -> bool {
        self.index(x, y).is_some_and(|i| self.data[i] != 0)
    }
}

// background not reachable from the border through 4-connected background
// pixels belongs to a hole and is merged into the surrounding region
fn fill_holes(src: &Image<u8, 1>) -> Vec<u8> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let data = src.as_slice();
    let mut outside = vec![false; data.len()];
    let mut stack = Vec::new();

    let grid = Grid {
        data,
        width: w,
        height: h,
    };
    let seed = |x: i64, y: i64, stack: &mut Vec<(i64, i64)>, outside: &mut [bool]| {
        if let Some(i) = grid.index(x, y) {
            if data[i] == 0 && !outside[i] {
                outside[i] = true;
                stack.push((x, y));
            }
        }
    };

    for x in 0..w {
        seed(x, 0, &mut stack, &mut outside);
        seed(x, h - 1, &mut stack, &mut outside);
    }
    for y in 0..h {
        seed(0, y, &mut stack, &mut outside);
        seed(w - 1, y, &mut stack, &mut outside);
    }
    while let Some((x, y)) = stack.pop() {
        for (dx, dy) in DIRS_4 {
            seed(x + dx, y + dy, &mut stack, &mut outside);
        }
    }

    outside.iter().map(|&o| if o { 0 } else { 255 }).collect()
}

fn trace_border(grid: &Grid, start: (i64, i64)) -> Vec<(i64, i64)> {
    let mut points = Vec::new();
    let mut current = start;
    // the raster scan reaches the start pixel from the west
    let mut back_dir = 4usize;
    let mut first_move = None;
    let max_steps = (grid.width * grid.height * 4 + 8) as usize;

    for _ in 0..max_steps {
        let mut found = None;
        for step in 1..=8 {
            let k = (back_dir + step) % 8;
            let (nx, ny) = (current.0 + DIRS_8[k].0, current.1 + DIRS_8[k].1);
            if grid.is_set(nx, ny) {
                found = Some(((nx, ny), k));
                break;
            }
        }

        // isolated pixel
        let Some((next, k)) = found else {
            points.push(current);
            break;
        };

        match first_move {
            None => first_move = Some(next),
            Some(first) if current == start && next == first => break,
            _ => {}
        }
        points.push(current);

        // the last background neighbour seen, expressed from the next pixel
        back_dir = if k % 2 == 0 { (k + 6) % 8 } else { (k + 5) % 8 };
        current = next;
    }

    points
}

/// Find the outer contours of the foreground regions of a binary image.
///
/// Non-zero pixels are foreground and regions are 8-connected. Regions
/// nested inside the holes of another region are not reported, only the
/// outermost border of each region tree.
///
/// # Arguments
///
/// * `src` - The binary mask.
///
/// # Returns
///
/// The contours in raster order of their top-left pixel.
pub fn find_external_contours(src: &Image<u8, 1>) -> Vec<Contour> {
    let filled = fill_holes(src);
    let (w, h) = (src.width() as i64, src.height() as i64);
    let grid = Grid {
        data: &filled,
        width: w,
        height: h,
    };

    let mut labelled = vec![false; filled.len()];
    let mut contours = Vec::new();
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) as usize;
            if filled[i] == 0 || labelled[i] {
                continue;
            }

            contours.push(Contour {
                points: trace_border(&grid, (x, y)),
            });

            // mark the whole region so it is traced once
            labelled[i] = true;
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for (dx, dy) in DIRS_8 {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if let Some(j) = grid.index(nx, ny) {
                        if filled[j] != 0 && !labelled[j] {
                            labelled[j] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
        }
    }

    contours
}

fn cross(o: (i64, i64), a: (i64, i64), b: (i64, i64)) -> i64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Compute the convex hull of a point set with the monotone chain method.
///
/// Collinear points on the hull edges are dropped. Fewer than three
/// distinct points are returned as they are.
pub fn convex_hull(points: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut pts = points.to_vec();
    pts.sort_unstable();
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<(i64, i64)> = Vec::with_capacity(pts.len() * 2);
    for &p in pts.iter() {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::{ImageError, ImageSize};

    fn mask(width: usize, height: usize, rects: &[(usize, usize, usize, usize)]) -> Image<u8, 1> {
        let mut data = vec![0u8; width * height];
        for &(x, y, w, h) in rects {
            for yy in y..y + h {
                for xx in x..x + w {
                    data[yy * width + xx] = 255;
                }
            }
        }
        Image::new(ImageSize { width, height }, data).unwrap_or_else(|_| Image::empty())
    }

    #[test]
    fn test_two_regions() {
        let m = mask(12, 10, &[(1, 1, 3, 2), (6, 4, 4, 5)]);
        let contours = find_external_contours(&m);
        assert_eq!(contours.len(), 2);
        assert_eq!(
            contours[0].bounding_rect(),
            Rect {
                x: 1,
                y: 1,
                width: 3,
                height: 2
            }
        );
        assert_eq!(
            contours[1].bounding_rect(),
            Rect {
                x: 6,
                y: 4,
                width: 4,
                height: 5
            }
        );
        // border of a 4x5 block
        assert_eq!(contours[1].points.len(), 14);
    }

    #[test]
    fn test_nested_region_is_not_external() -> Result<(), ImageError> {
        // a ring with a dot inside its hole
        let mut m = mask(9, 9, &[(1, 1, 7, 7)]);
        for y in 2..7 {
            for x in 2..7 {
                *m.get_mut([y, x, 0]).ok_or(ImageError::EmptyImage)? = 0;
            }
        }
        *m.get_mut([4, 4, 0]).ok_or(ImageError::EmptyImage)? = 255;

        let contours = find_external_contours(&m);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].bounding_rect().width, 7);
        Ok(())
    }

    #[test]
    fn test_single_pixel_and_diagonal() {
        let m = mask(5, 5, &[(2, 2, 1, 1)]);
        let contours = find_external_contours(&m);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![(2, 2)]);

        // diagonal neighbours form one region
        let m = mask(5, 5, &[(1, 1, 1, 1), (2, 2, 1, 1)]);
        assert_eq!(find_external_contours(&m).len(), 1);
    }

    #[test]
    fn test_convex_hull() {
        let pts = [(0, 0), (4, 0), (2, 1), (4, 4), (0, 4), (2, 2), (2, 0)];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        for corner in [(0, 0), (4, 0), (4, 4), (0, 4)] {
            assert!(hull.contains(&corner));
        }
        assert_eq!(convex_hull(&[(1, 1), (1, 1)]), vec![(1, 1)]);
    }

    #[test]
    fn test_rect_overlap() {
        let a = Rect {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        let b = Rect {
            x: 3,
            y: 3,
            width: 2,
            height: 2,
        };
        let c = Rect {
            x: 4,
            y: 0,
            width: 2,
            height: 2,
        };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.bottom_right(), (3, 3));
    }
}
