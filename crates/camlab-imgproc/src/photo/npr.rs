use camlab_image::{Frame, GrayImage, Image, ImageError};

use super::domain_transform_filter;
use crate::{
    color::{rgb_from_ycrcb, ycrcb_from_rgb},
    filter::spatial_gradient,
};

// gain from the smoothed gradient magnitude to pencil stroke darkness
const STROKE_GAIN: f32 = 10.0;

// amplification of the detail layer
const DETAIL_GAIN: f32 = 3.0;

fn to_unit<const C: usize>(src: &Image<u8, C>) -> Result<Image<f32, C>, ImageError> {
    src.cast_and_scale::<f32>(1.0 / 255.0)
}

fn from_unit<const C: usize>(src: &Image<f32, C>) -> Image<u8, C> {
    src.map(|v| v * 255.0).to_u8_saturate()
}

// the luma plane of a frame in [0, 1] plus the full YCrCb frame
fn luma(src: &Frame) -> Result<(Image<f32, 1>, Frame), ImageError> {
    let mut ycrcb = Frame::from_size_val(src.size(), 0)?;
    ycrcb_from_rgb(src, &mut ycrcb)?;
    let y = to_unit(&ycrcb.channel(0)?)?;
    Ok((y, ycrcb))
}

// write a [0, 1] luma plane back into a YCrCb frame and convert to RGB
fn with_luma(mut ycrcb: Frame, y: &Image<f32, 1>) -> Result<Frame, ImageError> {
    ycrcb
        .as_slice_mut()
        .chunks_exact_mut(3)
        .zip(y.as_slice())
        .for_each(|(px, &v)| px[0] = (v * 255.0).round().clamp(0.0, 255.0) as u8);
    let mut dst = Frame::from_size_val(ycrcb.size(), 0)?;
    rgb_from_ycrcb(&ycrcb, &mut dst)?;
    Ok(dst)
}

/// Smooth a frame while keeping its strong edges.
///
/// # Arguments
///
/// * `src` - The source frame.
/// * `sigma_s` - The spatial extent of the smoothing, in pixels.
/// * `sigma_r` - How different two colours may be and still be averaged, in `[0, 1]`.
pub fn edge_preserving(src: &Frame, sigma_s: f32, sigma_r: f32) -> Result<Frame, ImageError> {
    let filtered = domain_transform_filter(&to_unit(src)?, sigma_s, sigma_r)?;
    Ok(from_unit(&filtered))
}

/// Enhance the fine details of a frame.
///
/// The luma is split into an edge preserving base layer and a detail layer;
/// the detail layer is amplified and added back.
pub fn detail_enhance(src: &Frame, sigma_s: f32, sigma_r: f32) -> Result<Frame, ImageError> {
    let (y, ycrcb) = luma(src)?;
    let base = domain_transform_filter(&y, sigma_s, sigma_r)?;

    let enhanced = Image::<f32, 1>::new(
        y.size(),
        y.as_slice()
            .iter()
            .zip(base.as_slice())
            .map(|(&l, &b)| (b + DETAIL_GAIN * (l - b)).clamp(0.0, 1.0))
            .collect(),
    )?;

    with_luma(ycrcb, &enhanced)
}

/// Pencil like drawing of a frame.
///
/// Strokes follow the gradient of the edge preserving smoothed luma. The
/// `shade` factor controls how much the original brightness darkens the
/// paper.
///
/// # Returns
///
/// The gray sketch and the colour sketch, which keeps the source chroma.
pub fn pencil_sketch(
    src: &Frame,
    sigma_s: f32,
    sigma_r: f32,
    shade: f32,
) -> Result<(GrayImage, Frame), ImageError> {
    let (y, ycrcb) = luma(src)?;
    let smoothed = domain_transform_filter(&y, sigma_s, sigma_r)?;
    let (gx, gy) = spatial_gradient(&smoothed)?;

    let sketch = Image::<f32, 1>::new(
        y.size(),
        y.as_slice()
            .iter()
            .zip(gx.as_slice().iter().zip(gy.as_slice()))
            .map(|(&l, (&dx, &dy))| {
                let magnitude = (dx * dx + dy * dy).sqrt() / 8.0;
                let pen = (1.0 - STROKE_GAIN * magnitude).clamp(0.0, 1.0);
                pen * (1.0 - shade * (1.0 - l))
            })
            .collect(),
    )?;

    let gray = from_unit(&sketch);
    let color = with_luma(ycrcb, &sketch)?;
    Ok((gray, color))
}

/// Cartoon like rendering of a frame.
///
/// The frame is flattened with the edge preserving filter and its edges,
/// taken from the filtered gradient magnitude, are drawn darker.
pub fn stylization(src: &Frame, sigma_s: f32, sigma_r: f32) -> Result<Frame, ImageError> {
    let filtered = domain_transform_filter(&to_unit(src)?, sigma_s, sigma_r)?;
    let (gx, gy) = spatial_gradient(&filtered)?;

    let mut data = filtered.as_slice().to_vec();
    data.chunks_exact_mut(3)
        .zip(gx.as_slice().chunks_exact(3).zip(gy.as_slice().chunks_exact(3)))
        .for_each(|(px, (dx, dy))| {
            let magnitude = dx
                .iter()
                .zip(dy)
                .map(|(a, b)| (a * a + b * b).sqrt())
                .sum::<f32>()
                / 3.0;
            let keep = (1.0 - magnitude).clamp(0.0, 1.0);
            px.iter_mut().for_each(|v| *v *= keep);
        });

    Ok(from_unit(&Image::<f32, 3>::new(src.size(), data)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlab_image::ImageSize;

    fn split_frame() -> Result<Frame, ImageError> {
        let size = ImageSize {
            width: 24,
            height: 16,
        };
        let mut frame = Frame::from_size_val(size, 60)?;
        for y in 0..16 {
            for x in 12..24 {
                frame.pixel_mut(x, y).copy_from_slice(&[200, 180, 160]);
            }
        }
        Ok(frame)
    }

    #[test]
    fn test_uniform_frames_are_stable() -> Result<(), ImageError> {
        let frame = Frame::from_size_val([10, 8].into(), 90)?;
        let close = |a: &Frame| a.as_slice().iter().all(|&v| (v as i32 - 90).abs() <= 2);

        assert!(close(&edge_preserving(&frame, 50.0, 0.15)?));
        assert!(close(&detail_enhance(&frame, 50.0, 0.15)?));
        assert!(close(&stylization(&frame, 50.0, 0.15)?));
        Ok(())
    }

    #[test]
    fn test_stylization_darkens_edges() -> Result<(), ImageError> {
        let frame = split_frame()?;
        let dst = stylization(&frame, 50.0, 0.15)?;
        assert_eq!(dst.size(), frame.size());
        let edge = dst.pixel(12, 8)[0];
        let flat = dst.pixel(20, 8)[0];
        assert!(edge < flat, "edge {edge} flat {flat}");
        Ok(())
    }

    #[test]
    fn test_pencil_sketch() -> Result<(), ImageError> {
        let frame = split_frame()?;
        let (gray, color) = pencil_sketch(&frame, 50.0, 0.15, 0.03)?;
        assert_eq!(color.size(), frame.size());

        // paper stays bright, strokes mark the boundary
        let paper = gray.pixel(4, 8)[0];
        let stroke = gray.pixel(12, 8)[0];
        assert!(paper > 240, "paper {paper}");
        assert!(stroke < paper);
        Ok(())
    }
}
