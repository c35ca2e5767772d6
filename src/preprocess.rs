use clap::ValueEnum;
use image::{Rgb, RgbImage};
use ndarray::Array4;

/// Spatial input size a model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub width: u32,
    pub height: u32,
}

impl InputShape {
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }
}

/// Order of the colour channels in the last tensor axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    /// OpenCV decode order.
    Bgr,
}

/// Decodes an encoded image and lays it out as a `(1, height, width, 3)` batch.
///
/// The resize ignores aspect ratio: models are trained on images stretched
/// straight to their input size. Pixel values stay in `0.0..=255.0`.
pub fn to_batch(
    bytes: &[u8],
    shape: InputShape,
    order: ChannelOrder,
) -> Result<Array4<f32>, image::ImageError> {
    let img = image::load_from_memory(bytes)?.to_rgb8();
    let resized = resize_linear(&img, shape);

    let mut batch = Array4::<f32>::zeros((1, shape.height as usize, shape.width as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let channels = match order {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Bgr => [b, g, r],
        };
        for (c, value) in channels.into_iter().enumerate() {
            batch[[0, y as usize, x as usize, c]] = f32::from(value);
        }
    }

    Ok(batch)
}

/// Source taps for one output coordinate: two neighbours and the weight of the second.
#[derive(Debug, Clone, Copy)]
struct Tap {
    lo: u32,
    hi: u32,
    frac: f32,
}

/// Half-pixel-centre mapping `src = (dst + 0.5) * in / out - 0.5`, clamped to the edge.
fn taps(input: u32, output: u32) -> Vec<Tap> {
    let scale = f64::from(input) / f64::from(output);
    let last = input.saturating_sub(1);
    (0..output)
        .map(|dst| {
            let src = ((f64::from(dst) + 0.5) * scale - 0.5).max(0.0);
            let lo = src.floor() as u32;
            if lo >= last {
                Tap { lo: last, hi: last, frac: 0.0 }
            } else {
                Tap { lo, hi: lo + 1, frac: (src - f64::from(lo)) as f32 }
            }
        })
        .collect()
}

/// Bilinear resize sampling the 2x2 neighbourhood of each output pixel.
///
/// Unlike `FilterType::Triangle`, the kernel does not widen when shrinking,
/// so downscaled inputs match the linear resize the models were trained with.
fn resize_linear(img: &RgbImage, shape: InputShape) -> RgbImage {
    let xs = taps(img.width(), shape.width);
    let ys = taps(img.height(), shape.height);

    RgbImage::from_fn(shape.width, shape.height, |x, y| {
        let tx = xs[x as usize];
        let ty = ys[y as usize];
        let mut out = [0u8; 3];
        for (c, value) in out.iter_mut().enumerate() {
            let at = |px: u32, py: u32| f32::from(img.get_pixel(px, py)[c]);
            let top = at(tx.lo, ty.lo) * (1.0 - tx.frac) + at(tx.hi, ty.lo) * tx.frac;
            let bottom = at(tx.lo, ty.hi) * (1.0 - tx.frac) + at(tx.hi, ty.hi) * tx.frac;
            let v = top * (1.0 - ty.frac) + bottom * ty.frac;
            *value = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}
