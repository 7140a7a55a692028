use opencv::core::{Mat, Rect, Size, Vec3f};
use opencv::imgproc::InterpolationFlags;
use opencv::prelude::*;
use opencv::{core, imgcodecs, imgproc};

use crate::error::{Error, Result};

#[cfg(feature = "pretrained")]
mod pretrained;
#[cfg(feature = "pretrained")]
pub use self::pretrained::{PretrainedEmbedder, PretrainedModel};

/// Short side of the image after the first resize
pub const RESIZE_SHORT: i32 = 224;
/// Center crop size as `(width, height)`
pub const CROP_SIZE: (i32, i32) = (224, 244);
/// Per-channel RGB mean and standard deviation of the normalization
pub const MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

/// Turns encoded image bytes into a fixed-length vector
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by `embed`
    fn dimension(&self) -> usize;

    fn embed(&self, data: &[u8]) -> Result<Vec<f32>>;
}

/// Decode an image into a 3-channel RGB matrix
///
/// Grayscale images are expanded to three identical channels.
pub fn decode_rgb(data: &[u8]) -> Result<Mat> {
    let buf = Mat::from_slice(data)?;
    let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_ANYCOLOR)?;
    if img.empty() {
        return Err(Error::Embedding("unable to decode image".to_string()));
    }
    let code = match img.channels() {
        1 => imgproc::COLOR_GRAY2RGB,
        3 => imgproc::COLOR_BGR2RGB,
        4 => imgproc::COLOR_BGRA2RGB,
        n => return Err(Error::Embedding(format!("unsupported channel count: {}", n))),
    };
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(&img, &mut rgb, code)?;
    Ok(rgb)
}

/// Size of the largest crop with the aspect ratio of `target` fitting into `src`
pub fn scale_down(src: (i32, i32), target: (i32, i32)) -> (i32, i32) {
    let (sw, sh) = (src.0 as f32, src.1 as f32);
    let (mut w, mut h) = (target.0 as f32, target.1 as f32);
    if sh < h {
        w = w * sh / h;
        h = sh;
    }
    if sw < w {
        h = h * sw / w;
        w = sw;
    }
    (w as i32, h as i32)
}

/// Resize the short side to [`RESIZE_SHORT`], then center crop to [`CROP_SIZE`]
///
/// Returns a `CV_32FC3` matrix scaled to `[0, 1]`.
pub fn preprocess(rgb: &Mat) -> Result<Mat> {
    let (w, h) = (rgb.cols(), rgb.rows());
    let (rw, rh) = if w < h {
        (RESIZE_SHORT, (h as f32 * RESIZE_SHORT as f32 / w as f32) as i32)
    } else {
        ((w as f32 * RESIZE_SHORT as f32 / h as f32) as i32, RESIZE_SHORT)
    };
    let mut resized = Mat::default();
    imgproc::resize(
        rgb,
        &mut resized,
        Size::new(rw.max(1), rh.max(1)),
        0.,
        0.,
        InterpolationFlags::INTER_LINEAR as i32,
    )?;

    let (cw, ch) = scale_down((resized.cols(), resized.rows()), CROP_SIZE);
    let x0 = (resized.cols() - cw) / 2;
    let y0 = (resized.rows() - ch) / 2;
    let roi = Mat::roi(&resized, Rect::new(x0, y0, cw.max(1), ch.max(1)))?.try_clone()?;

    let mut cropped = Mat::default();
    imgproc::resize(
        &roi,
        &mut cropped,
        Size::new(CROP_SIZE.0, CROP_SIZE.1),
        0.,
        0.,
        InterpolationFlags::INTER_LINEAR as i32,
    )?;

    let mut scaled = Mat::default();
    cropped.convert_to(&mut scaled, core::CV_32FC3, 1. / 255., 0.)?;
    Ok(scaled)
}

/// Area-pools the normalized image into a `grid × grid` map per channel
///
/// Output layout is channel-major (`C × grid × grid`).
#[derive(Debug, Clone)]
pub struct PooledEmbedder {
    grid: i32,
}

impl PooledEmbedder {
    pub fn new(grid: u32) -> Self {
        Self { grid: grid.max(1) as i32 }
    }
}

impl Default for PooledEmbedder {
    fn default() -> Self {
        Self::new(8)
    }
}

impl Embedder for PooledEmbedder {
    fn dimension(&self) -> usize {
        3 * (self.grid * self.grid) as usize
    }

    fn embed(&self, data: &[u8]) -> Result<Vec<f32>> {
        let rgb = decode_rgb(data)?;
        let scaled = preprocess(&rgb)?;

        let mut pooled = Mat::default();
        imgproc::resize(
            &scaled,
            &mut pooled,
            Size::new(self.grid, self.grid),
            0.,
            0.,
            InterpolationFlags::INTER_AREA as i32,
        )?;

        let cells = (self.grid * self.grid) as usize;
        let mut vector = vec![0f32; self.dimension()];
        for row in 0..self.grid {
            for col in 0..self.grid {
                let px = pooled.at_2d::<Vec3f>(row, col)?;
                let cell = (row * self.grid + col) as usize;
                for c in 0..3 {
                    vector[c * cells + cell] = (px[c] - MEAN_RGB[c]) / STD_RGB[c];
                }
            }
        }
        Ok(vector)
    }
}
