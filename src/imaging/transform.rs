/// CPU-bound image transforms
///
/// Everything here is synchronous and meant to run on the blocking pool.
use image::{
    codecs::{
        gif::{GifDecoder, GifEncoder, Repeat},
        jpeg::JpegEncoder,
    },
    imageops::FilterType,
    AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageError, ImageFormat, ImageReader,
    Rgb, RgbImage,
};
use std::io::Cursor;

pub const FAVICON_SIZE: u32 = 32;

/// Failure with the pipeline stage it happened in
#[derive(Debug)]
pub struct TransformError {
    pub stage: &'static str,
    pub source: ImageError,
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stage, self.source)
    }
}

fn at(stage: &'static str) -> impl FnOnce(ImageError) -> TransformError {
    move |source| TransformError { stage, source }
}

/// Encoded output of one rendition
#[derive(Debug, Clone)]
pub struct Encoded {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Bounds and encoding effort for one size tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierSpec {
    pub max_dimension: u32,
    pub quality: u8,
    pub filter: FilterType,
}

/// Decode with EXIF orientation applied
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, TransformError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError {
            stage: "decode",
            source: ImageError::IoError(e),
        })?;
    let mut decoder = reader.into_decoder().map_err(at("decode"))?;
    let orientation = decoder.orientation().map_err(at("decode"))?;
    let mut img = DynamicImage::from_decoder(decoder).map_err(at("decode"))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Shrink to fit inside a square bound; images already inside are untouched
pub fn fit_within(img: DynamicImage, bound: u32, filter: FilterType) -> DynamicImage {
    if img.width() <= bound && img.height() <= bound {
        img
    } else {
        img.resize(bound, bound, filter)
    }
}

/// JPEG has no alpha channel; composite transparent pixels onto white
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let alpha = u16::from(p[3]);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, TransformError> {
    let rgb = DynamicImage::ImageRgb8(flatten_onto_white(img));
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder).map_err(at("encode"))?;
    Ok(buf)
}

/// Decode, orient, bound and re-encode one raster rendition
pub fn render_raster(bytes: &[u8], spec: TierSpec) -> Result<Encoded, TransformError> {
    let img = decode_oriented(bytes)?;
    let img = fit_within(img, spec.max_dimension, spec.filter);
    let data = encode_jpeg(&img, spec.quality)?;
    Ok(Encoded {
        data,
        width: img.width(),
        height: img.height(),
    })
}

/// 32x32 cover-fit PNG favicon
pub fn render_favicon(bytes: &[u8]) -> Result<Encoded, TransformError> {
    let img = decode_oriented(bytes)?;
    let img = img.resize_to_fill(FAVICON_SIZE, FAVICON_SIZE, FilterType::Lanczos3);

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(at("encode"))?;

    Ok(Encoded {
        data: buf,
        width: FAVICON_SIZE,
        height: FAVICON_SIZE,
    })
}

/// Resize every frame of an animated GIF to a 32x32 looping GIF
pub fn render_animated_favicon(bytes: &[u8]) -> Result<Encoded, TransformError> {
    let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(at("decode"))?;
    let frames = decoder.into_frames().collect_frames().map_err(at("decode"))?;

    let resized = frames.into_iter().map(|frame| {
        let delay = frame.delay();
        let buffer = DynamicImage::ImageRgba8(frame.into_buffer())
            .resize_to_fill(FAVICON_SIZE, FAVICON_SIZE, FilterType::Triangle)
            .to_rgba8();
        Frame::from_parts(buffer, 0, 0, delay)
    });

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite).map_err(at("encode"))?;
        encoder.encode_frames(resized).map_err(at("encode"))?;
    }

    Ok(Encoded {
        data: buf,
        width: FAVICON_SIZE,
        height: FAVICON_SIZE,
    })
}

/// Canvas size of an image without decoding pixel data
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    const THUMB: TierSpec = TierSpec {
        max_dimension: 300,
        quality: 80,
        filter: FilterType::Triangle,
    };

    #[test]
    fn test_large_image_is_bounded() {
        let out = render_raster(&fixtures::png(1200, 600), THUMB).unwrap();
        assert_eq!((out.width, out.height), (300, 150));
        assert_eq!(image::guess_format(&out.data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let out = render_raster(&fixtures::png(120, 80), THUMB).unwrap();
        assert_eq!((out.width, out.height), (120, 80));
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let out = render_raster(&fixtures::transparent_png(10, 10), THUMB).unwrap();
        let decoded = image::load_from_memory(&out.data).unwrap().to_rgb8();
        let p = decoded.get_pixel(5, 5).0;
        assert!(p.iter().all(|c| *c > 240), "expected white, got {:?}", p);
    }

    #[test]
    fn test_favicon_is_always_32() {
        for (w, h) in [(8, 8), (500, 200)] {
            let out = render_favicon(&fixtures::png(w, h)).unwrap();
            let decoded = image::load_from_memory(&out.data).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (32, 32));
        }
    }

    #[test]
    fn test_animated_favicon_keeps_frames() {
        let out = render_animated_favicon(&fixtures::gif(64, 48, 3)).unwrap();
        let decoder = GifDecoder::new(Cursor::new(&out.data)).unwrap();
        assert_eq!(decoder.dimensions(), (32, 32));
        let frames = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_garbage_fails_at_decode() {
        let err = render_raster(b"definitely not an image", THUMB).unwrap_err();
        assert_eq!(err.stage, "decode");
    }

    #[test]
    fn test_probe_dimensions() {
        assert_eq!(probe_dimensions(&fixtures::gif(40, 20, 2)), Some((40, 20)));
        assert_eq!(probe_dimensions(fixtures::SVG), None);
    }
}
