use std::io::Cursor;

use ab_glyph::{point, Font as _, FontVec, PxScale, ScaleFont as _};
use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Pixel as _, Rgba, RgbaImage};
use photoforge_contracts::{EditError, ImageConfiguration, Mode, OutputFormat, StatusBarStyle};

use crate::assets::{AssetKind, AssetStore};

// Policy constants. Visually-reasonable defaults carried over from the
// original bot; no deeper rationale is documented there.
pub const ICON_SIZE: u32 = 512;
pub const ROUNDED_CORNER_RADIUS: u32 = 80;
pub const STATUS_BAR_RATIO: f32 = 0.055;
pub const BRIGHTNESS_THRESHOLD: f32 = 140.0;
pub const FRAME_FIT_WIDTH: f32 = 0.88;
pub const FRAME_FIT_HEIGHT: f32 = 0.90;
pub const CLOCK_HEIGHT_RATIO: f32 = 0.55;
pub const CLOCK_FONT_KEY: &str = "clock";

/// Encoded pipeline output plus the conventional `edited.<ext>` filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Runs the full transformation for one completed configuration.
///
/// Pure except for the wall-clock read in the status-bar stage. The icon
/// crop and the status-bar cleanup are mutually exclusive (mode decides);
/// the frame stage may follow either branch or neither.
pub fn process_image(
    source: &[u8],
    config: &ImageConfiguration,
    assets: &dyn AssetStore,
) -> Result<ProcessedImage, EditError> {
    let decoded =
        image::load_from_memory(source).map_err(|err| EditError::Decode(err.to_string()))?;
    let mut img = decoded.to_rgba8();

    match config.mode {
        Mode::Logo => img = icon_crop(&img, IconShape::Ellipse),
        Mode::Rounded => img = icon_crop(&img, IconShape::RoundedRect),
        Mode::Screenshot if config.clean_status_bar => {
            let style = config.status_bar_style.unwrap_or(StatusBarStyle::IosLight);
            clean_status_bar(&mut img, style, assets);
        }
        Mode::Screenshot => {}
    }

    if let Some(device) = config.mockup_device.as_deref() {
        img = composite_frame(img, device, assets);
    }

    let bytes = encode(img, config.format, config.quality)?;
    Ok(ProcessedImage {
        bytes,
        filename: config.output_filename(),
    })
}

#[derive(Debug, Clone, Copy)]
enum IconShape {
    Ellipse,
    RoundedRect,
}

impl IconShape {
    /// Mask membership test against the pixel center.
    fn contains(self, x: u32, y: u32) -> bool {
        let size = ICON_SIZE as f32;
        let cx = x as f32 + 0.5;
        let cy = y as f32 + 0.5;
        match self {
            IconShape::Ellipse => {
                let r = size / 2.0;
                let dx = cx - r;
                let dy = cy - r;
                dx * dx + dy * dy <= r * r
            }
            IconShape::RoundedRect => {
                let r = ROUNDED_CORNER_RADIUS as f32;
                let dx = if cx < r {
                    r - cx
                } else if cx > size - r {
                    cx - (size - r)
                } else {
                    0.0
                };
                let dy = if cy < r {
                    r - cy
                } else if cy > size - r {
                    cy - (size - r)
                } else {
                    0.0
                };
                dx * dx + dy * dy <= r * r
            }
        }
    }
}

/// Fill-fits the source to the fixed icon square, then composites it onto a
/// transparent canvas through the shape mask. Everything outside the shape
/// ends up fully transparent.
fn icon_crop(img: &RgbaImage, shape: IconShape) -> RgbaImage {
    let fitted = DynamicImage::ImageRgba8(img.clone())
        .resize_to_fill(ICON_SIZE, ICON_SIZE, FilterType::Lanczos3)
        .to_rgba8();
    let mut out = RgbaImage::from_pixel(ICON_SIZE, ICON_SIZE, Rgba([0, 0, 0, 0]));
    for (x, y, pixel) in fitted.enumerate_pixels() {
        if shape.contains(x, y) {
            out.put_pixel(x, y, *pixel);
        }
    }
    out
}

/// Replaces the status-bar band with a style overlay (or a solid fill of the
/// band's dominant color when the overlay is missing or unreadable), then
/// draws the current wall-clock time near the left edge.
fn clean_status_bar(img: &mut RgbaImage, style: StatusBarStyle, assets: &dyn AssetStore) {
    let (width, height) = img.dimensions();
    let band_h = band_height(height);
    let (r, g, b) = dominant_band_color(img, band_h);
    let color = icon_color(brightness(r, g, b));

    let overlay = assets
        .resolve(AssetKind::Overlay, style.asset_key())
        .and_then(|bytes| image::load_from_memory(&bytes).ok());
    match overlay {
        Some(decoded) => {
            let strip = decoded
                .resize_exact(width, band_h, FilterType::Lanczos3)
                .to_rgba8();
            image::imageops::overlay(img, &strip, 0, 0);
        }
        None => fill_band(img, band_h, Rgba([r, g, b, 255])),
    }

    let clock = Local::now().format("%I:%M").to_string();
    let size_px = band_h as f32 * CLOCK_HEIGHT_RATIO;
    let x = (width as f32 * 0.04) as i32;
    let y = (band_h as f32 * 0.18) as i32;
    let font = assets
        .resolve(AssetKind::Font, CLOCK_FONT_KEY)
        .and_then(|bytes| FontVec::try_from_vec(bytes).ok());
    match font {
        Some(font) => draw_text_ttf(img, &font, &clock, x, y, size_px, color),
        None => draw_text_bitmap(img, &clock, x, y, size_px, color),
    }
}

pub(crate) fn band_height(height: u32) -> u32 {
    ((height as f32 * STATUS_BAR_RATIO).round() as u32).max(1)
}

/// Per-channel median over the band's pixels.
fn dominant_band_color(img: &RgbaImage, band_h: u32) -> (u8, u8, u8) {
    let (width, height) = img.dimensions();
    let rows = band_h.min(height);
    let mut rs = Vec::with_capacity((width * rows) as usize);
    let mut gs = Vec::with_capacity((width * rows) as usize);
    let mut bs = Vec::with_capacity((width * rows) as usize);
    for y in 0..rows {
        for x in 0..width {
            let pixel = img.get_pixel(x, y);
            rs.push(pixel[0]);
            gs.push(pixel[1]);
            bs.push(pixel[2]);
        }
    }
    (median(&mut rs), median(&mut gs), median(&mut bs))
}

fn median(values: &mut [u8]) -> u8 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    values[values.len() / 2]
}

fn brightness(r: u8, g: u8, b: u8) -> f32 {
    (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) as f32 / 1000.0
}

/// Translucent near-white on dark bands, translucent near-black on light
/// ones, so the clock stays legible against the sampled background.
fn icon_color(brightness: f32) -> Rgba<u8> {
    if brightness < BRIGHTNESS_THRESHOLD {
        Rgba([255, 255, 255, 220])
    } else {
        Rgba([40, 40, 40, 220])
    }
}

fn fill_band(img: &mut RgbaImage, band_h: u32, color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    for y in 0..band_h.min(height) {
        for x in 0..width {
            img.put_pixel(x, y, color);
        }
    }
}

fn blend_pixel(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    let alpha = (f32::from(color[3]) * coverage).round().clamp(0.0, 255.0) as u8;
    if alpha == 0 {
        return;
    }
    let src = Rgba([color[0], color[1], color[2], alpha]);
    img.get_pixel_mut(x as u32, y as u32).blend(&src);
}

fn draw_text_ttf(
    img: &mut RgbaImage,
    font: &FontVec,
    text: &str,
    x: i32,
    y: i32,
    size_px: f32,
    color: Rgba<u8>,
) {
    let scale = PxScale::from(size_px.max(1.0));
    let scaled = font.as_scaled(scale);
    let mut caret = x as f32;
    let baseline = y as f32 + scaled.ascent();
    for ch in text.chars() {
        let glyph_id = scaled.glyph_id(ch);
        let glyph = glyph_id.with_scale_and_position(scale, point(caret, baseline));
        caret += scaled.h_advance(glyph_id);
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                blend_pixel(
                    img,
                    bounds.min.x as i32 + gx as i32,
                    bounds.min.y as i32 + gy as i32,
                    color,
                    coverage,
                );
            });
        }
    }
}

// 5x7 glyphs for the clock digits and separator; bit 4 is the leftmost
// column. Used whenever no font asset resolves.
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_WIDTH: i32 = 5;

fn bitmap_glyph(ch: char) -> Option<[u8; 7]> {
    match ch {
        '0' => Some([0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E]),
        '1' => Some([0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E]),
        '2' => Some([0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F]),
        '3' => Some([0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E]),
        '4' => Some([0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02]),
        '5' => Some([0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E]),
        '6' => Some([0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E]),
        '7' => Some([0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08]),
        '8' => Some([0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E]),
        '9' => Some([0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C]),
        ':' => Some([0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00]),
        _ => None,
    }
}

fn draw_text_bitmap(
    img: &mut RgbaImage,
    text: &str,
    x: i32,
    y: i32,
    size_px: f32,
    color: Rgba<u8>,
) {
    let scale = ((size_px / GLYPH_HEIGHT as f32).round() as i32).max(1);
    let mut caret = x;
    for ch in text.chars() {
        if let Some(rows) = bitmap_glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0x10 >> col) == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            blend_pixel(
                                img,
                                caret + col * scale + dx,
                                y + row as i32 * scale + dy,
                                color,
                                1.0,
                            );
                        }
                    }
                }
            }
        }
        caret += (GLYPH_WIDTH + 1) * scale;
    }
}

/// Best-effort device-bezel compositing: fill-fit the processed image into
/// the frame's screen proportions, center it, and lay the frame on top.
/// A missing or unreadable frame asset skips the stage entirely.
fn composite_frame(img: RgbaImage, device: &str, assets: &dyn AssetStore) -> RgbaImage {
    let Some(frame) = assets
        .resolve(AssetKind::Frame, device)
        .and_then(|bytes| image::load_from_memory(&bytes).ok())
    else {
        return img;
    };
    let frame = frame.to_rgba8();
    let (frame_w, frame_h) = frame.dimensions();
    let target_w = ((frame_w as f32 * FRAME_FIT_WIDTH) as u32).max(1);
    let target_h = ((frame_h as f32 * FRAME_FIT_HEIGHT) as u32).max(1);

    let fitted = DynamicImage::ImageRgba8(img)
        .resize_to_fill(target_w, target_h, FilterType::Lanczos3)
        .to_rgba8();
    let mut canvas = RgbaImage::from_pixel(frame_w, frame_h, Rgba([0, 0, 0, 0]));
    let offset_x = i64::from((frame_w - fitted.width()) / 2);
    let offset_y = i64::from((frame_h - fitted.height()) / 2);
    image::imageops::overlay(&mut canvas, &fitted, offset_x, offset_y);
    image::imageops::overlay(&mut canvas, &frame, 0, 0);
    canvas
}

fn encode(img: RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, EditError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        OutputFormat::Jpeg => {
            // JPEG carries no alpha; flatten to RGB before encoding.
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut out, quality);
            rgb.write_with_encoder(encoder)
                .map_err(|err| EditError::Encode(err.to_string()))?;
        }
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(img)
                .write_to(&mut out, ImageFormat::Png)
                .map_err(|err| EditError::Encode(err.to_string()))?;
        }
        OutputFormat::Webp => {
            // The image crate's WebP encoder is lossless; the quality hint
            // only applies to JPEG.
            DynamicImage::ImageRgba8(img)
                .write_to(&mut out, ImageFormat::WebP)
                .map_err(|err| EditError::Encode(err.to_string()))?;
        }
    }
    Ok(out.into_inner())
}
