//! Placeholder frame for simulated capture: a dark blue radial gradient, a
//! faint scan line and a two-line caption in a 5×7 bitmap font.

use std::time::{SystemTime, UNIX_EPOCH};

use image::{Rgb, RgbImage};

const CENTER_COLOR: [u8; 3] = [0x1e, 0x3a, 0x8a];
const EDGE_COLOR: [u8; 3] = [0x02, 0x06, 0x17];
const TITLE_COLOR: [u8; 3] = [0xff, 0xff, 0xff];
const DETAIL_COLOR: [u8; 3] = [0x93, 0xc5, 0xfd];
const SCAN_ALPHA: f32 = 0.2;

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

/// Scan line position for "now"; sweeps the frame every 4.8 s.
pub fn scan_line_now(height: u32) -> u32 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    ((millis % 4800) / 10) as u32 % height.max(1)
}

pub fn render(width: u32, height: u32, title: &str, detail: &str, scan_y: u32) -> RgbImage {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    // Inner/outer radii relative to a 640-wide frame.
    let unit = width as f32 / 640.0;
    let (r0, r1) = (50.0 * unit, 400.0 * unit);

    let mut img = RgbImage::from_fn(width, height, |x, y| {
        let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        let t = ((d - r0) / (r1 - r0)).clamp(0.0, 1.0);
        Rgb(lerp(CENTER_COLOR, EDGE_COLOR, t))
    });

    for y in scan_y..(scan_y + 2).min(height) {
        for x in 0..width {
            let px = img.get_pixel_mut(x, y);
            px.0 = lerp(px.0, DETAIL_COLOR, SCAN_ALPHA);
        }
    }

    let title_scale = (3.0 * unit).round().max(1.0) as u32;
    let detail_scale = (2.0 * unit).round().max(1.0) as u32;
    draw_centered(&mut img, title, (cy - 30.0 * unit) as u32, title_scale, TITLE_COLOR);
    draw_centered(&mut img, detail, (cy + 5.0 * unit) as u32, detail_scale, DETAIL_COLOR);
    img
}

fn lerp(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |i: usize| (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    [mix(0), mix(1), mix(2)]
}

fn draw_centered(img: &mut RgbImage, text: &str, top: u32, scale: u32, color: [u8; 3]) {
    let advance = (GLYPH_W + 1) * scale;
    let text_width = advance * text.chars().count() as u32;
    let mut left = img.width().saturating_sub(text_width) / 2;
    for c in text.chars() {
        draw_glyph(img, glyph(c), left, top, scale, color);
        left += advance;
    }
}

fn draw_glyph(
    img: &mut RgbImage,
    rows: [u8; GLYPH_H as usize],
    left: u32,
    top: u32,
    scale: u32,
    color: [u8; 3],
) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_W {
            if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                continue;
            }
            let x0 = left + col * scale;
            let y0 = top + row as u32 * scale;
            for y in y0..y0 + scale {
                for x in x0..x0 + scale {
                    if x < img.width() && y < img.height() {
                        img.put_pixel(x, y, Rgb(color));
                    }
                }
            }
        }
    }
}

fn glyph(c: char) -> [u8; GLYPH_H as usize] {
    match c.to_uppercase().next().unwrap_or(c) {
        'A' | 'À' | 'Â' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' | 'Ç' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' | 'É' | 'È' | 'Ê' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' | 'Î' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' | 'Ô' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' | 'Ù' | 'Û' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        _ => [0; 7],
    }
}
