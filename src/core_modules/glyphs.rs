// A tiny 5x7 bitmap font for burning object ids into mosaic tiles.
// Only the characters an id can contain are defined.

use image::{GrayImage, Luma};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SPACING: u32 = 1;

// Rows top to bottom, bit 4 is the leftmost column.
const DIGITS: [[u8; 7]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
];

fn glyph(c: char) -> Option<&'static [u8; 7]> {
    c.to_digit(10).map(|d| &DIGITS[d as usize])
}

/// Integer scale that makes the 7 pixel glyphs roughly `font_size` tall.
pub fn scale_for(font_size: u32) -> u32 {
    (font_size / GLYPH_HEIGHT).max(1)
}

/// Draws `text` with its baseline at `baseline_y` and left edge at `x`.
/// Characters without a glyph advance the cursor but draw nothing; pixels falling
/// outside `image` are clipped.
pub fn draw_text(image: &mut GrayImage, text: &str, x: i64, baseline_y: i64, scale: u32, value: u8) {
    let scale = scale.max(1) as i64;
    let top = baseline_y - GLYPH_HEIGHT as i64 * scale;
    let advance = (GLYPH_WIDTH + GLYPH_SPACING) as i64 * scale;

    for (n, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let left = x + n as i64 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let px = left + col as i64 * scale;
                let py = top + row as i64 * scale;
                fill_block(image, px, py, scale, value);
            }
        }
    }
}

fn fill_block(image: &mut GrayImage, x: i64, y: i64, size: i64, value: u8) {
    for dy in 0..size {
        for dx in 0..size {
            let (px, py) = (x + dx, y + dy);
            if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
                image.put_pixel(px as u32, py as u32, Luma([value]));
            }
        }
    }
}
