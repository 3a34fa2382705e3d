//! Software drawing primitives for the preview framebuffer.
//!
//! The buffer is one packed 0RGB `u32` per pixel, row-major.

/// 5x7 bitmap glyphs, one 5-bit row per byte, MSB-side left.
const GLYPH_WIDTH: usize = 5;
const GLYPH_HEIGHT: usize = 7;

pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

pub fn put_pixel(buffer: &mut [u32], width: usize, height: usize, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= width || y >= height {
        return;
    }
    buffer[y * width + x] = color;
}

/// Bresenham line with a square brush of the given thickness.
pub fn draw_line(
    buffer: &mut [u32],
    width: usize,
    height: usize,
    p0: (i32, i32),
    p1: (i32, i32),
    color: u32,
    thickness: i32,
) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for oy in -radius..=radius {
            for ox in -radius..=radius {
                put_pixel(buffer, width, height, x0 + ox, y0 + oy, color);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

pub fn draw_circle(
    buffer: &mut [u32],
    width: usize,
    height: usize,
    center: (i32, i32),
    radius: i32,
    color: u32,
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

pub fn fill_rect(
    buffer: &mut [u32],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    color: u32,
) {
    for dy in 0..h {
        for dx in 0..w {
            put_pixel(buffer, width, height, x + dx, y + dy, color);
        }
    }
}

/// Render uppercase text at (x, y) with the given integer scale.
/// Unsupported characters render as blanks.
pub fn draw_text(
    buffer: &mut [u32],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    text: &str,
    color: u32,
    scale: i32,
) {
    let scale = scale.max(1);
    let advance = (GLYPH_WIDTH as i32 + 1) * scale;

    for (i, ch) in text.chars().enumerate() {
        let rows = glyph_rows(ch.to_ascii_uppercase());
        let gx = x + i as i32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    fill_rect(
                        buffer,
                        width,
                        height,
                        gx + col as i32 * scale,
                        y + row as i32 * scale,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
    }
}

fn glyph_rows(ch: char) -> [u8; GLYPH_HEIGHT] {
    match ch {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0E],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11],
        'X' => [0x11, 0x0A, 0x04, 0x04, 0x04, 0x0A, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x06, 0x08, 0x10, 0x1F],
        '3' => [0x0E, 0x11, 0x01, 0x06, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        _ => [0x00; GLYPH_HEIGHT],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_rgb() {
        assert_eq!(pack_rgb(0xFF, 0x00, 0x00), 0x00FF0000);
        assert_eq!(pack_rgb(0x12, 0x34, 0x56), 0x00123456);
    }

    #[test]
    fn test_put_pixel_bounds() {
        let mut buf = vec![0u32; 4 * 4];
        put_pixel(&mut buf, 4, 4, -1, 0, 0xFF);
        put_pixel(&mut buf, 4, 4, 4, 0, 0xFF);
        put_pixel(&mut buf, 4, 4, 0, 17, 0xFF);
        assert!(buf.iter().all(|&p| p == 0));

        put_pixel(&mut buf, 4, 4, 2, 1, 0xFF);
        assert_eq!(buf[1 * 4 + 2], 0xFF);
    }

    #[test]
    fn test_draw_line_endpoints() {
        let mut buf = vec![0u32; 8 * 8];
        draw_line(&mut buf, 8, 8, (1, 1), (6, 6), 0xAB, 1);
        assert_eq!(buf[1 * 8 + 1], 0xAB);
        assert_eq!(buf[6 * 8 + 6], 0xAB);
        // Diagonal passes through the middle
        assert_eq!(buf[3 * 8 + 3], 0xAB);
    }

    #[test]
    fn test_draw_circle_covers_center() {
        let mut buf = vec![0u32; 16 * 16];
        draw_circle(&mut buf, 16, 16, (8, 8), 3, 0xCC);
        assert_eq!(buf[8 * 16 + 8], 0xCC);
        assert_eq!(buf[8 * 16 + 11], 0xCC);
        assert_eq!(buf[8 * 16 + 12], 0);
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let mut buf = vec![0u32; 32 * 16];
        draw_text(&mut buf, 32, 16, 0, 0, "H", 0xEE, 1);
        // 'H' has lit pixels in its top corners
        assert_eq!(buf[0], 0xEE);
        assert_eq!(buf[4], 0xEE);
        assert_eq!(buf[1], 0);
    }

}
