//! The compositor: turns the shared state into pixels, one frame at a time.
//! Priority order per frame: an active notification suppresses everything;
//! otherwise the current page renders. Night mode forces the foreground to a
//! fixed hue and floors output brightness.

use embedded_graphics::pixelcolor::Rgb888;

use crate::buffer::PixelBuffer;
use crate::clock::TimeHealth;
use crate::font::{self, LARGE_BOLD_ADVANCE, LARGE_WIDTH, SMALL_ADVANCE, SMALL_WIDTH};
use crate::icons;
use crate::state::{Page, SharedState};
use crate::weather::Condition;
use crate::{WIDTH, age_ms};

/// Default page foreground.
pub const DAY_TEXT: Rgb888 = Rgb888::new(255, 160, 40);
/// Fixed night-mode foreground hue.
pub const NIGHT_TEXT: Rgb888 = Rgb888::new(90, 20, 0);
/// Night-mode brightness floor.
pub const NIGHT_BRIGHTNESS: u8 = 10;

/// Status pixel: fresh external time.
pub const STATUS_LIVE: Rgb888 = Rgb888::new(0, 160, 60);
/// Status pixel: aging but usable time.
pub const STATUS_STALE: Rgb888 = Rgb888::new(255, 140, 0);

/// Temperature gradient endpoints (clamped outside 0..=100 °F).
pub const TEMP_COLD: Rgb888 = Rgb888::new(190, 215, 255);
pub const TEMP_HOT: Rgb888 = Rgb888::new(255, 45, 0);

/// Shown on the clock and weather pages when no usable time exists.
pub const NO_TIME_TEXT: &str = "NO TIME";

// Clock page layout: two bold hour digits, colon, two bold minute digits,
// spaced to fill all 32 columns.
const CLOCK_X: [i32; 4] = [0, 7, 18, 25];
const COLON_X: i32 = 15;

// Weather page: icon cell is the rightmost 8 columns.
const ICON_X: i32 = 24;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// How a notification text is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyLayout {
    /// Fits the large font: centered at this x.
    Large { x: i32 },
    /// Fits the small font only: centered at this x.
    Small { x: i32 },
    /// Wider than the matrix even in the small font: scrolls.
    Scroll { text_width: usize },
}

/// Decide the presentation for a notification text.
pub fn notification_layout(text: &str) -> NotifyLayout {
    let large = font::large_text_width(text);
    if large <= WIDTH {
        return NotifyLayout::Large {
            x: ((WIDTH - large) / 2) as i32,
        };
    }
    let small = font::small_text_width(text);
    if small <= WIDTH {
        NotifyLayout::Small {
            x: ((WIDTH - small) / 2) as i32,
        }
    } else {
        NotifyLayout::Scroll { text_width: small }
    }
}

/// Temperature color on the fixed cold→hot gradient.
pub fn temperature_color(temp_f: f32) -> Rgb888 {
    use embedded_graphics::prelude::RgbColor;
    let t = (temp_f / 100.0).clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| -> u8 { (a as f32 + (b as f32 - a as f32) * t) as u8 };
    Rgb888::new(
        lerp(TEMP_COLD.r(), TEMP_HOT.r()),
        lerp(TEMP_COLD.g(), TEMP_HOT.g()),
        lerp(TEMP_COLD.b(), TEMP_HOT.b()),
    )
}

pub struct Renderer {
    pub buffer: PixelBuffer,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            buffer: PixelBuffer::new(),
        }
    }

    /// Composite one frame. Returns false when the frame must be left
    /// untouched (calendar page without a usable time source); the caller
    /// keeps the previous output in that case.
    pub fn compose(&mut self, state: &mut SharedState, ambient: Option<u16>, now_ms: u32) -> bool {
        state.expire_notification(now_ms);

        let local = state.time.resolve(now_ms);
        let night = local.is_some_and(|t| t.is_night());
        state.brightness.recompute(ambient, night, NIGHT_BRIGHTNESS);

        if state.notification.active {
            self.buffer.clear();
            let color = if night {
                NIGHT_TEXT
            } else {
                state.notification.color
            };
            self.draw_notification(state, color, now_ms);
            return true;
        }

        let text_color = if night { NIGHT_TEXT } else { DAY_TEXT };
        match state.page.current_page {
            Page::Clock => {
                self.buffer.clear();
                match local {
                    Some(t) => {
                        self.draw_clock(t.hour, t.minute, state.page.colon_visible, text_color);
                        self.draw_status_pixel(state.time.health(now_ms));
                    }
                    None => self.draw_placeholder(text_color),
                }
            }
            Page::Calendar => match local {
                Some(t) => {
                    self.buffer.clear();
                    self.draw_calendar(t.month, t.day, text_color);
                }
                // no usable time: the calendar stays frozen on the last frame
                None => return false,
            },
            Page::Weather => {
                self.buffer.clear();
                match local {
                    Some(_) => self.draw_weather(state, night, text_color),
                    None => self.draw_placeholder(text_color),
                }
            }
        }
        true
    }

    fn draw_notification(&mut self, state: &SharedState, color: Rgb888, now_ms: u32) {
        let n = &state.notification;
        match notification_layout(n.text.as_str()) {
            NotifyLayout::Large { x } => {
                self.draw_large_text(x, 0, n.text.as_str(), false, color);
            }
            NotifyLayout::Small { x } => {
                self.draw_small_text(x, 1, n.text.as_str(), color);
            }
            NotifyLayout::Scroll { text_width } => {
                let speed = u32::from(n.scroll_speed_ms.max(1));
                let loop_px = (text_width + WIDTH) as u32;
                let step = age_ms(now_ms, n.started_at_ms) / speed;
                let x = WIDTH as i32 - (step % loop_px) as i32;
                self.draw_small_text(x, 1, n.text.as_str(), color);
            }
        }
    }

    fn draw_clock(&mut self, hour: u8, minute: u8, colon_visible: bool, color: Rgb888) {
        let digits = [hour / 10, hour % 10, minute / 10, minute % 10];
        for (x, d) in CLOCK_X.iter().zip(digits) {
            self.draw_large_glyph(*x, 0, char::from(b'0' + d), true, color);
        }
        if colon_visible {
            // double-block colon
            for (bx, by) in [(0, 1), (1, 1), (0, 2), (1, 2), (0, 4), (1, 4), (0, 5), (1, 5)] {
                self.buffer.set(COLON_X + bx, by, color);
            }
        }
    }

    fn draw_calendar(&mut self, month: u8, day: u8, color: Rgb888) {
        let name = MONTHS[usize::from(month.clamp(1, 12)) - 1];
        self.draw_small_text(0, 1, name, color);
        if day >= 10 {
            self.draw_large_glyph(19, 0, char::from(b'0' + day / 10), true, color);
            self.draw_large_glyph(26, 0, char::from(b'0' + day % 10), true, color);
        } else {
            self.draw_large_glyph(26, 0, char::from(b'0' + day), true, color);
        }
    }

    fn draw_weather(&mut self, state: &SharedState, night: bool, text_color: Rgb888) {
        let w = &state.weather;
        if !w.valid {
            // nothing fetched yet: dashes, icon cell stays dark
            self.draw_small_text(0, 1, "--", text_color);
            return;
        }

        let color = if night {
            NIGHT_TEXT
        } else {
            temperature_color(w.temperature_f)
        };
        let rounded = libm::roundf(w.temperature_f).clamp(-99.0, 999.0) as i32;
        let mut x = 0;
        if rounded < 0 {
            // narrow minus: the glyph body sits in columns 1..=3 of its cell
            self.draw_large_glyph(x - 1, 0, '-', false, color);
            x += 4;
        }
        let magnitude = rounded.unsigned_abs();
        let mut digits = [0u8; 3];
        let mut count = 0;
        let mut m = magnitude;
        loop {
            digits[2 - count] = (m % 10) as u8;
            count += 1;
            m /= 10;
            if m == 0 {
                break;
            }
        }
        for d in &digits[3 - count..] {
            self.draw_large_glyph(x, 0, char::from(b'0' + d), true, color);
            x += LARGE_BOLD_ADVANCE as i32;
        }
        // compact 2x2 degree block
        self.buffer.set(x, 0, color);
        self.buffer.set(x + 1, 0, color);
        self.buffer.set(x, 1, color);
        self.buffer.set(x + 1, 1, color);

        self.draw_icon(w.condition, w.is_night_icon);
    }

    fn draw_icon(&mut self, condition: Condition, night_icon: bool) {
        let bitmap = icons::icon_bitmap(condition, night_icon);
        if condition == Condition::Clouds {
            self.draw_cloud(bitmap);
            return;
        }
        let color = icons::icon_color(condition, night_icon);
        for (row, bits) in bitmap.iter().enumerate() {
            for col in 0..8 {
                if bits & (1 << (7 - col)) != 0 {
                    self.buffer.set(ICON_X + col, row as i32, color);
                }
            }
        }
    }

    /// The cloud gets a layered gradient: one shade per lit row, with a
    /// highlight on its leftmost pixel and a shadow on its rightmost.
    fn draw_cloud(&mut self, bitmap: &icons::IconBitmap) {
        let mut shade_idx = 0;
        for (row, bits) in bitmap.iter().enumerate() {
            if *bits == 0 {
                continue;
            }
            let shade = icons::CLOUD_SHADES[shade_idx.min(icons::CLOUD_SHADES.len() - 1)];
            shade_idx += 1;
            let first = bits.leading_zeros() as i32;
            let last = 7 - bits.trailing_zeros() as i32;
            for col in 0..8i32 {
                if bits & (1 << (7 - col)) != 0 {
                    let color = if col == first {
                        icons::highlight(shade)
                    } else if col == last {
                        icons::shadow(shade)
                    } else {
                        shade
                    };
                    self.buffer.set(ICON_X + col, row as i32, color);
                }
            }
        }
    }

    fn draw_status_pixel(&mut self, health: TimeHealth) {
        let color = match health {
            TimeHealth::Live => STATUS_LIVE,
            TimeHealth::Stale => STATUS_STALE,
            // unavailable never reaches here: the page shows the placeholder
            TimeHealth::Unavailable => return,
        };
        self.buffer.set(WIDTH as i32 - 1, 7, color);
    }

    fn draw_placeholder(&mut self, color: Rgb888) {
        let x = ((WIDTH - font::small_text_width(NO_TIME_TEXT)) / 2) as i32;
        self.draw_small_text(x, 1, NO_TIME_TEXT, color);
    }

    fn draw_large_glyph(&mut self, x: i32, y: i32, c: char, bold: bool, color: Rgb888) {
        let glyph = font::large_glyph(c);
        let cols = if bold { LARGE_WIDTH + 1 } else { LARGE_WIDTH };
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..cols {
                if font::row_bit(*bits, col, LARGE_WIDTH, bold) {
                    self.buffer.set(x + col as i32, y + row as i32, color);
                }
            }
        }
    }

    fn draw_large_text(&mut self, x: i32, y: i32, text: &str, bold: bool, color: Rgb888) {
        let advance = if bold {
            LARGE_BOLD_ADVANCE
        } else {
            font::LARGE_ADVANCE
        } as i32;
        let mut cx = x;
        for c in text.chars() {
            self.draw_large_glyph(cx, y, c, bold, color);
            cx += advance;
        }
    }

    fn draw_small_text(&mut self, x: i32, y: i32, text: &str, color: Rgb888) {
        let mut cx = x;
        for c in text.chars() {
            // cheap clip: skip glyphs entirely outside the matrix
            if cx > -(SMALL_WIDTH as i32) && cx < WIDTH as i32 {
                let glyph = font::small_glyph(c);
                for (row, bits) in glyph.iter().enumerate() {
                    for col in 0..SMALL_WIDTH {
                        if font::row_bit(*bits, col, SMALL_WIDTH, false) {
                            self.buffer.set(cx + col as i32, y + row as i32, color);
                        }
                    }
                }
            }
            cx += SMALL_ADVANCE as i32;
        }
    }

}
