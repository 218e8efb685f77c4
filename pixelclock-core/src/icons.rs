//! 8×8 condition icon bitmaps and their color table. Bitmaps are row masks,
//! bit 7 leftmost, same convention as the fonts. The cloud body is special:
//! it is drawn as a five-row layered gradient with an extra highlight on the
//! leftmost lit pixel of each row and a shadow on the rightmost, to suggest
//! volume on an 8-pixel sprite.

use embedded_graphics::pixelcolor::Rgb888;

use crate::weather::Condition;

pub type IconBitmap = [u8; 8];

const SUN: IconBitmap = [
    0b0001_1000,
    0b0101_1010,
    0b0011_1100,
    0b1011_1101,
    0b1011_1101,
    0b0011_1100,
    0b0101_1010,
    0b0001_1000,
];

const MOON: IconBitmap = [
    0b0011_1100,
    0b0111_1000,
    0b1111_0000,
    0b1111_0000,
    0b1111_0000,
    0b1111_0000,
    0b0111_1000,
    0b0011_1100,
];

const CLOUD: IconBitmap = [
    0b0000_0000,
    0b0000_0000,
    0b0011_1000,
    0b0111_1110,
    0b1111_1111,
    0b1111_1111,
    0b0111_1110,
    0b0000_0000,
];

const RAIN: IconBitmap = [
    0b0011_1000,
    0b0111_1110,
    0b1111_1111,
    0b0111_1110,
    0b0000_0000,
    0b0100_1001,
    0b0010_0100,
    0b0100_1001,
];

const DRIZZLE: IconBitmap = [
    0b0011_1000,
    0b0111_1110,
    0b1111_1111,
    0b0000_0000,
    0b0000_0000,
    0b0010_0100,
    0b0000_0000,
    0b0100_1001,
];

const SNOW: IconBitmap = [
    0b0011_1000,
    0b0111_1110,
    0b1111_1111,
    0b0000_0000,
    0b0000_0000,
    0b0100_1010,
    0b0000_0000,
    0b0010_0101,
];

const THUNDERSTORM: IconBitmap = [
    0b0011_1000,
    0b0111_1110,
    0b1111_1111,
    0b0000_1100,
    0b0001_1000,
    0b0011_0000,
    0b0001_1000,
    0b0000_1100,
];

const UNKNOWN: IconBitmap = [
    0b0011_1100,
    0b0110_0110,
    0b0000_0110,
    0b0000_1100,
    0b0001_1000,
    0b0001_1000,
    0b0000_0000,
    0b0001_1000,
];

/// Bitmap for a condition, with day/night variants where the artwork differs.
pub fn icon_bitmap(condition: Condition, night: bool) -> &'static IconBitmap {
    match condition {
        Condition::Clear => {
            if night {
                &MOON
            } else {
                &SUN
            }
        }
        Condition::Clouds => &CLOUD,
        Condition::Rain => &RAIN,
        Condition::Drizzle => &DRIZZLE,
        Condition::Snow => &SNOW,
        Condition::Thunderstorm => &THUNDERSTORM,
        Condition::Unknown => &UNKNOWN,
    }
}

/// Flat icon color per condition (clear has day/night hues).
pub fn icon_color(condition: Condition, night: bool) -> Rgb888 {
    match condition {
        Condition::Clear => {
            if night {
                Rgb888::new(180, 180, 220)
            } else {
                Rgb888::new(255, 200, 0)
            }
        }
        Condition::Clouds => Rgb888::new(140, 140, 150),
        Condition::Rain => Rgb888::new(60, 120, 255),
        Condition::Drizzle => Rgb888::new(110, 170, 255),
        Condition::Snow => Rgb888::new(230, 240, 255),
        Condition::Thunderstorm => Rgb888::new(255, 210, 40),
        Condition::Unknown => Rgb888::new(120, 120, 120),
    }
}

/// Top-to-bottom shades for the five lit rows of the cloud body.
pub const CLOUD_SHADES: [Rgb888; 5] = [
    Rgb888::new(225, 228, 235),
    Rgb888::new(190, 195, 205),
    Rgb888::new(155, 160, 172),
    Rgb888::new(120, 126, 140),
    Rgb888::new(90, 96, 110),
];

/// Brighten a shade for the cloud's lit edge.
pub fn highlight(c: Rgb888) -> Rgb888 {
    use embedded_graphics::prelude::RgbColor;
    Rgb888::new(
        c.r().saturating_add(25),
        c.g().saturating_add(25),
        c.b().saturating_add(25),
    )
}

/// Darken a shade for the cloud's shadow edge.
pub fn shadow(c: Rgb888) -> Rgb888 {
    use embedded_graphics::prelude::RgbColor;
    Rgb888::new(
        c.r().saturating_sub(30),
        c.g().saturating_sub(30),
        c.b().saturating_sub(30),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_has_distinct_day_and_night_artwork() {
        assert_ne!(icon_bitmap(Condition::Clear, false), icon_bitmap(Condition::Clear, true));
        assert_ne!(icon_color(Condition::Clear, false), icon_color(Condition::Clear, true));
        // other conditions share artwork across day and night
        assert_eq!(icon_bitmap(Condition::Rain, false), icon_bitmap(Condition::Rain, true));
    }

    #[test]
    fn cloud_body_has_exactly_five_lit_rows() {
        let lit_rows = CLOUD.iter().filter(|r| **r != 0).count();
        assert_eq!(lit_rows, CLOUD_SHADES.len());
    }

    #[test]
    fn shades_darken_top_to_bottom() {
        use embedded_graphics::prelude::RgbColor;
        for pair in CLOUD_SHADES.windows(2) {
            assert!(pair[0].r() > pair[1].r());
            assert!(pair[0].g() > pair[1].g());
            assert!(pair[0].b() > pair[1].b());
        }
    }

    #[test]
    fn highlight_and_shadow_bracket_the_base_shade() {
        use embedded_graphics::prelude::RgbColor;
        let base = CLOUD_SHADES[2];
        assert!(highlight(base).r() > base.r());
        assert!(shadow(base).r() < base.r());
    }
}
