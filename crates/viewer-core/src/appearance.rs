//! Presentation settings: night mode, button colour and fullscreen.

use image::imageops;
use pdf_engine::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named button colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccentColor {
    #[default]
    Blue,
    Green,
    Red,
    Purple,
    Orange,
}

impl AccentColor {
    pub const ALL: [AccentColor; 5] =
        [Self::Blue, Self::Green, Self::Red, Self::Purple, Self::Orange];

    pub fn name(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Red => "red",
            Self::Purple => "purple",
            Self::Orange => "orange",
        }
    }

    /// sRGB value used for buttons.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Self::Blue => [0x1e, 0x6f, 0xd9],
            Self::Green => [0x2e, 0x9e, 0x44],
            Self::Red => [0xd9, 0x3a, 0x2b],
            Self::Purple => [0x7b, 0x4b, 0xc4],
            Self::Orange => [0xe8, 0x83, 0x1a],
        }
    }

    pub fn hex(self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl fmt::Display for AccentColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown colour '{0}' (expected one of blue, green, red, purple, orange)")]
pub struct UnknownAccent(pub String);

impl FromStr for AccentColor {
    type Err = UnknownAccent;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|accent| accent.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownAccent(value.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Appearance {
    pub night_mode: bool,
    pub accent: AccentColor,
    pub fullscreen: bool,
}

impl Appearance {
    /// Applies the presentation settings to a rendered page.
    pub fn present(&self, image: &RgbaImage) -> RgbaImage {
        let mut presented = image.clone();
        if self.night_mode {
            imageops::invert(&mut presented);
        }
        presented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn night_mode_inverts_colours_but_not_alpha() {
        let page = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 200]));
        let appearance = Appearance { night_mode: true, ..Appearance::default() };

        let presented = appearance.present(&page);
        assert_eq!(presented.get_pixel(0, 0), &Rgba([0, 0, 0, 200]));
        assert_eq!(page.get_pixel(0, 0), &Rgba([255, 255, 255, 200]));
    }

    #[test]
    fn day_mode_leaves_frame_untouched() {
        let page = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255]));
        assert_eq!(Appearance::default().present(&page), page);
    }

    #[test]
    fn accent_parses_case_insensitively() {
        assert_eq!("Purple".parse::<AccentColor>(), Ok(AccentColor::Purple));
        assert_eq!(" orange ".parse::<AccentColor>(), Ok(AccentColor::Orange));
        assert!("teal".parse::<AccentColor>().is_err());
        assert_eq!(AccentColor::Blue.hex(), "#1e6fd9");
    }
}
