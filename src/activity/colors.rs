use serde::{Deserialize, Serialize};

/// Background, text and border colors for one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub background: String,
    pub text: String,
    pub border: String,
}

/// Display colors for an activity. Not used by any lifecycle logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSet {
    pub light: ThemeColors,
    pub dark: ThemeColors,
}

/// (hue, saturation%) for each palette slot, in assignment order:
/// green, blue, orange, purple, red, teal, pink, amber.
const PALETTE: [(u16, u8); 8] = [
    (120, 60),
    (210, 100),
    (30, 100),
    (270, 60),
    (0, 100),
    (180, 60),
    (330, 100),
    (45, 100),
];

pub const PALETTE_SIZE: usize = PALETTE.len();

fn hsl(hue: u16, saturation: u8, lightness: u8) -> String {
    format!("hsl({hue}, {saturation}%, {lightness}%)")
}

/// Palette entry for the activity at `index`; wraps every eight activities.
pub fn color_for_index(index: usize) -> ColorSet {
    let (hue, sat) = PALETTE[index % PALETTE_SIZE];
    // Low-saturation hues need darker text to keep contrast on light backgrounds.
    let (light_text, light_border) = if sat < 100 { (25, 35) } else { (30, 45) };
    ColorSet {
        light: ThemeColors {
            background: hsl(hue, sat, 95),
            text: hsl(hue, sat, light_text),
            border: hsl(hue, sat, light_border),
        },
        dark: ThemeColors {
            background: hsl(hue, sat, 20),
            text: hsl(hue, sat, 85),
            border: hsl(hue, sat, light_border + 5),
        },
    }
}
