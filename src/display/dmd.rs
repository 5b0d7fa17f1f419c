//! Dot-matrix intensity to shade glyph mapping
//!
//! The core reports each pixel as a discrete intensity code in 0..=100
//! (0x00..=0x64). Which codes appear depends on the display depth and, for
//! deeper displays, on the hardware generation. Codes are mapped through
//! literal tables; anything not listed renders blank.

use super::DisplayLayout;

/// Hardware generation families with distinct intensity quantization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareGeneration {
    /// SAM and SPA era hardware
    SamSpa,
    /// Every other generation
    #[default]
    Other,
}

/// Visual band of a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shade {
    Low,
    Medium,
    High,
    Full,
}

impl Shade {
    /// Glyph drawn for the band
    pub fn glyph(&self) -> char {
        match self {
            Shade::Low => '░',
            Shade::Medium => '▒',
            // Top two bands share a glyph
            Shade::High | Shade::Full => '▓',
        }
    }
}

/// Glyph for codes outside every table
pub const BLANK: char = ' ';

/// 2-bit displays: four fixed codes
pub const DEPTH2_SHADES: [(u8, Shade); 4] = [
    (0x14, Shade::Low),
    (0x21, Shade::Medium),
    (0x43, Shade::High),
    (0x64, Shade::Full),
];

/// Deeper displays on SAM/SPA hardware
pub const SAM_SPA_SHADES: [(u8, Shade); 16] = [
    (0x00, Shade::Low),
    (0x14, Shade::Low),
    (0x19, Shade::Low),
    (0x1E, Shade::Low),
    (0x23, Shade::Medium),
    (0x28, Shade::Medium),
    (0x2D, Shade::Medium),
    (0x32, Shade::Medium),
    (0x37, Shade::High),
    (0x3C, Shade::High),
    (0x41, Shade::High),
    (0x46, Shade::High),
    (0x4B, Shade::Full),
    (0x50, Shade::Full),
    (0x5A, Shade::Full),
    (0x64, Shade::Full),
];

/// Deeper displays on all other hardware
pub const STANDARD_SHADES: [(u8, Shade); 16] = [
    (0x00, Shade::Low),
    (0x1E, Shade::Low),
    (0x23, Shade::Low),
    (0x28, Shade::Low),
    (0x2D, Shade::Medium),
    (0x32, Shade::Medium),
    (0x37, Shade::Medium),
    (0x3C, Shade::Medium),
    (0x41, Shade::High),
    (0x46, Shade::High),
    (0x4B, Shade::High),
    (0x50, Shade::High),
    (0x55, Shade::Full),
    (0x5A, Shade::Full),
    (0x5F, Shade::Full),
    (0x64, Shade::Full),
];

/// Table in effect for a depth/generation pair
pub fn shade_table(depth: u8, generation: HardwareGeneration) -> &'static [(u8, Shade)] {
    if depth == 2 {
        &DEPTH2_SHADES
    } else {
        match generation {
            HardwareGeneration::SamSpa => &SAM_SPA_SHADES,
            HardwareGeneration::Other => &STANDARD_SHADES,
        }
    }
}

/// Band for one intensity code, if the code is listed
pub fn shade_for(value: u8, depth: u8, generation: HardwareGeneration) -> Option<Shade> {
    shade_table(depth, generation)
        .iter()
        .find(|(code, _)| *code == value)
        .map(|(_, shade)| *shade)
}

/// Render a dot-matrix frame, one string per row
///
/// Pixels missing from a short frame render blank.
pub fn render_dmd(data: &[u8], layout: &DisplayLayout, generation: HardwareGeneration) -> Vec<String> {
    let table = shade_table(layout.depth, generation);

    (0..layout.height)
        .map(|y| {
            (0..layout.width)
                .map(|x| {
                    data.get(y * layout.width + x)
                        .and_then(|value| table.iter().find(|(code, _)| code == value))
                        .map(|(_, shade)| shade.glyph())
                        .unwrap_or(BLANK)
                })
                .collect()
        })
        .collect()
}
