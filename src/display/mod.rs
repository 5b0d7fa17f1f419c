//! Display layouts and glyph decoding for text-mode inspection

pub mod alphanumeric;
pub mod dmd;

pub use alphanumeric::{render_alphanumeric, SegmentTemplate};
pub use dmd::{render_dmd, shade_for, HardwareGeneration, Shade};

/// Kind of display surface, selecting the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// Dot matrix: one intensity byte per pixel
    Dmd,
    /// Alphanumeric: one 16-bit segment mask per character cell
    Alphanumeric(SegmentTemplate),
}

/// Geometry and type of one display surface, as announced by the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLayout {
    pub kind: DisplayKind,
    pub top: u32,
    pub left: u32,
    pub width: usize,
    pub height: usize,
    /// Intensity bit depth (dot matrix only)
    pub depth: u8,
    /// Character cell count (alphanumeric only)
    pub length: usize,
}

impl DisplayLayout {
    /// Dot matrix layout
    pub fn dmd(width: usize, height: usize, depth: u8) -> Self {
        Self {
            kind: DisplayKind::Dmd,
            top: 0,
            left: 0,
            width,
            height,
            depth,
            length: width * height,
        }
    }

    /// Alphanumeric layout of `length` cells
    pub fn alphanumeric(length: usize, template: SegmentTemplate) -> Self {
        Self {
            kind: DisplayKind::Alphanumeric(template),
            top: 0,
            left: 0,
            width: length,
            height: 1,
            depth: 16,
            length,
        }
    }

    /// Place the display at a position
    pub fn at(mut self, top: u32, left: u32) -> Self {
        self.top = top;
        self.left = left;
        self
    }
}

impl std::fmt::Display for DisplayLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DisplayKind::Dmd => write!(
                f,
                "dmd {}x{} depth {} at ({}, {})",
                self.width, self.height, self.depth, self.top, self.left
            ),
            DisplayKind::Alphanumeric(template) => write!(
                f,
                "alphanumeric {} cells ({}) at ({}, {})",
                self.length, template, self.top, self.left
            ),
        }
    }
}

/// Raw display contents delivered with an update
#[derive(Debug, Clone, Copy)]
pub enum DisplayFrame<'a> {
    Dmd(&'a [u8]),
    Alphanumeric(&'a [u16]),
}

/// Render any frame with the decoder its layout selects
///
/// Returns one string per output row. A frame whose type does not match the
/// layout renders as nothing.
pub fn render(frame: DisplayFrame<'_>, layout: &DisplayLayout, generation: HardwareGeneration) -> Vec<String> {
    match (frame, layout.kind) {
        (DisplayFrame::Dmd(data), DisplayKind::Dmd) => render_dmd(data, layout, generation),
        (DisplayFrame::Alphanumeric(data), DisplayKind::Alphanumeric(_)) => {
            Vec::from(render_alphanumeric(data, layout))
        }
        _ => Vec::new(),
    }
}
