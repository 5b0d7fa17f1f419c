//! 16-segment alphanumeric decoding
//!
//! Each cell is a 16-bit mask; bit `k` drives segment letter `'A' + k`.
//! A cell renders through an 8x9 character template in which every position
//! carrying a letter belongs to that segment.

use super::{DisplayKind, DisplayLayout};

/// Output rows per cell
pub const ROWS: usize = 8;

/// Output columns per cell, excluding the separator
pub const COLUMNS: usize = 9;

/// Marker for a lit segment position
pub const LIT: char = '*';

/// Template family, chosen by the display sub-type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentTemplate {
    /// Comma/period layout: H and P form the comma and period
    #[default]
    Comma,
    /// Split layout: top and bottom bars are two segments each
    Split,
}

impl SegmentTemplate {
    /// The literal template rows
    pub fn rows(&self) -> &'static [&'static str; ROWS] {
        match self {
            SegmentTemplate::Comma => &COMMA_TEMPLATE,
            SegmentTemplate::Split => &SPLIT_TEMPLATE,
        }
    }
}

impl std::fmt::Display for SegmentTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentTemplate::Comma => write!(f, "comma"),
            SegmentTemplate::Split => write!(f, "split"),
        }
    }
}

static COMMA_TEMPLATE: [&str; ROWS] = [
    " AAAAA   ",
    "FI J KB  ",
    "F IJK B  ",
    " GG LL   ",
    "E ONM C  ",
    "EO N MC P",
    " DDDDD  H",
    "       H ",
];

static SPLIT_TEMPLATE: [&str; ROWS] = [
    " AA BB   ",
    "HI J KC  ",
    "H IJK C  ",
    " PP LL   ",
    "G ONM D  ",
    "GO N MD  ",
    " FF EE   ",
    "         ",
];

/// Render one template row of one cell
fn render_cell_row(template_row: &str, value: u16) -> impl Iterator<Item = char> + '_ {
    template_row.chars().map(move |c| match c {
        'A'..='P' => {
            let bit = c as u32 - 'A' as u32;
            if value & (1 << bit) != 0 {
                LIT
            } else {
                ' '
            }
        }
        other => other,
    })
}

/// Render a row of cells as eight text rows
///
/// Every cell contributes its nine template columns followed by a single
/// space. Cells beyond `layout.length` are ignored; missing cells render as
/// all-off.
pub fn render_alphanumeric(data: &[u16], layout: &DisplayLayout) -> [String; ROWS] {
    let template = match layout.kind {
        DisplayKind::Alphanumeric(template) => template,
        DisplayKind::Dmd => SegmentTemplate::default(),
    };
    render_cells(data.iter().copied().chain(std::iter::repeat(0)).take(layout.length), template)
}

/// Render an arbitrary sequence of cells with one template
pub fn render_cells(cells: impl IntoIterator<Item = u16>, template: SegmentTemplate) -> [String; ROWS] {
    let mut output: [String; ROWS] = Default::default();
    let rows = template.rows();

    for value in cells {
        for (line, template_row) in output.iter_mut().zip(rows.iter()) {
            line.extend(render_cell_row(template_row, value));
            line.push(' ');
        }
    }

    output
}
