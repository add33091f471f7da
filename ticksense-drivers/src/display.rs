//! Status Display Mirror
//!
//! Small monochrome panel that mirrors selected bus topics. Unlike the
//! sensor drivers this is a pure consumer: it does not run on the
//! acquisition runtime, it just subscribes to value topics and redraws
//! cells when matching messages arrive.
//!
//! ## Layout
//!
//! The panel is a two-line grid. Each line holds either two small cells
//! side by side or one large cell; the arrangement comes from a compact
//! layout string, rows separated by `|`:
//!
//! ```text
//! "SS|L"   ->   [ small ][ small ]
//!               [      large     ]
//! ```
//!
//! which admits exactly `SS`, `L`, `SS|SS`, `SS|L`, `L|SS` and `L|L`.
//!
//! Cells are indexed in reading order and bound to topic patterns (the
//! usual `+`/`#` wildcards apply). When a message matches, the payload
//! is drawn into the cell with the channel's unit appended - the unit
//! is recovered from the topic's channel segment, so `"21.50"` on
//! `outdoor/sensor/temperature` renders as `21.50 °C`.
//!
//! ## Panels
//!
//! Rendering is behind [`DisplayPanel`] so the same mirror logic drives
//! whatever panel controller a board carries. Controllers that only
//! offer raw drawing calls implement [`DrawPrimitives`] instead and get
//! the grid geometry from [`Mosaic`], which caches the last text per
//! cell and redraws the full frame on every update.

use core::fmt::Write;

use heapless::{String, Vec};
use thiserror_no_std::Error;

use ticksense_core::topic::{topic_matches, Channel, TopicString};

/// Lines of the panel grid.
pub const MAX_ROWS: usize = 2;

/// Cells across all rows (two per row at most).
pub const MAX_CELLS: usize = 2 * MAX_ROWS;

/// Rendered cell text, payload plus unit.
pub const CELL_TEXT_CAPACITY: usize = 24;

/// Pixel inset between a cell edge and its text.
const TEXT_INSET: u8 = 2;

/// Drawing surface the mirror renders into.
pub trait DisplayPanel {
    /// Draw `text` into the given half-width cell.
    fn draw_small(&mut self, row: u8, column: u8, text: &str);
    /// Draw `text` into the given full-width cell.
    fn draw_large(&mut self, row: u8, text: &str);
}

/// Arrangement of one panel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RowLayout {
    /// Two half-width cells.
    TwoSmall,
    /// One full-width cell.
    OneLarge,
}

/// Rejected layout strings.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// A row token is neither `SS` nor `L`.
    #[error("unknown row token")]
    UnknownRowToken,
    /// More rows than the panel supports.
    #[error("too many rows")]
    TooManyRows,
}

/// Where a cell index lands on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellPosition {
    Small { row: u8, column: u8 },
    Large { row: u8 },
}

fn parse_layout(spec: &str) -> Result<Vec<RowLayout, MAX_ROWS>, LayoutError> {
    let mut rows = Vec::new();
    for token in spec.split('|') {
        let layout = match token.trim() {
            "SS" => RowLayout::TwoSmall,
            "L" => RowLayout::OneLarge,
            _ => return Err(LayoutError::UnknownRowToken),
        };
        rows.push(layout).map_err(|_| LayoutError::TooManyRows)?;
    }
    Ok(rows)
}

fn cell_position(rows: &[RowLayout], index: usize) -> Option<CellPosition> {
    let mut next = 0usize;
    for (row, layout) in rows.iter().enumerate() {
        match layout {
            RowLayout::TwoSmall => {
                if index < next + 2 {
                    return Some(CellPosition::Small {
                        row: row as u8,
                        column: (index - next) as u8,
                    });
                }
                next += 2;
            }
            RowLayout::OneLarge => {
                if index == next {
                    return Some(CellPosition::Large { row: row as u8 });
                }
                next += 1;
            }
        }
    }
    None
}

/// Payload plus the unit recovered from the topic's channel segment.
fn render_cell(topic: &str, payload: &str) -> String<CELL_TEXT_CAPACITY> {
    let mut text = String::new();
    let _ = text.push_str(payload);
    let unit = topic
        .rsplit('/')
        .next()
        .and_then(Channel::from_name)
        .map(|channel| channel.unit())
        .unwrap_or("");
    if !unit.is_empty() {
        let _ = write!(text, " {unit}");
    }
    text
}

/// Topic mirror over a [`DisplayPanel`].
#[derive(Debug)]
pub struct Display<P> {
    panel: P,
    rows: Vec<RowLayout, MAX_ROWS>,
    bindings: Vec<Option<TopicString>, MAX_CELLS>,
}

impl<P: DisplayPanel> Display<P> {
    /// Mirror with the arrangement described by `layout`.
    pub fn new(panel: P, layout: &str) -> Result<Self, LayoutError> {
        let rows = parse_layout(layout)?;
        let cells: usize = rows
            .iter()
            .map(|layout| match layout {
                RowLayout::TwoSmall => 2,
                RowLayout::OneLarge => 1,
            })
            .sum();
        let mut bindings = Vec::new();
        for _ in 0..cells {
            let _ = bindings.push(None);
        }
        Ok(Self {
            panel,
            rows,
            bindings,
        })
    }

    /// Number of addressable cells in reading order.
    pub fn cell_count(&self) -> usize {
        self.bindings.len()
    }

    /// Bind `cell` to a topic pattern. Returns `false` for a cell the
    /// layout does not have or a pattern that does not fit.
    pub fn bind(&mut self, cell: usize, pattern: &str) -> bool {
        let Some(binding) = self.bindings.get_mut(cell) else {
            return false;
        };
        let mut stored = TopicString::new();
        if stored.push_str(pattern).is_err() {
            return false;
        }
        *binding = Some(stored);
        true
    }

    /// Redraw every cell whose pattern matches `topic`.
    ///
    /// Returns whether anything was drawn.
    pub fn handle_message(&mut self, topic: &str, payload: &str) -> bool {
        let Self {
            panel,
            rows,
            bindings,
        } = self;
        let mut drawn = false;
        for (index, binding) in bindings.iter().enumerate() {
            let Some(pattern) = binding else { continue };
            if !topic_matches(pattern, topic) {
                continue;
            }
            let text = render_cell(topic, payload);
            match cell_position(rows, index) {
                Some(CellPosition::Small { row, column }) => panel.draw_small(row, column, &text),
                Some(CellPosition::Large { row }) => panel.draw_large(row, &text),
                None => continue,
            }
            drawn = true;
        }
        drawn
    }

    /// Hand the panel back (tests use this to inspect recordings).
    pub fn release(self) -> P {
        self.panel
    }
}

/// Text sizes a panel controller can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Glyphs {
    /// Half-width cell font.
    Small,
    /// Full-width cell font.
    Large,
}

/// Primitive drawing capabilities of a panel controller.
///
/// The five operations every supported controller family offers, behind
/// its own native color type. [`Mosaic`] turns these into the cell-level
/// [`DisplayPanel`] surface.
pub trait DrawPrimitives {
    /// Native color type of the controller.
    type Color: Copy;

    /// Blank the frame buffer.
    fn clear(&mut self);
    /// Straight line between two pixel coordinates.
    fn draw_line(&mut self, x0: u8, y0: u8, x1: u8, y1: u8, color: Self::Color);
    /// Text at a pixel origin.
    fn draw_text(&mut self, glyphs: Glyphs, x: u8, y: u8, text: &str, color: Self::Color);
    /// Push the frame buffer to the panel.
    fn present(&mut self);
    /// Encode an RGB triple into the native color.
    fn rgb(&self, r: u8, g: u8, b: u8) -> Self::Color;
}

/// Cached contents of one grid row. A row shows either its large text
/// or its small cells, never both.
#[derive(Default)]
struct RowCells {
    large: Option<String<CELL_TEXT_CAPACITY>>,
    small: [Option<String<CELL_TEXT_CAPACITY>>; 2],
}

fn clipped(text: &str) -> String<CELL_TEXT_CAPACITY> {
    let mut stored = String::new();
    for c in text.chars() {
        if stored.push(c).is_err() {
            break;
        }
    }
    stored
}

/// [`DisplayPanel`] over raw [`DrawPrimitives`].
///
/// Owns the two-row grid geometry and the last text per cell; every cell
/// update clears the frame, redraws the grid lines and all cached texts,
/// and presents.
pub struct Mosaic<P: DrawPrimitives> {
    panel: P,
    width: u8,
    height: u8,
    rows: [RowCells; MAX_ROWS],
}

impl<P: DrawPrimitives> Mosaic<P> {
    /// Canvas over `panel` with the given pixel dimensions.
    pub fn new(panel: P, width: u8, height: u8) -> Self {
        Self {
            panel,
            width,
            height,
            rows: Default::default(),
        }
    }

    /// Hand the panel controller back.
    pub fn release(self) -> P {
        self.panel
    }

    fn redraw(&mut self) {
        let Self {
            panel,
            width,
            height,
            rows,
        } = self;
        let width = *width;
        let row_height = *height / 2;
        let ink = panel.rgb(255, 255, 255);

        panel.clear();
        panel.draw_line(0, row_height, width - 1, row_height, ink);
        for (index, row) in rows.iter().enumerate() {
            let top = index as u8 * row_height;
            if let Some(text) = &row.large {
                panel.draw_text(Glyphs::Large, TEXT_INSET, top + TEXT_INSET, text, ink);
                continue;
            }
            if row.small.iter().all(Option::is_none) {
                continue;
            }
            panel.draw_line(width / 2, top, width / 2, top + row_height - 1, ink);
            for (column, cell) in row.small.iter().enumerate() {
                if let Some(text) = cell {
                    let x = column as u8 * (width / 2) + TEXT_INSET;
                    panel.draw_text(Glyphs::Small, x, top + TEXT_INSET, text, ink);
                }
            }
        }
        panel.present();
    }
}

impl<P: DrawPrimitives> DisplayPanel for Mosaic<P> {
    fn draw_small(&mut self, row: u8, column: u8, text: &str) {
        let Some(cells) = self.rows.get_mut(usize::from(row)) else {
            return;
        };
        let Some(slot) = cells.small.get_mut(usize::from(column)) else {
            return;
        };
        *slot = Some(clipped(text));
        cells.large = None;
        self.redraw();
    }

    fn draw_large(&mut self, row: u8, text: &str) {
        let Some(cells) = self.rows.get_mut(usize::from(row)) else {
            return;
        };
        cells.large = Some(clipped(text));
        cells.small = [None, None];
        self.redraw();
    }
}
