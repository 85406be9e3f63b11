//! Shadow framebuffer and diff compression (component C5).

use thiserror::Error;

use crate::latin1;
use crate::packet::MAX_DATA_LEN;

/// Blank cell value; also the value a freshly-cleared display shows.
pub const DEFAULT_CHAR: u8 = b' ';

/// Two differing runs separated by fewer than this many identical cells are
/// coalesced into a single emitted write.
pub const MIN_SPACING_BETWEEN_DIFFS: usize = 5;

/// Largest number of cells one `write_cells` call can carry (`MAX_DATA_LEN`
/// minus the leading col/row bytes).
pub const MAX_WRITE_LEN: usize = MAX_DATA_LEN - 2;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShadowError {
    #[error("line longer than panel width of {width}: got {len}")]
    LineTooWide { width: usize, len: usize },

    #[error("content does not fit at column {col}: width {width}, content length {len}")]
    DoesNotFit { col: usize, width: usize, len: usize },

    #[error("text is not representable in Latin-1: {0:?}")]
    NotLatin1(String),

    #[error("LED index {0} out of range")]
    LedIndexOutOfRange(usize),

    #[error("row {row} out of range (0..{height})")]
    RowOutOfRange { row: usize, height: usize },
}

/// One panel's worth of cell and LED state: either the render target the
/// current page is writing into, or the "sent" mirror the render loop diffs
/// it against.
#[derive(Debug, Clone)]
pub struct Shadow {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    leds: Vec<(u8, u8)>,
}

impl Shadow {
    pub fn new(width: usize, height: usize, led_count: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![DEFAULT_CHAR; width * height],
            leds: vec![(0, 0); led_count],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn leds(&self) -> &[(u8, u8)] {
        &self.leds
    }

    pub fn clear(&mut self) {
        self.cells.fill(DEFAULT_CHAR);
    }

    /// Writes raw bytes starting at `(col, row)`, without encoding or width
    /// padding.
    pub fn write_at(&mut self, col: usize, row: usize, bytes: &[u8]) -> Result<(), ShadowError> {
        if row >= self.height {
            return Err(ShadowError::RowOutOfRange {
                row,
                height: self.height,
            });
        }
        if col + bytes.len() > self.width {
            return Err(ShadowError::DoesNotFit {
                col,
                width: self.width,
                len: bytes.len(),
            });
        }
        let start = row * self.width + col;
        self.cells[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Encodes `content` as Latin-1 and writes it at `(col, row)`.
    pub fn write_text_at(&mut self, col: usize, row: usize, content: &str) -> Result<(), ShadowError> {
        let bytes = latin1::encode(content).ok_or_else(|| ShadowError::NotLatin1(content.to_owned()))?;
        self.write_at(col, row, &bytes)
    }

    /// Sets row `row` to exactly `content`, right-padded with spaces to the
    /// full panel width. Fails if `content` is already wider than the panel.
    pub fn set_line(&mut self, row: usize, content: &str) -> Result<(), ShadowError> {
        let mut bytes = latin1::encode(content).ok_or_else(|| ShadowError::NotLatin1(content.to_owned()))?;
        if bytes.len() > self.width {
            return Err(ShadowError::LineTooWide {
                width: self.width,
                len: bytes.len(),
            });
        }
        bytes.resize(self.width, DEFAULT_CHAR);
        self.write_at(0, row, &bytes)
    }

    pub fn set_led(&mut self, idx: usize, red: u8, green: u8) -> Result<(), ShadowError> {
        let slot = self
            .leds
            .get_mut(idx)
            .ok_or(ShadowError::LedIndexOutOfRange(idx))?;
        *slot = (red, green);
        Ok(())
    }

    /// Copies `source`'s state into `self`. Panics if dimensions differ;
    /// both sides of a diff are always the same panel's shadows.
    pub fn copy_from(&mut self, source: &Shadow) {
        assert_eq!(self.width, source.width);
        assert_eq!(self.height, source.height);
        self.cells.copy_from_slice(&source.cells);
        self.leds.copy_from_slice(&source.leds);
    }

    /// Overwrites this shadow's raw cell and LED state, e.g. to record
    /// what a render tick actually put on the physical display (which may
    /// differ from the page's target while a transition is running).
    pub fn load_raw(&mut self, cells: &[u8], leds: &[(u8, u8)]) {
        assert_eq!(self.cells.len(), cells.len());
        assert_eq!(self.leds.len(), leds.len());
        self.cells.copy_from_slice(cells);
        self.leds.copy_from_slice(leds);
    }
}

/// A half-open `[start, end)` range of differing cells to be sent in one
/// `write_cells` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: usize,
    pub end: usize,
}

impl CellRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Diffs `sent` against `target` and returns the bounded, gap-coalesced
/// write plan described in the render engine's diff compression algorithm.
///
/// `sent` and `target` must have equal length (same panel dimensions).
pub fn diff_cells(sent: &[u8], target: &[u8]) -> Vec<CellRange> {
    assert_eq!(sent.len(), target.len());
    let count = sent.len();
    let mut changes = Vec::new();

    // `run_start` / `run_end` use -1-as-"none" in the original algorithm;
    // Option<usize> expresses that without a sentinel.
    let mut run_start: Option<usize> = None;
    let mut run_end: Option<usize> = None;

    for i in 0..count {
        let differs = sent[i] != target[i];
        if differs {
            match run_start {
                None => run_start = Some(i),
                Some(start) if i - start >= MAX_WRITE_LEN => {
                    changes.push(CellRange { start, end: i });
                    run_start = Some(i);
                    run_end = None;
                }
                Some(_) => {
                    if run_end.is_some() {
                        run_end = None;
                    }
                }
            }
        } else if let Some(start) = run_start {
            let end = run_end.unwrap_or(i);
            run_end = Some(end);
            if i - end >= MIN_SPACING_BETWEEN_DIFFS - 1 {
                changes.push(CellRange { start, end });
                run_start = None;
                run_end = None;
            }
        }
    }

    if let Some(start) = run_start {
        let end = run_end.unwrap_or(count);
        changes.push(CellRange { start, end });
    }

    changes
}

/// Diffs two equal-length LED slices, returning `(index, red, green)` for
/// every LED whose colour changed.
pub fn diff_leds(sent: &[(u8, u8)], target: &[(u8, u8)]) -> Vec<(usize, u8, u8)> {
    assert_eq!(sent.len(), target.len());
    sent.iter()
        .zip(target.iter())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, &(_, _))| (i, target[i].0, target[i].1))
        .collect()
}
