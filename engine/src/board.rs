use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::CanvasError;

/// The live board: `size²` color indices, row-major, one byte per cell.
///
/// Cells are independent atomics, so concurrent writers to different offsets
/// never contend and a writer to the same offset can never tear a byte; the
/// last committed write wins. Readers observe each cell's latest committed
/// value without any board-wide lock.
///
/// A fresh store is *unpopulated* until the first initialize/replace/write;
/// an unpopulated store reports no bytes, which lets tiered reads fall
/// through to the snapshot store on cold starts.
pub struct BoardStore {
    cells: Box<[AtomicU8]>,
    size: u32,
    palette_size: u16,
    populated: AtomicBool,
}

impl BoardStore {
    pub fn new(size: u32, palette_size: u16) -> BoardStore {
        let cells = (0..(size as usize * size as usize))
            .map(|_| AtomicU8::new(0))
            .collect();
        BoardStore {
            cells,
            size,
            palette_size,
            populated: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Total number of cells (= board bytes).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_populated(&self) -> bool {
        self.populated.load(Ordering::Relaxed)
    }

    /// Linear offset `x + y * size`, bounds-checked.
    pub fn offset(&self, x: u32, y: u32) -> Result<usize, CanvasError> {
        if x >= self.size || y >= self.size {
            return Err(CanvasError::OutOfBounds { x, y });
        }
        Ok(x as usize + y as usize * self.size as usize)
    }

    /// Palette check; the accepted index always fits a cell byte.
    pub fn check_color(&self, color_index: u16) -> Result<u8, CanvasError> {
        if color_index >= self.palette_size {
            return Err(CanvasError::InvalidColor(color_index));
        }
        Ok(color_index as u8)
    }

    pub fn cell(&self, x: u32, y: u32) -> Result<u8, CanvasError> {
        let offset = self.offset(x, y)?;
        Ok(self.cells[offset].load(Ordering::Relaxed))
    }

    /// Raw single-cell write; callers validate first. Used by the placement
    /// commit so the write can run inside the cooldown ledger's critical
    /// section.
    pub(crate) fn store(&self, offset: usize, color: u8) {
        self.cells[offset].store(color, Ordering::Relaxed);
        self.populated.store(true, Ordering::Relaxed);
    }

    pub fn set_cell(&self, x: u32, y: u32, color_index: u16) -> Result<(), CanvasError> {
        let offset = self.offset(x, y)?;
        let color = self.check_color(color_index)?;
        self.store(offset, color);
        Ok(())
    }

    /// Fill a rectangle, clamped to the board; cells of the rectangle that
    /// fall outside are skipped. Returns the coordinates actually written.
    pub fn set_area(
        &self,
        start_x: u32,
        start_y: u32,
        width: u32,
        height: u32,
        color_index: u16,
    ) -> Result<Vec<(u32, u32)>, CanvasError> {
        let color = self.check_color(color_index)?;
        let x_end = start_x.saturating_add(width).min(self.size);
        let y_end = start_y.saturating_add(height).min(self.size);
        let mut affected = Vec::new();
        for y in start_y.min(self.size)..y_end {
            for x in start_x.min(self.size)..x_end {
                self.store(x as usize + y as usize * self.size as usize, color);
                affected.push((x, y));
            }
        }
        Ok(affected)
    }

    pub fn fill(&self, color: u8) {
        for cell in self.cells.iter() {
            cell.store(color, Ordering::Relaxed);
        }
        self.populated.store(true, Ordering::Relaxed);
    }

    pub fn randomize(&self) {
        let mut rng = SmallRng::from_entropy();
        for cell in self.cells.iter() {
            cell.store(rng.gen_range(0..self.palette_size) as u8, Ordering::Relaxed);
        }
        self.populated.store(true, Ordering::Relaxed);
    }

    /// Swap in a whole board image (initialize/reset/rollback).
    pub fn replace(&self, bytes: &[u8]) -> Result<(), CanvasError> {
        if bytes.len() != self.cells.len() {
            return Err(CanvasError::StoreUnavailable(format!(
                "board image is {} bytes, expected {}",
                bytes.len(),
                self.cells.len()
            )));
        }
        for (cell, byte) in self.cells.iter().zip(bytes) {
            cell.store(*byte, Ordering::Relaxed);
        }
        self.populated.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Full board copy, or `None` while unpopulated.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        if !self.is_populated() {
            return None;
        }
        Some(self.raw_bytes())
    }

    pub(crate) fn raw_bytes(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }
}
