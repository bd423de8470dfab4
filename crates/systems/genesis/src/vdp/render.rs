//! Per-line compositor
//!
//! Layers are drawn back to front into the internal framebuffer:
//!
//! ```text
//! backdrop
//! plane B (low) -> plane A (low) -> sprites (low) -> window (low)
//! plane B (high) -> plane A (high) -> sprites (high) -> window (high)
//! ```
//!
//! Colour index 0 of any palette is transparent. Plane A is not drawn in
//! columns covered by the window.

use super::{VScrollMode, Vdp};

/// Entries walked on the sprite link list before giving up.
pub const MAX_SPRITE_LINKS: usize = 80;

const WINDOW_ROWS: u16 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    A,
    B,
}

/// Columns `[first, last)` covered by the window on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpan {
    pub first: u16,
    pub last: u16,
}

impl WindowSpan {
    pub fn contains(&self, column: u16) -> bool {
        column >= self.first && column < self.last
    }

    pub fn is_empty(&self) -> bool {
        self.first >= self.last
    }
}

/// Convert a CRAM word (`----BBB-GGG-RRR-`) to ARGB8888.
pub fn cram_to_argb(color: u16) -> u32 {
    let r = ((color << 4) & 0xE0) as u32;
    let g = (color & 0xE0) as u32;
    let b = ((color >> 4) & 0xE0) as u32;
    0xFF00_0000 | (r << 16) | (g << 8) | b
}

impl Vdp {
    /// Composite one line into the framebuffer.
    pub fn render_line(&mut self, line: u16) {
        let frame_width = self.frame.width as u16;
        if line as u32 >= self.frame.height {
            return;
        }

        let width = self.regs.screen_width().min(frame_width);
        let backdrop = cram_to_argb(self.cram[self.regs.backdrop_index()]);
        let row = line as usize * frame_width as usize;
        self.frame.pixels[row..row + width as usize].fill(backdrop);

        let span = self.window_span(line);
        for priority in [false, true] {
            self.render_plane(line, Plane::B, priority, &span);
            self.render_plane(line, Plane::A, priority, &span);
            self.render_sprites(line, priority);
            self.render_window(line, priority, &span);
        }
    }

    /// Window coverage for a line. Inside the vertical band the window
    /// spans the whole line.
    pub fn window_span(&self, line: u16) -> WindowSpan {
        let width = self.regs.screen_width();
        let height = self.regs.screen_height();

        let (split_x, right) = self.regs.window_horizontal();
        let split_x = split_x.min(width);
        let (mut first, mut last) = if right { (split_x, width) } else { (0, split_x) };

        let (split_y, down) = self.regs.window_vertical();
        let split_y = split_y.min(height);
        let (top, bottom) = if down { (split_y, height) } else { (0, split_y) };
        if line >= top && line < bottom {
            first = 0;
            last = width;
        }

        WindowSpan { first, last }
    }

    fn render_plane(&mut self, line: u16, plane: Plane, priority: bool, window: &WindowSpan) {
        let width = self.regs.screen_width().min(self.frame.width as u16);
        let (h_cells, v_cells) = self.regs.plane_size();
        let (base, scroll_offset) = match plane {
            Plane::A => (self.regs.plane_a_base(), 0),
            Plane::B => (self.regs.plane_b_base(), 1),
        };

        let hscroll_address = self
            .regs
            .hscroll_base()
            .wrapping_add((line & self.regs.hscroll_mode().line_mask()).wrapping_mul(4))
            .wrapping_add(scroll_offset * 2);
        let hscroll = self.vram_word(hscroll_address);

        let h_mask = h_cells * 8 - 1;
        let v_mask = v_cells * 8 - 1;
        let two_cell = self.regs.vscroll_mode() == VScrollMode::TwoCell;

        for column in 0..width {
            if plane == Plane::A && window.contains(column) {
                continue;
            }

            let column_pair = if two_cell { (column as usize >> 4) * 2 } else { 0 };
            let vscroll_index = column_pair + scroll_offset as usize;
            let vscroll = self.vsram[vscroll_index & 0x3F] & 0x3FF;

            let y = line.wrapping_add(vscroll) & v_mask;
            let x = column.wrapping_sub(hscroll) & h_mask;
            let cell_address = base.wrapping_add(((y >> 3) * h_cells + (x >> 3)) * 2);
            let cell = self.vram_word(cell_address);

            if (cell & 0x8000 != 0) == priority {
                self.draw_cell_pixel(cell, x & 7, y & 7, column, line);
            }
        }
    }

    fn render_window(&mut self, line: u16, priority: bool, window: &WindowSpan) {
        if window.is_empty() {
            return;
        }
        let width_cells: u16 = if self.regs.h40() { 64 } else { 32 };
        let base = self.regs.window_base();
        let last = window.last.min(self.frame.width as u16);
        let y = line & (WINDOW_ROWS * 8 - 1);

        for column in window.first..last {
            let x = column & (width_cells * 8 - 1);
            let cell_address = base.wrapping_add(((y >> 3) * width_cells + (x >> 3)) * 2);
            let cell = self.vram_word(cell_address);

            if (cell & 0x8000 != 0) == priority {
                self.draw_cell_pixel(cell, x & 7, y & 7, column, line);
            }
        }
    }

    /// Walk the sprite link list from entry 0 and draw the sprites of the
    /// requested priority that cover this line.
    fn render_sprites(&mut self, line: u16, priority: bool) {
        let limit = self.regs.max_sprites();
        let base = self.regs.sprite_table_base();
        let line = line as i32;

        let mut queue = [0usize; MAX_SPRITE_LINKS];
        let mut queued = 0;
        let mut index = 0usize;

        for _ in 0..MAX_SPRITE_LINKS {
            let entry = &self.sat_cache[index * 8..index * 8 + 4];
            let top = (u16::from_be_bytes([entry[0], entry[1]]) & 0x3FF) as i32 - 128;
            let height = (((entry[2] & 0x03) + 1) * 8) as i32;
            let link = (entry[3] & 0x7F) as usize;

            if line >= top && line < top + height {
                let cell = self.vram_word(base.wrapping_add(index as u16 * 8 + 4));
                if (cell & 0x8000 != 0) == priority {
                    queue[queued] = index;
                    queued += 1;
                }
            }

            if link == 0 || link >= limit {
                break;
            }
            index = link;
        }

        // Lower list entries are drawn last so they end up in front
        for &sprite in queue[..queued].iter().rev() {
            self.draw_sprite(sprite, line);
        }
    }

    fn draw_sprite(&mut self, index: usize, line: i32) {
        let width = self.regs.screen_width().min(self.frame.width as u16) as i32;
        let entry_address = self.regs.sprite_table_base().wrapping_add(index as u16 * 8);

        let cached = &self.sat_cache[index * 8..index * 8 + 4];
        let top = (u16::from_be_bytes([cached[0], cached[1]]) & 0x3FF) as i32 - 128;
        let size = cached[2];
        let h_cells = ((size >> 2) & 0x03) as u16 + 1;
        let v_cells = (size & 0x03) as u16 + 1;

        let cell = self.vram_word(entry_address.wrapping_add(4));
        let left = (self.vram_word(entry_address.wrapping_add(6)) & 0x1FF) as i32 - 128;

        let vflip = cell & 0x1000 != 0;
        let hflip = cell & 0x0800 != 0;
        let row = (line - top) as u16;
        let cell_row = row >> 3;
        let tile_row = if vflip { v_cells - 1 - cell_row } else { cell_row };

        for cell_col in 0..h_cells {
            let tile_col = if hflip { h_cells - 1 - cell_col } else { cell_col };
            let tile = (cell & 0x7FF).wrapping_add(tile_col * v_cells + tile_row) & 0x7FF;
            let tile_cell = (cell & 0xF800) | tile;

            for px in 0..8u16 {
                let screen_x = left + (cell_col * 8 + px) as i32;
                if screen_x < 0 || screen_x >= width {
                    continue;
                }
                self.draw_cell_pixel(tile_cell, px, row & 7, screen_x as u16, line as u16);
            }
        }
    }

    /// Draw pixel (`x`, `y`) of the pattern named by a nametable or
    /// sprite cell word. Index 0 is transparent.
    fn draw_cell_pixel(&mut self, cell: u16, x: u16, y: u16, column: u16, line: u16) {
        let hflip = cell & 0x0800 != 0;
        let vflip = cell & 0x1000 != 0;
        let row = if vflip { 7 - y } else { y };
        let col = if hflip { 7 - x } else { x };

        let pattern = (cell & 0x07FF) as usize * 0x20;
        let byte = self.vram[pattern + row as usize * 4 + (col >> 1) as usize];
        let index = if col & 1 == 1 { byte & 0x0F } else { byte >> 4 };
        if index == 0 {
            return;
        }

        let palette = ((cell & 0x6000) >> 9) as usize;
        let color = cram_to_argb(self.cram[palette + index as usize]);
        let stride = self.frame.width as usize;
        if let Some(pixel) = self
            .frame
            .pixels
            .get_mut(line as usize * stride + column as usize)
        {
            *pixel = color;
        }
    }
}
