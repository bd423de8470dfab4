//! Common renderer trait for video chips.
//!
//! A video chip owns its framebuffer and draws into it while the system
//! scheduler advances. Front ends only ever see the finished [`Frame`].
//!
//! ```text
//! System (timing) -> video chip (Renderer) -> Frame -> front end
//! ```

use crate::types::Frame;

/// Common renderer trait for emulated graphics chips.
pub trait Renderer: Send {
    /// Get the current framebuffer (read-only)
    fn get_frame(&self) -> &Frame;

    /// Get mutable access to the framebuffer
    fn get_frame_mut(&mut self) -> &mut Frame;

    /// Clear the framebuffer with a solid ARGB8888 color (0xAARRGGBB)
    fn clear(&mut self, color: u32);

    /// Reset the renderer and any chip state it owns to power-on values
    fn reset(&mut self);

    /// Get the name of this renderer (for debugging/UI)
    fn name(&self) -> &str;

    /// Resize the backing framebuffer
    fn resize(&mut self, width: u32, height: u32);
}
