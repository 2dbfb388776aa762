/// Consumer of per-frame video memory snapshots.
///
/// The clock calls `frame` once per simulated frame with the current tile
/// and background bytes; returning `false` stops the run loop after the
/// current tick completes.
pub trait VideoSink {
    fn frame(&mut self, vram: &[u8]) -> bool;
}

/// Sink that discards frames and never stops the machine.
pub struct NullSink;

impl VideoSink for NullSink {
    fn frame(&mut self, _vram: &[u8]) -> bool {
        true
    }
}
