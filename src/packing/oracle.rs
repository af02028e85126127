use super::Rect;

/// Rectangle bin-packing oracle consumed by the atlas builder.
///
/// The oracle is loaded with rectangles, asked to pack them into the bin
/// given to [`reset`](RectanglePacker::reset), and then queried by
/// placement index. Placing fewer rectangles than were submitted means the
/// bin is too small; it is not an error of the oracle itself.
///
/// Packing must be deterministic for a fixed input order. Padding surrounds
/// every rectangle, and the rectangles reported back are the inner content
/// area without the padding.
pub trait RectanglePacker: Send {
    /// Clear all submitted and placed rectangles and set a new bin.
    fn reset(&mut self, width: u32, height: u32, padding: u32);

    /// Queue a rectangle for the next [`pack_rectangles`](RectanglePacker::pack_rectangles) call.
    fn insert_rectangle(&mut self, width: u32, height: u32, id: usize);

    /// Place the queued rectangles, returning how many were placed.
    fn pack_rectangles(&mut self) -> usize;

    /// Placed content rectangle at `index` (0..placed count).
    fn rectangle(&self, index: usize) -> Option<Rect>;

    /// Caller id of the rectangle placed at `index`.
    fn rectangle_id(&self, index: usize) -> Option<usize>;

    /// Width of the bounding box of everything placed, padding included.
    fn packed_width(&self) -> u32;

    /// Height of the bounding box of everything placed, padding included.
    fn packed_height(&self) -> u32;
}

/// Factory used by the manager to get a fresh oracle per build pass.
pub type PackerFactory = std::sync::Arc<dyn Fn() -> Box<dyn RectanglePacker> + Send + Sync>;
