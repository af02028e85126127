mod maxrects;
mod oracle;
mod rect;

pub use maxrects::MaxRectsPacker;
pub use oracle::{PackerFactory, RectanglePacker};
pub use rect::Rect;
