use log::warn;

use crate::cli::SizeMode;
use crate::packing::RectanglePacker;

/// Picks the surface size for a build pass.
#[derive(Debug, Clone, Copy)]
pub struct SizeSolver {
    pub min_size: u32,
    pub max_size: u32,
    pub padding: u32,
    pub mode: SizeMode,
    pub auto_resize: bool,
}

impl SizeSolver {
    /// Solve a power-of-two size able to hold `sizes`.
    ///
    /// The oracle packs everything into a `max × max` bin, the packed
    /// bounding box is rounded up per `mode`, clamped to `[min, max]`, and
    /// finally widened to hold the largest rectangle plus its padding.
    pub fn solve(&self, sizes: &[(u32, u32)], packer: &mut dyn RectanglePacker) -> (u32, u32) {
        if sizes.is_empty() {
            return (self.min_size, self.min_size);
        }
        if !self.auto_resize {
            return (self.max_size, self.max_size);
        }

        packer.reset(self.max_size, self.max_size, self.padding);
        for (id, (w, h)) in sizes.iter().enumerate() {
            packer.insert_rectangle(*w, *h, id);
        }
        let packed = packer.pack_rectangles();
        if packed != sizes.len() {
            warn!(
                "Only {} of {} rectangles fit a {}x{} bin while solving size",
                packed,
                sizes.len(),
                self.max_size,
                self.max_size
            );
        }

        let packed_w = packer.packed_width();
        let packed_h = packer.packed_height();

        let (width, height) = match self.mode {
            SizeMode::Square => {
                let side = next_power_of_two(packed_w.max(packed_h));
                (side, side)
            }
            SizeMode::Rectangle => (next_power_of_two(packed_w), next_power_of_two(packed_h)),
        };

        let width = width.clamp(self.min_size, self.max_size);
        let height = height.clamp(self.min_size, self.max_size);

        let largest_w = sizes.iter().map(|(w, _)| *w).max().unwrap_or(0);
        let largest_h = sizes.iter().map(|(_, h)| *h).max().unwrap_or(0);
        let width = width.max(largest_w + self.padding * 2);
        let height = height.max(largest_h + self.padding * 2);

        let (width, height) = match self.mode {
            SizeMode::Square => {
                let side = width.max(height);
                (side, side)
            }
            SizeMode::Rectangle => (width, height),
        };

        (width.min(self.max_size), height.min(self.max_size))
    }

    /// Next larger candidate after a failed final pack, or `None` at the max.
    pub fn grow(&self, (width, height): (u32, u32)) -> Option<(u32, u32)> {
        if width >= self.max_size && height >= self.max_size {
            return None;
        }

        let step = |v: u32| next_power_of_two(v.saturating_add(1)).min(self.max_size);

        match self.mode {
            SizeMode::Square => {
                let side = step(width.max(height));
                Some((side, side))
            }
            // Grow the shorter edge first to stay close to square
            SizeMode::Rectangle => {
                if (width <= height && width < self.max_size) || height >= self.max_size {
                    Some((step(width), height))
                } else {
                    Some((width, step(height)))
                }
            }
        }
    }
}

pub(crate) fn next_power_of_two(n: u32) -> u32 {
    if n == 0 {
        return 1;
    }
    if n > 1 << 31 {
        return u32::MAX;
    }
    let mut v = n - 1;
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::PackingHeuristic;
    use crate::packing::MaxRectsPacker;

    fn solver(mode: SizeMode) -> SizeSolver {
        SizeSolver {
            min_size: 64,
            max_size: 2048,
            padding: 0,
            mode,
            auto_resize: true,
        }
    }

    fn packer() -> MaxRectsPacker {
        MaxRectsPacker::new(0, 0, PackingHeuristic::BestShortSideFit)
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(3), 4);
        assert_eq!(next_power_of_two(100), 128);
        assert_eq!(next_power_of_two(1000), 1024);
        assert_eq!(next_power_of_two(1 << 31), 1 << 31);
        assert_eq!(next_power_of_two((1 << 31) + 1), u32::MAX);
        assert_eq!(next_power_of_two(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_small_batch_clamps_to_min() {
        let size = solver(SizeMode::Rectangle).solve(&[(32, 32)], &mut packer());
        assert_eq!(size, (64, 64));
    }

    #[test]
    fn test_rectangle_mode_rounds_axes_independently() {
        // Two 200x100 side by side pack into 400x100
        let sizes = [(200, 100), (200, 100)];
        let mut packer = packer();
        let size = solver(SizeMode::Rectangle).solve(&sizes, &mut packer);
        let (pw, ph) = (packer.packed_width(), packer.packed_height());
        assert_eq!(size, (next_power_of_two(pw), next_power_of_two(ph)));
        assert!(size.0 >= 200 && size.1 >= 100);
    }

    #[test]
    fn test_square_mode_uses_larger_axis() {
        let size = solver(SizeMode::Square).solve(&[(300, 20)], &mut packer());
        assert_eq!(size, (512, 512));
    }

    #[test]
    fn test_widened_for_largest_item_with_padding() {
        let solver = SizeSolver {
            padding: 4,
            ..solver(SizeMode::Rectangle)
        };
        // 128 + 2*4 = 136 packed, rounds to 256
        assert_eq!(solver.solve(&[(128, 60)], &mut packer()), (256, 128));

        // Rounding stops at the max even when it is not a power of two
        let capped = SizeSolver {
            max_size: 100,
            min_size: 16,
            padding: 1,
            ..solver
        };
        assert_eq!(capped.solve(&[(90, 10)], &mut packer()), (100, 16));
    }

    #[test]
    fn test_fixed_size_without_auto_resize() {
        let solver = SizeSolver {
            auto_resize: false,
            ..solver(SizeMode::Rectangle)
        };
        assert_eq!(solver.solve(&[(8, 8)], &mut packer()), (2048, 2048));
    }

    #[test]
    fn test_grow_steps_to_max() {
        let rect = solver(SizeMode::Rectangle);
        assert_eq!(rect.grow((64, 128)), Some((128, 128)));
        assert_eq!(rect.grow((128, 128)), Some((256, 128)));
        assert_eq!(rect.grow((2048, 1024)), Some((2048, 2048)));
        assert_eq!(rect.grow((2048, 2048)), None);

        let unbounded = SizeSolver {
            max_size: u32::MAX,
            ..rect
        };
        assert_eq!(
            unbounded.grow((u32::MAX - 1, u32::MAX)),
            Some((u32::MAX, u32::MAX))
        );

        let square = solver(SizeMode::Square);
        assert_eq!(square.grow((256, 256)), Some((512, 512)));
        assert_eq!(square.grow((2048, 2048)), None);
    }
}
