use super::{Rect, RectanglePacker};
use crate::cli::PackingHeuristic;

/// A rectangle waiting to be packed
#[derive(Debug, Clone, Copy)]
struct QueuedRect {
    width: u32,
    height: u32,
    id: usize,
}

/// MaxRects bin packer implementation
#[derive(Debug)]
pub struct MaxRectsPacker {
    bin_width: u32,
    bin_height: u32,
    padding: u32,
    heuristic: PackingHeuristic,
    free_rects: Vec<Rect>,
    used_rects: Vec<Rect>,
    queued: Vec<QueuedRect>,
    placed: Vec<(Rect, usize)>,
    packed_width: u32,
    packed_height: u32,
}

impl MaxRectsPacker {
    pub fn new(width: u32, height: u32, heuristic: PackingHeuristic) -> Self {
        Self {
            bin_width: width,
            bin_height: height,
            padding: 0,
            heuristic,
            free_rects: vec![Rect::new(0, 0, width, height)],
            used_rects: Vec::new(),
            queued: Vec::new(),
            placed: Vec::new(),
            packed_width: 0,
            packed_height: 0,
        }
    }

    /// Try to insert a rectangle with the given dimensions
    /// Returns the placed rectangle if successful
    pub fn insert(&mut self, width: u32, height: u32) -> Option<Rect> {
        if width == 0 || height == 0 {
            return None;
        }
        let best_rect = self.find_position(width, height)?;
        self.place_rect(best_rect);
        Some(best_rect)
    }

    fn find_position(&self, width: u32, height: u32) -> Option<Rect> {
        let mut best_score = (i64::MAX, i64::MAX);
        let mut best_rect = None;

        for free_rect in &self.free_rects {
            if width <= free_rect.width && height <= free_rect.height {
                let score = self.score_rect(free_rect, width, height);
                if score < best_score {
                    best_score = score;
                    best_rect = Some(Rect::new(free_rect.x, free_rect.y, width, height));
                }
            }
        }

        best_rect
    }

    fn score_rect(&self, free_rect: &Rect, width: u32, height: u32) -> (i64, i64) {
        let leftover_h = i64::from(free_rect.width - width);
        let leftover_v = i64::from(free_rect.height - height);
        let short = leftover_h.min(leftover_v);
        let long = leftover_h.max(leftover_v);

        match self.heuristic {
            PackingHeuristic::BestShortSideFit => (short, long),
            PackingHeuristic::BestLongSideFit => (long, short),
            PackingHeuristic::BestAreaFit => (i64::try_from(free_rect.area()).unwrap_or(i64::MAX), short),
            PackingHeuristic::BottomLeft => {
                let top = i64::from(free_rect.y + height);
                let left = i64::from(free_rect.x);
                (top, left)
            }
            PackingHeuristic::ContactPoint => {
                // Higher contact is better, so negate for the min-score search
                let contact = self.contact_score(free_rect.x, free_rect.y, width, height);
                (-i64::from(contact), i64::from(free_rect.y))
            }
        }
    }

    /// Length of the perimeter shared with the bin edges and placed rectangles
    fn contact_score(&self, x: u32, y: u32, width: u32, height: u32) -> u32 {
        let mut score = 0;

        if x == 0 || x + width == self.bin_width {
            score += height;
        }
        if y == 0 || y + height == self.bin_height {
            score += width;
        }

        for used in &self.used_rects {
            if used.x == x + width || used.right() == x {
                score += common_interval(used.y, used.bottom(), y, y + height);
            }
            if used.y == y + height || used.bottom() == y {
                score += common_interval(used.x, used.right(), x, x + width);
            }
        }

        score
    }

    fn place_rect(&mut self, rect: Rect) {
        let mut new_rects = Vec::new();

        self.free_rects.retain(|free_rect| {
            if !rect.intersects(free_rect) {
                return true;
            }

            // Split the free rectangle around the placed rectangle
            // Left portion
            if rect.x > free_rect.x {
                new_rects.push(Rect::new(
                    free_rect.x,
                    free_rect.y,
                    rect.x - free_rect.x,
                    free_rect.height,
                ));
            }

            // Right portion
            if rect.right() < free_rect.right() {
                new_rects.push(Rect::new(
                    rect.right(),
                    free_rect.y,
                    free_rect.right() - rect.right(),
                    free_rect.height,
                ));
            }

            // Top portion
            if rect.y > free_rect.y {
                new_rects.push(Rect::new(
                    free_rect.x,
                    free_rect.y,
                    free_rect.width,
                    rect.y - free_rect.y,
                ));
            }

            // Bottom portion
            if rect.bottom() < free_rect.bottom() {
                new_rects.push(Rect::new(
                    free_rect.x,
                    rect.bottom(),
                    free_rect.width,
                    free_rect.bottom() - rect.bottom(),
                ));
            }

            false
        });

        self.free_rects.extend(new_rects);
        self.prune_free_rects();
        self.used_rects.push(rect);
    }

    fn prune_free_rects(&mut self) {
        // Remove rectangles that are fully contained within others
        let mut i = 0;
        while i < self.free_rects.len() {
            let mut j = i + 1;
            while j < self.free_rects.len() {
                if self.free_rects[i].contains(&self.free_rects[j]) {
                    self.free_rects.swap_remove(j);
                } else if self.free_rects[j].contains(&self.free_rects[i]) {
                    self.free_rects.swap_remove(i);
                    j = i + 1;
                    continue;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
    }

    /// Get packing efficiency as a ratio (0.0 to 1.0)
    pub fn occupancy(&self) -> f64 {
        let total_area = u64::from(self.bin_width) * u64::from(self.bin_height);
        if total_area == 0 {
            return 0.0;
        }
        let used_area: u64 = self.used_rects.iter().map(Rect::area).sum();
        used_area as f64 / total_area as f64
    }
}

impl RectanglePacker for MaxRectsPacker {
    fn reset(&mut self, width: u32, height: u32, padding: u32) {
        self.bin_width = width;
        self.bin_height = height;
        self.padding = padding;
        self.free_rects = vec![Rect::new(0, 0, width, height)];
        self.used_rects.clear();
        self.queued.clear();
        self.placed.clear();
        self.packed_width = 0;
        self.packed_height = 0;
    }

    fn insert_rectangle(&mut self, width: u32, height: u32, id: usize) {
        self.queued.push(QueuedRect { width, height, id });
    }

    fn pack_rectangles(&mut self) -> usize {
        self.free_rects = vec![Rect::new(0, 0, self.bin_width, self.bin_height)];
        self.used_rects.clear();
        self.placed.clear();
        self.packed_width = 0;
        self.packed_height = 0;

        // Largest first; the sort is stable so equal areas keep input order
        let mut order = self.queued.clone();
        order.sort_by(|a, b| {
            let area_a = u64::from(a.width) * u64::from(a.height);
            let area_b = u64::from(b.width) * u64::from(b.height);
            area_b.cmp(&area_a)
        });

        let padding = self.padding;
        for queued in order {
            let padded_w = queued.width + padding * 2;
            let padded_h = queued.height + padding * 2;

            if let Some(rect) = self.insert(padded_w, padded_h) {
                self.packed_width = self.packed_width.max(rect.right());
                self.packed_height = self.packed_height.max(rect.bottom());
                self.placed.push((
                    Rect::new(
                        rect.x + padding,
                        rect.y + padding,
                        queued.width,
                        queued.height,
                    ),
                    queued.id,
                ));
            }
        }

        self.placed.len()
    }

    fn rectangle(&self, index: usize) -> Option<Rect> {
        self.placed.get(index).map(|(rect, _)| *rect)
    }

    fn rectangle_id(&self, index: usize) -> Option<usize> {
        self.placed.get(index).map(|(_, id)| *id)
    }

    fn packed_width(&self) -> u32 {
        self.packed_width
    }

    fn packed_height(&self) -> u32 {
        self.packed_height
    }
}

fn common_interval(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> u32 {
    if a_end < b_start || b_end < a_start {
        return 0;
    }
    a_end.min(b_end) - a_start.max(b_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_HEURISTICS: [PackingHeuristic; 5] = [
        PackingHeuristic::BestShortSideFit,
        PackingHeuristic::BestLongSideFit,
        PackingHeuristic::BestAreaFit,
        PackingHeuristic::BottomLeft,
        PackingHeuristic::ContactPoint,
    ];

    fn placed(packer: &MaxRectsPacker) -> Vec<Rect> {
        (0..packer.placed.len())
            .filter_map(|i| packer.rectangle(i))
            .collect()
    }

    #[test]
    fn test_single_insert() {
        let mut packer = MaxRectsPacker::new(100, 100, PackingHeuristic::BestShortSideFit);
        let rect = packer.insert(50, 50).unwrap();

        assert_eq!(rect, Rect::new(0, 0, 50, 50));
    }

    #[test]
    fn test_four_quadrants_fill_bin() {
        for heuristic in ALL_HEURISTICS {
            let mut packer = MaxRectsPacker::new(100, 100, heuristic);
            for id in 0..4 {
                packer.insert_rectangle(50, 50, id);
            }

            assert_eq!(packer.pack_rectangles(), 4, "{:?}", heuristic);
            let rects = placed(&packer);
            for (i, a) in rects.iter().enumerate() {
                for b in &rects[i + 1..] {
                    assert!(!a.intersects(b), "{:?} overlaps with {:?}", a, b);
                }
            }
            assert!((packer.occupancy() - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_too_large() {
        let mut packer = MaxRectsPacker::new(100, 100, PackingHeuristic::BestShortSideFit);
        assert!(packer.insert(150, 50).is_none());
        assert!(packer.insert(0, 10).is_none());
    }

    #[test]
    fn test_padding_offsets_content_rect() {
        let mut packer = MaxRectsPacker::new(64, 64, PackingHeuristic::BestShortSideFit);
        packer.reset(64, 64, 2);
        packer.insert_rectangle(10, 10, 7);

        assert_eq!(packer.pack_rectangles(), 1);
        assert_eq!(packer.rectangle(0), Some(Rect::new(2, 2, 10, 10)));
        assert_eq!(packer.rectangle_id(0), Some(7));
        assert_eq!(packer.packed_width(), 14);
        assert_eq!(packer.packed_height(), 14);
        assert_eq!(packer.rectangle(1), None);
    }

    #[test]
    fn test_partial_pack_reports_count() {
        let mut packer = MaxRectsPacker::new(100, 100, PackingHeuristic::BottomLeft);
        packer.insert_rectangle(80, 80, 0);
        packer.insert_rectangle(80, 80, 1);
        packer.insert_rectangle(10, 10, 2);

        assert_eq!(packer.pack_rectangles(), 2);
        let ids: Vec<_> = (0..2).filter_map(|i| packer.rectangle_id(i)).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_packing_is_deterministic() {
        let sizes = [(30, 20), (25, 15), (40, 10), (15, 35), (20, 20), (25, 15)];
        let run = || {
            let mut packer = MaxRectsPacker::new(128, 128, PackingHeuristic::BestShortSideFit);
            packer.reset(128, 128, 1);
            for (id, (w, h)) in sizes.iter().enumerate() {
                packer.insert_rectangle(*w, *h, id);
            }
            packer.pack_rectangles();
            (0..sizes.len())
                .map(|i| (packer.rectangle(i), packer.rectangle_id(i)))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_reset_clears_previous_pack() {
        let mut packer = MaxRectsPacker::new(32, 32, PackingHeuristic::BestAreaFit);
        packer.insert_rectangle(32, 32, 0);
        assert_eq!(packer.pack_rectangles(), 1);

        packer.reset(16, 16, 0);
        assert_eq!(packer.pack_rectangles(), 0);
        assert_eq!(packer.packed_width(), 0);
        assert_eq!(packer.rectangle(0), None);
    }
}
