use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use super::compositor::{Placement, composite};
use super::{AtlasGeneration, SizeSolver};
use crate::cli::{PackingHeuristic, SizeMode};
use crate::config::AtlasConfig;
use crate::error::AtlasError;
use crate::packing::{MaxRectsPacker, PackerFactory, RectanglePacker};
use crate::sprite::PendingItem;

/// Factory for the built-in MaxRects oracle
pub fn default_packer(heuristic: PackingHeuristic) -> PackerFactory {
    Arc::new(move || Box::new(MaxRectsPacker::new(0, 0, heuristic)) as Box<dyn RectanglePacker>)
}

/// Configuration for atlas building
#[derive(Clone)]
pub struct AtlasBuilder {
    pub solver: SizeSolver,
    packer: PackerFactory,
}

impl fmt::Debug for AtlasBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtlasBuilder")
            .field("solver", &self.solver)
            .finish_non_exhaustive()
    }
}

impl AtlasBuilder {
    pub fn new(max_size: u32) -> Self {
        Self {
            solver: SizeSolver {
                min_size: 64.min(max_size),
                max_size,
                padding: 0,
                mode: SizeMode::Rectangle,
                auto_resize: true,
            },
            packer: default_packer(PackingHeuristic::default()),
        }
    }

    pub fn from_config(config: &AtlasConfig) -> Self {
        Self::new(config.max_atlas_size)
            .min_size(config.min_atlas_size)
            .padding(config.padding)
            .size_mode(config.size_mode)
            .auto_resize(config.auto_resize_atlas)
            .heuristic(config.heuristic)
    }

    pub fn min_size(mut self, min_size: u32) -> Self {
        self.solver.min_size = min_size;
        self
    }

    pub fn padding(mut self, padding: u32) -> Self {
        self.solver.padding = padding;
        self
    }

    pub fn size_mode(mut self, mode: SizeMode) -> Self {
        self.solver.mode = mode;
        self
    }

    pub fn auto_resize(mut self, auto_resize: bool) -> Self {
        self.solver.auto_resize = auto_resize;
        self
    }

    pub fn heuristic(mut self, heuristic: PackingHeuristic) -> Self {
        self.packer = default_packer(heuristic);
        self
    }

    /// Replace the packing oracle
    pub fn packer(mut self, packer: PackerFactory) -> Self {
        self.packer = packer;
        self
    }

    /// Run one build pass over `items`, producing a complete generation.
    ///
    /// Either every item is placed or the pass fails; nothing partial is
    /// ever returned.
    pub fn build(
        &self,
        atlas: &str,
        items: Vec<PendingItem>,
    ) -> Result<AtlasGeneration, AtlasError> {
        let started = Instant::now();
        let max = self.solver.max_size;
        let padding = self.solver.padding;

        for item in &items {
            let padded_w = u64::from(item.width()) + u64::from(padding) * 2;
            let padded_h = u64::from(item.height()) + u64::from(padding) * 2;

            if padded_w > u64::from(max) || padded_h > u64::from(max) {
                return Err(AtlasError::ItemTooLarge {
                    atlas: atlas.to_string(),
                    name: item.name.clone(),
                    width: item.width(),
                    height: item.height(),
                    max,
                });
            }
        }

        if items.is_empty() {
            let size = self.solver.min_size;
            return Ok(AtlasGeneration::new(size, size));
        }

        let sizes: Vec<(u32, u32)> = items.iter().map(|i| (i.width(), i.height())).collect();
        let mut packer = (self.packer)();
        let mut size = self.solver.solve(&sizes, packer.as_mut());

        let placements = loop {
            match self.place(packer.as_mut(), size, &sizes) {
                Ok(placements) => break placements,
                Err(packed) => {
                    let next = if self.solver.auto_resize {
                        self.solver.grow(size)
                    } else {
                        None
                    };
                    match next {
                        Some(next) => {
                            debug!(
                                "Atlas '{}': {}/{} fit {}x{}, retrying at {}x{}",
                                atlas,
                                packed,
                                sizes.len(),
                                size.0,
                                size.1,
                                next.0,
                                next.1
                            );
                            size = next;
                        }
                        None => {
                            return Err(AtlasError::PackingCapacityExceeded {
                                atlas: atlas.to_string(),
                                requested: sizes.len(),
                                packed,
                                max,
                            });
                        }
                    }
                }
            }
        };

        let generation = composite(size.0, size.1, items, &placements);

        info!(
            "Atlas '{}': {}x{} with {} items ({:.1}% occupancy) in {}ms",
            atlas,
            generation.width,
            generation.height,
            generation.len(),
            generation.occupancy() * 100.0,
            started.elapsed().as_millis()
        );

        Ok(generation)
    }

    /// Final pack at a fixed size. `Err` carries how many items fit.
    fn place(
        &self,
        packer: &mut dyn RectanglePacker,
        (width, height): (u32, u32),
        sizes: &[(u32, u32)],
    ) -> Result<Vec<Placement>, usize> {
        packer.reset(width, height, self.solver.padding);
        for (id, (w, h)) in sizes.iter().enumerate() {
            packer.insert_rectangle(*w, *h, id);
        }
        let count = packer.pack_rectangles();

        let mut placed = vec![false; sizes.len()];
        let mut placements = Vec::with_capacity(count);
        for index in 0..count {
            let (Some(rect), Some(id)) = (packer.rectangle(index), packer.rectangle_id(index))
            else {
                continue;
            };

            // Reject anything the oracle reports outside its contract
            let valid = id < sizes.len()
                && !placed[id]
                && (rect.width, rect.height) == sizes[id]
                && rect.right() <= width
                && rect.bottom() <= height;
            if valid {
                placed[id] = true;
                placements.push(Placement {
                    item_index: id,
                    rect,
                });
            }
        }

        if placements.len() == sizes.len() {
            Ok(placements)
        } else {
            Err(placements.len())
        }
    }
}

/// Everything one build pass needs, detached from the manager so it can run
/// on another thread.
#[derive(Debug)]
pub struct BuildJob {
    pub atlas: String,
    /// Generation being replaced; its regions are carried into the new one
    pub previous: Option<Arc<AtlasGeneration>>,
    pub items: Vec<PendingItem>,
}

impl BuildJob {
    pub fn run(self, builder: &AtlasBuilder) -> Result<AtlasGeneration, AtlasError> {
        let incoming: HashSet<&str> = self.items.iter().map(|i| i.name.as_str()).collect();

        let mut items = Vec::new();
        if let Some(previous) = &self.previous {
            for name in previous.sorted_names() {
                if incoming.contains(name) {
                    continue;
                }
                if let Some(rect) = previous.region(name) {
                    items.push(PendingItem {
                        name: name.to_string(),
                        image: previous.crop(rect),
                    });
                }
            }
        }
        drop(incoming);
        items.extend(self.items);

        builder.build(&self.atlas, items)
    }
}
