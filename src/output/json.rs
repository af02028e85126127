use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::atlas::AtlasGeneration;
use crate::output::atlas_png_filename;

#[derive(Serialize, Deserialize, Debug)]
struct JsonOutput {
    meta: Meta,
    atlas: JsonAtlas,
}

#[derive(Serialize, Deserialize, Debug)]
struct Meta {
    app: String,
    version: String,
    format: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct JsonAtlas {
    name: String,
    image: String,
    generation: u64,
    size: Size,
    regions: Vec<JsonRegion>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct Size {
    w: u32,
    h: u32,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct JsonRegion {
    name: String,
    frame: Frame,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct Frame {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Write the region table of one atlas generation as `<base_name>.json`
pub fn write_json(
    generation: &AtlasGeneration,
    version: u64,
    output_dir: &Path,
    base_name: &str,
) -> Result<()> {
    let regions = generation
        .sorted_names()
        .into_iter()
        .filter_map(|name| {
            let rect = generation.region(name)?;
            Some(JsonRegion {
                name: name.to_string(),
                frame: Frame {
                    x: rect.x,
                    y: rect.y,
                    w: rect.width,
                    h: rect.height,
                },
            })
        })
        .collect();

    let output = JsonOutput {
        meta: Meta {
            app: "dynatlas".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "rgba8888".to_string(),
        },
        atlas: JsonAtlas {
            name: base_name.to_string(),
            image: atlas_png_filename(base_name),
            generation: version,
            size: Size {
                w: generation.width,
                h: generation.height,
            },
            regions,
        },
    };

    let json_path = output_dir.join(format!("{}.json", base_name));
    let content = serde_json::to_string_pretty(&output)?;

    fs::write(&json_path, content)
        .with_context(|| format!("failed to write region table: {}", json_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::Rect;

    #[test]
    fn test_regions_sorted_by_name() {
        let dir = std::env::temp_dir().join(format!("dynatlas-json-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut generation = AtlasGeneration::new(64, 32);
        generation
            .regions
            .insert("zeta".to_string(), Rect::new(32, 0, 16, 16));
        generation
            .regions
            .insert("alpha".to_string(), Rect::new(0, 0, 32, 32));
        write_json(&generation, 3, &dir, "ui").unwrap();

        let content = fs::read_to_string(dir.join("ui.json")).unwrap();
        let parsed: JsonOutput = serde_json::from_str(&content).unwrap();

        assert_eq!(parsed.meta.app, "dynatlas");
        assert_eq!(parsed.atlas.image, "ui.png");
        assert_eq!(parsed.atlas.generation, 3);
        assert_eq!(parsed.atlas.size, Size { w: 64, h: 32 });
        let names: Vec<&str> = parsed.atlas.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(
            parsed.atlas.regions[1].frame,
            Frame {
                x: 32,
                y: 0,
                w: 16,
                h: 16
            }
        );

        fs::remove_dir_all(&dir).ok();
    }
}
