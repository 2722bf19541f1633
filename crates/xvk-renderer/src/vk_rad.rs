// vk_rad.rs — emissive material table loaded from .rad intensity files
//
// Line grammar, whitespace separated:
//   <name> <intensity>
//   <name> <r> <g> <b>
//   <name> <r> <g> <b> <scale>     color is multiplied by scale/255
// <name> may be scoped to a WAD as "<wad>/<texture>".

use crate::platform::RefImport;
use crate::vk_local::MAX_TEXTURES;
use crate::vk_model_types::TexHandle;
use crate::vk_textures::TextureRegistry;
use xvk_common::common::{com_dprintf, com_eprintf, com_wprintf};
use xvk_common::q_shared::Vec3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmissiveEntry {
    pub emissive: Vec3,
    pub set: bool,
}

/// Emission color per texture handle.
#[derive(Debug, Clone)]
pub struct EmissiveTextureTable {
    entries: Vec<EmissiveEntry>,
}

impl Default for EmissiveTextureTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EmissiveTextureTable {
    pub fn new() -> Self {
        Self {
            entries: vec![EmissiveEntry::default(); MAX_TEXTURES],
        }
    }

    pub fn reset(&mut self) {
        self.entries.fill(EmissiveEntry::default());
    }

    /// Emission color for a texture handle, if one was configured.
    pub fn get(&self, handle: i32) -> Option<Vec3> {
        if handle < 0 {
            return None;
        }
        self.entries
            .get(handle as usize)
            .filter(|e| e.set)
            .map(|e| e.emissive)
    }

    pub fn set(&mut self, handle: TexHandle, color: Vec3) -> bool {
        match self.entries.get_mut(handle as usize) {
            Some(entry) => {
                *entry = EmissiveEntry {
                    emissive: color,
                    set: true,
                };
                true
            }
            None => {
                com_wprintf(&format!("rad: texture handle {} out of range\n", handle));
                false
            }
        }
    }

    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.set).count()
    }

    // ============================================================
    // Loading
    // ============================================================

    /// Reset the table and fill it from `filename`. A missing file leaves
    /// the table empty.
    pub fn load_rad_data(
        &mut self,
        ri: &RefImport,
        filename: &str,
        map_name: &str,
        textures: &dyn TextureRegistry,
    ) -> usize {
        self.reset();

        let data = match ri.load_file(filename) {
            Some(data) => data,
            None => {
                com_eprintf(&format!(
                    "Couldn't load rad data from file {}, the map will be completely black\n",
                    filename
                ));
                return 0;
            }
        };

        self.parse_rad_data(&String::from_utf8_lossy(&data), map_name, textures)
    }

    /// Parse rad text into the table without resetting it first. Returns
    /// the number of entries that resolved to a texture.
    pub fn parse_rad_data(&mut self, text: &str, map_name: &str, textures: &dyn TextureRegistry) -> usize {
        let mut stored = 0;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((name, color)) = parse_rad_line(line) else {
                com_wprintf(&format!("skipping rad entry {}\n", line));
                continue;
            };

            com_dprintf(&format!("rad entry: {} {} {} {}\n", name, color[0], color[1], color[2]));

            let Some(handle) = lookup_rad_texture(name, map_name, textures) else {
                com_dprintf(&format!("rad entry {} has no matching texture\n", name));
                continue;
            };

            if self.set(handle, color) {
                stored += 1;
            }
        }

        stored
    }
}

/// Split one rad line into its texture name and emission color.
fn parse_rad_line(line: &str) -> Option<(&str, Vec3)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let num = |s: &str| s.parse::<f32>().ok();

    match *tokens.as_slice() {
        [name, v] => {
            let v = num(v)?;
            Some((name, [v, v, v]))
        }
        [name, r, g, b] => Some((name, [num(r)?, num(g)?, num(b)?])),
        [name, r, g, b, s] => {
            let scale = num(s)? / 255.0;
            Some((name, [num(r)? * scale, num(g)? * scale, num(b)? * scale]))
        }
        _ => None,
    }
}

/// Resolve a rad name: first as a texture embedded in the map, then in
/// the named WAD.
fn lookup_rad_texture(name: &str, map_name: &str, textures: &dyn TextureRegistry) -> Option<TexHandle> {
    let (wad, texture) = match name.split_once('/') {
        Some((wad, texture)) => (Some(wad), texture),
        None => (None, name),
    };

    let embedded = format!("#{}:{}.mip", map_name, texture);
    if let Some(handle) = textures.find_texture(&embedded) {
        com_dprintf(&format!("Looked up texture {} -> {}\n", embedded, handle));
        return Some(handle);
    }

    let wad = wad?;
    let external = format!("{}.wad/{}.mip", wad, texture);
    let handle = textures.find_texture(&external)?;
    com_dprintf(&format!("Looked up texture {} -> {}\n", external, handle));
    Some(handle)
}
