// vk_textures.rs — texture name registry and WAD3 directory reading
//
// Only names and handles are tracked here; pixel upload belongs to the
// image code of the full renderer.

use std::collections::HashMap;

use crate::vk_local::MAX_TEXTURES;
use crate::vk_model_types::TexHandle;
use xvk_common::common::{com_dprintf, com_wprintf};
use xvk_common::qfiles::{
    read_fixed_name, read_i32_le, IDWAD3HEADER, MIPTEX_NAME_LEN, WAD_HEADER_SIZE, WAD_LUMP_INFO_SIZE,
    WAD_LUMP_NAME_OFS,
};

/// Name to handle lookup consumed by the light code.
pub trait TextureRegistry {
    fn find_texture(&self, name: &str) -> Option<TexHandle>;
}

// ============================================================
// Registry
// ============================================================

#[derive(Debug, Clone)]
pub struct VkTextures {
    /// handle -> name; slot 0 is the reserved "no texture" entry
    names: Vec<String>,
    /// lowercase name -> handle
    index: HashMap<String, TexHandle>,
}

impl Default for VkTextures {
    fn default() -> Self {
        Self::new()
    }
}

impl VkTextures {
    pub fn new() -> Self {
        Self {
            names: vec![String::new()],
            index: HashMap::new(),
        }
    }

    /// Register `name`, returning its existing handle if already known.
    /// Returns `None` when the table is full.
    pub fn register(&mut self, name: &str) -> Option<TexHandle> {
        let key = name.to_lowercase();
        if let Some(&handle) = self.index.get(&key) {
            return Some(handle);
        }

        if self.names.len() >= MAX_TEXTURES {
            com_wprintf(&format!("VK_LoadTexture: too many textures, dropping {}\n", name));
            return None;
        }

        let handle = self.names.len() as TexHandle;
        self.names.push(name.to_string());
        self.index.insert(key, handle);
        com_dprintf(&format!("Registered texture {} -> {}\n", name, handle));
        Some(handle)
    }

    pub fn name_of(&self, handle: TexHandle) -> Option<&str> {
        if handle == 0 {
            return None;
        }
        self.names.get(handle as usize).map(String::as_str)
    }

    /// Number of registered textures, not counting the reserved slot.
    pub fn count(&self) -> usize {
        self.names.len() - 1
    }

    /// Forget every texture (level change).
    pub fn clear(&mut self) {
        self.names.truncate(1);
        self.index.clear();
    }
}

impl TextureRegistry for VkTextures {
    fn find_texture(&self, name: &str) -> Option<TexHandle> {
        self.index.get(&name.to_lowercase()).copied()
    }
}

// ============================================================
// WAD3 directory
// ============================================================

/// Lump names in a WAD3 archive, in directory order. `None` if `data`
/// is not a WAD3 file or its directory runs past the end.
pub fn wad_lump_names(data: &[u8]) -> Option<Vec<String>> {
    if data.len() < WAD_HEADER_SIZE || read_i32_le(data, 0)? != IDWAD3HEADER {
        return None;
    }

    let numlumps = read_i32_le(data, 4)?;
    let infotableofs = read_i32_le(data, 8)?;
    if numlumps < 0 || infotableofs < 0 {
        return None;
    }

    let (numlumps, infotableofs) = (numlumps as usize, infotableofs as usize);
    if infotableofs + numlumps * WAD_LUMP_INFO_SIZE > data.len() {
        return None;
    }

    (0..numlumps)
        .map(|i| read_fixed_name(data, infotableofs + i * WAD_LUMP_INFO_SIZE + WAD_LUMP_NAME_OFS, MIPTEX_NAME_LEN))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a WAD3 file holding empty lumps with the given names.
    pub(crate) fn make_wad(names: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&IDWAD3HEADER.to_le_bytes());
        out.extend_from_slice(&(names.len() as i32).to_le_bytes());
        out.extend_from_slice(&(WAD_HEADER_SIZE as i32).to_le_bytes());
        for name in names {
            let mut info = [0u8; WAD_LUMP_INFO_SIZE];
            info[WAD_LUMP_NAME_OFS..WAD_LUMP_NAME_OFS + name.len()].copy_from_slice(name.as_bytes());
            out.extend_from_slice(&info);
        }
        out
    }

    // ============================================================
    // Registry
    // ============================================================

    #[test]
    fn test_register_and_find() {
        let mut tex = VkTextures::new();
        let h = tex.register("#maps/c1a0.bsp:~LIGHT3A.mip").unwrap();
        assert_ne!(h, 0);
        assert_eq!(tex.find_texture("#maps/c1a0.bsp:~light3a.mip"), Some(h));
        assert_eq!(tex.register("#MAPS/C1A0.BSP:~LIGHT3A.MIP"), Some(h));
        assert_eq!(tex.count(), 1);
        assert_eq!(tex.name_of(h), Some("#maps/c1a0.bsp:~LIGHT3A.mip"));
        assert_eq!(tex.name_of(0), None);
        assert_eq!(tex.find_texture("halflife.wad/brick.mip"), None);
    }

    #[test]
    fn test_register_capacity() {
        let mut tex = VkTextures::new();
        for i in 1..MAX_TEXTURES {
            assert_eq!(tex.register(&format!("t{}", i)), Some(i as TexHandle));
        }
        assert_eq!(tex.register("one_too_many"), None);
        assert_eq!(tex.register("t1"), Some(1));
    }

    #[test]
    fn test_clear() {
        let mut tex = VkTextures::new();
        tex.register("a");
        tex.clear();
        assert_eq!(tex.count(), 0);
        assert_eq!(tex.find_texture("a"), None);
        assert_eq!(tex.register("b"), Some(1));
    }

    // ============================================================
    // WAD3
    // ============================================================

    #[test]
    fn test_wad_lump_names() {
        let wad = make_wad(&["~LIGHT3A", "BRICK1"]);
        assert_eq!(
            wad_lump_names(&wad),
            Some(vec!["~LIGHT3A".to_string(), "BRICK1".to_string()])
        );
    }

    #[test]
    fn test_wad_bad_data() {
        assert_eq!(wad_lump_names(b"PACK\0\0\0\0\0\0\0\0"), None);
        let mut wad = make_wad(&["A"]);
        wad.truncate(wad.len() - 1);
        assert_eq!(wad_lump_names(&wad), None);
    }
}
