// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// vk_local.rs — renderer local definitions for static light clustering

use thiserror::Error;

use xvk_common::cvar::CvarContext;
use xvk_common::q_shared::CVAR_LATCH;
use xvk_common::qfiles::MAX_MAP_LEAFS;

// ============================================================================
// Tuning constants
// ============================================================================

/// Edge length of one light grid cell, in world units.
pub const LIGHT_GRID_CELL_SIZE: i32 = 128;

/// Hard upper bound on the number of grid cells.
pub const MAX_LIGHT_CLUSTERS: usize = 262144;

/// Emissive surface slots per grid cell.
pub const MAX_VISIBLE_SURFACE_LIGHTS: usize = 64;

/// Emissive surfaces kept per level. Cells store surface indices as `u8`.
pub const MAX_EMISSIVE_SURFACES: usize = 256;

pub const MAX_TEXTURES: usize = 4096;

/// Smallest per-channel contribution still considered visible.
pub const LIGHT_INTENSITY_THRESHOLD: f32 = 1.0 / 255.0;

/// Capacity of a decompressed visibility row, in bytes.
pub const MAX_VISBYTES: usize = MAX_MAP_LEAFS.div_ceil(8);

pub const DEFAULT_RAD_FILE: &str = "rad/lights_anomalous_materials.rad";
pub const DEFAULT_DUMP_PATH: &str = "bsp.dot";

// ============================================================================
// Errors
// ============================================================================

/// Conditions that abort a light load. Everything else is logged and
/// processing continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LightsError {
    #[error("light grid too large: {cells} cells ({x}x{y}x{z}), max is {max}", max = MAX_LIGHT_CLUSTERS)]
    GridTooLarge { cells: usize, x: i32, y: i32, z: i32 },

    #[error("world bounds are inverted: mins {mins:?} maxs {maxs:?}")]
    InvertedBounds { mins: [f32; 3], maxs: [f32; 3] },

    #[error("no world model loaded")]
    NoWorldModel,

    #[error("emissive surface {0} has no precomputed centroid")]
    MissingSurfaceInfo(usize),

    #[error("emissive surface index {index} out of range ({count} surfaces)")]
    SurfaceOutOfRange { index: usize, count: usize },

    #[error("visibility row of {visbytes} bytes exceeds capacity {max}", max = MAX_VISBYTES)]
    VisTooLarge { visbytes: usize },
}

// ============================================================================
// Configuration
// ============================================================================

/// Cvar snapshot consumed by the light-load sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct LightsConfig {
    pub rad_file: String,
    /// 0 = off, 1 = write the BSP graph, 2 = also emit PVS peer edges.
    pub dump_bsp: i32,
    pub dump_path: String,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            rad_file: DEFAULT_RAD_FILE.to_string(),
            dump_bsp: 0,
            dump_path: DEFAULT_DUMP_PATH.to_string(),
        }
    }
}

impl LightsConfig {
    /// Register the renderer's light cvars (if needed) and read them.
    /// `vk_rad_file` is latched: a change applies at the next level load.
    pub fn from_cvars(cvars: &mut CvarContext) -> Self {
        cvars.get("vk_rad_file", DEFAULT_RAD_FILE, CVAR_LATCH);
        cvars.get("vk_dump_bsp", "0", 0);
        cvars.get("vk_dump_path", DEFAULT_DUMP_PATH, 0);

        Self {
            rad_file: cvars.variable_string("vk_rad_file").to_string(),
            dump_bsp: cvars.variable_value("vk_dump_bsp") as i32,
            dump_path: cvars.variable_string("vk_dump_path").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(MAX_VISBYTES, 4096);
        assert!(MAX_EMISSIVE_SURFACES <= u8::MAX as usize + 1);
        assert!((LIGHT_INTENSITY_THRESHOLD * 255.0 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_config_defaults_from_cvars() {
        let mut cvars = CvarContext::new();
        let cfg = LightsConfig::from_cvars(&mut cvars);
        assert_eq!(cfg, LightsConfig::default());
        assert!(cvars.find_var("vk_rad_file").is_some());
    }

    #[test]
    fn test_config_overrides() {
        let mut cvars = CvarContext::new();
        cvars.set("vk_rad_file", "rad/custom.rad");
        cvars.set("vk_dump_bsp", "2");
        let cfg = LightsConfig::from_cvars(&mut cvars);
        assert_eq!(cfg.rad_file, "rad/custom.rad");
        assert_eq!(cfg.dump_bsp, 2);
        assert_eq!(cfg.dump_path, "bsp.dot");
    }

    #[test]
    fn test_rad_file_change_waits_for_next_load() {
        let mut cvars = CvarContext::new();
        LightsConfig::from_cvars(&mut cvars);
        cvars.set("vk_rad_file", "rad/next.rad");
        assert_eq!(LightsConfig::from_cvars(&mut cvars).rad_file, DEFAULT_RAD_FILE);

        cvars.get_latched_vars();
        assert_eq!(LightsConfig::from_cvars(&mut cvars).rad_file, "rad/next.rad");
    }

    #[test]
    fn test_error_messages() {
        let e = LightsError::GridTooLarge { cells: 300000, x: 100, y: 100, z: 30 };
        assert!(e.to_string().contains("300000"));
        assert!(e.to_string().contains("262144"));
        assert_eq!(LightsError::NoWorldModel.to_string(), "no world model loaded");
    }
}
