// sys_main.rs — xvk-lights startup and level light load
//
// Mirrors the engine's startup order: early `+set` commands, cvar
// registration, logging, filesystem, then the level load itself.

use xvk_common::common::{com_developer, com_printf, com_set_developer, DISTNAME, DISTVER};
use xvk_common::cvar::CvarContext;
use xvk_renderer::vk_light::{VkLights, GROUPSIZE};
use xvk_renderer::vk_local::{LightsConfig, LightsError};
use xvk_renderer::vk_model::{mod_load_brush_model, mod_register_textures};
use xvk_renderer::vk_model_types::BrushModel;
use xvk_renderer::vk_textures::VkTextures;

use crate::platform_register::{platform_imports, shared_fs};

#[derive(Debug, thiserror::Error)]
pub enum SysError {
    #[error("usage: xvk-lights [+set cvar value]... <maps/name.bsp>")]
    Usage,

    #[error("Couldn't load {0}")]
    MapNotFound(String),

    #[error("{0}")]
    BadMap(String),

    #[error("{map}: {source}")]
    Lights {
        map: String,
        #[source]
        source: LightsError,
    },
}

/// Everything a successful run built.
#[derive(Debug)]
pub struct LevelLights {
    pub map: BrushModel,
    pub textures: VkTextures,
    pub lights: VkLights,
}

// ============================================================
// Startup
// ============================================================

/// Register the tool's cvars and apply the command line's `+set`
/// commands. Returns the cvars and the remaining arguments.
pub fn sys_init_cvars(args: &[String]) -> (CvarContext, Vec<String>) {
    let mut cvars = CvarContext::new();
    cvars.get("developer", "0", 0);
    cvars.get("basedir", ".", 0);
    cvars.get("game", "valve", 0);
    LightsConfig::from_cvars(&mut cvars);

    let rest = cvars.add_early_commands(args);
    (cvars, rest)
}

/// Apply the `developer` cvar to the process-wide developer flag.
pub fn sys_init_developer(cvars: &CvarContext) {
    com_set_developer(cvars.variable_value("developer") != 0.0);
}

/// Install env_logger. `RUST_LOG` wins; otherwise `info`, or `debug`
/// with `developer 1`.
pub fn sys_init_logging() {
    let level = if com_developer() { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

/// `base1` and `maps/base1` both name `maps/base1.bsp`.
pub fn map_path(arg: &str) -> String {
    let name = if arg.contains('/') { arg.to_string() } else { format!("maps/{}", arg) };
    if name.ends_with(".bsp") {
        name
    } else {
        format!("{}.bsp", name)
    }
}

// ============================================================
// Level load
// ============================================================

/// Load the level named on the command line and build its static lights.
pub fn sys_load_lights(cvars: &mut CvarContext, args: &[String]) -> Result<LevelLights, SysError> {
    let [arg] = args else {
        return Err(SysError::Usage);
    };
    let name = map_path(arg);

    com_printf(&format!("{} {}\n", DISTNAME, DISTVER));

    let fs = shared_fs(cvars.variable_string("basedir"), cvars.variable_string("game"));
    let ri = platform_imports(&fs);

    let data = ri.load_file(&name).ok_or_else(|| SysError::MapNotFound(name.clone()))?;
    let mut map = mod_load_brush_model(&name, &data).map_err(SysError::BadMap)?;

    let mut textures = VkTextures::new();
    mod_register_textures(&mut map, &mut textures, &ri);

    cvars.get_latched_vars();
    let config = LightsConfig::from_cvars(cvars);
    let mut lights = VkLights::new();
    lights
        .load_map(Some(&map), &textures, &ri, &config)
        .map_err(|source| SysError::Lights {
            map: name.clone(),
            source,
        })?;

    Ok(LevelLights { map, textures, lights })
}

/// Print the grid summary for a finished load.
pub fn sys_report(level: &LevelLights) {
    let stats = &level.lights.stats;
    com_printf(&format!(
        "{}: {} light clusters ({}x{}x{}), {} emissive surfaces of {} found, {} static lights\n",
        level.map.name,
        stats.num_cells,
        stats.size[0],
        stats.size[1],
        stats.size[2],
        stats.emissive_stored,
        stats.emissive_found,
        stats.static_lights
    ));
    com_printf(&format!(
        "  insertions: {} of {} candidate cells, {} dropped on full clusters\n",
        stats.inserted, stats.candidate_cells, stats.overflowed
    ));
    com_printf(&format!("  empty clusters: {}\n", stats.histogram[0]));
    for (i, &count) in stats.histogram.iter().enumerate().skip(1) {
        if count > 0 {
            com_printf(&format!(
                "  {}-{} surfaces: {}\n",
                (i - 1) * GROUPSIZE + 1,
                i * GROUPSIZE,
                count
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use xvk_common::common::com_capture;
    use xvk_common::qfiles::{BSPVERSION, BSP_HEADER_SIZE, HEADER_LUMPS, LUMP_ENTITIES, LUMP_MODELS};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("xvk_test_sys_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("valve/maps")).unwrap();
        dir
    }

    /// A level with no geometry: entities plus a world model spanning
    /// `mins..maxs`.
    fn empty_bsp(mins: f32, maxs: f32) -> Vec<u8> {
        let mut lumps: Vec<Vec<u8>> = vec![Vec::new(); HEADER_LUMPS];
        lumps[LUMP_ENTITIES] = b"{ \"classname\" \"worldspawn\" }\n{ \"classname\" \"light\" \"origin\" \"8 8 8\" \"_light\" \"255\" }\0".to_vec();

        let mut model = Vec::new();
        for v in [mins, mins, mins, maxs, maxs, maxs, 0.0, 0.0, 0.0] {
            model.extend_from_slice(&v.to_le_bytes());
        }
        for v in [0i32; 7] {
            model.extend_from_slice(&v.to_le_bytes());
        }
        lumps[LUMP_MODELS] = model;

        let mut out = BSPVERSION.to_le_bytes().to_vec();
        let mut ofs = BSP_HEADER_SIZE;
        for l in &lumps {
            out.extend_from_slice(&(ofs as i32).to_le_bytes());
            out.extend_from_slice(&(l.len() as i32).to_le_bytes());
            ofs += l.len();
        }
        for l in &lumps {
            out.extend_from_slice(l);
        }
        out
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ============================================================
    // Startup
    // ============================================================

    #[test]
    fn test_init_cvars_applies_set_commands() {
        let (cvars, rest) = sys_init_cvars(&args(&["+set", "vk_dump_bsp", "2", "maps/a.bsp", "+set", "game", "cstrike"]));
        assert_eq!(rest, args(&["maps/a.bsp"]));
        assert_eq!(cvars.variable_value("vk_dump_bsp"), 2.0);
        assert_eq!(cvars.variable_string("game"), "cstrike");
        assert_eq!(cvars.variable_string("basedir"), ".");
        assert_eq!(cvars.variable_string("vk_rad_file"), "rad/lights_anomalous_materials.rad");
    }

    #[test]
    fn test_init_cvars_leaves_developer_flag() {
        let ((cvars, developer), _) = com_capture(|| {
            let before = com_developer();
            let (cvars, _) = sys_init_cvars(&args(&["+set", "developer", "1"]));
            let unchanged = com_developer() == before;
            (cvars, unchanged)
        });
        assert!(developer);
        assert_eq!(cvars.variable_value("developer"), 1.0);
    }

    #[test]
    fn test_init_developer_sets_flag() {
        let (flags, _) = com_capture(|| {
            let before = com_developer();
            let (on, _) = sys_init_cvars(&args(&["+set", "developer", "1"]));
            let (off, _) = sys_init_cvars(&[]);
            sys_init_developer(&on);
            let set = com_developer();
            sys_init_developer(&off);
            let cleared = !com_developer();
            com_set_developer(before);
            (set, cleared)
        });
        assert_eq!(flags, (true, true));
    }

    #[test]
    fn test_map_path() {
        assert_eq!(map_path("c1a0"), "maps/c1a0.bsp");
        assert_eq!(map_path("maps/c1a0.bsp"), "maps/c1a0.bsp");
        assert_eq!(map_path("maps/c1a0"), "maps/c1a0.bsp");
    }

    #[test]
    fn test_usage_error() {
        let (mut cvars, _) = sys_init_cvars(&[]);
        assert!(matches!(sys_load_lights(&mut cvars, &[]), Err(SysError::Usage)));
        assert!(matches!(sys_load_lights(&mut cvars, &args(&["a", "b"])), Err(SysError::Usage)));
    }

    // ============================================================
    // Level load
    // ============================================================

    #[test]
    fn test_load_empty_level() {
        let dir = test_dir("load");
        fs::write(dir.join("valve/maps/empty.bsp"), empty_bsp(0.0, 255.0)).unwrap();
        fs::create_dir_all(dir.join("valve/rad")).unwrap();
        fs::write(dir.join("valve/rad/lights_anomalous_materials.rad"), b"// nothing\n").unwrap();

        let (mut cvars, rest) = sys_init_cvars(&args(&["+set", "basedir", &dir.to_string_lossy(), "empty"]));
        let (level, out) = com_capture(|| {
            let level = sys_load_lights(&mut cvars, &rest);
            if let Ok(level) = &level {
                sys_report(level);
            }
            level
        });
        let level = level.unwrap();

        // bounds grow by a unit: -1..256 covers cells -1..2 on each axis
        assert_eq!(level.lights.stats.size, [3, 3, 3]);
        assert_eq!(level.lights.stats.num_cells, 27);
        assert_eq!(level.lights.stats.static_lights, 1);
        assert_eq!(level.lights.stats.histogram[0], 27);
        assert!(out.contains("Emissive surfaces found: 0"));
        assert!(out.contains("maps/empty.bsp: 27 light clusters (3x3x3)"));
        assert!(!out.contains("ERROR: "));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_rad_file_is_not_fatal() {
        let dir = test_dir("norad");
        fs::write(dir.join("valve/maps/empty.bsp"), empty_bsp(0.0, 100.0)).unwrap();

        let (mut cvars, rest) = sys_init_cvars(&args(&["+set", "basedir", &dir.to_string_lossy(), "maps/empty.bsp"]));
        let (level, out) = com_capture(|| sys_load_lights(&mut cvars, &rest));
        assert!(level.is_ok());
        assert!(out.contains("ERROR: Couldn't load rad data from file rad/lights_anomalous_materials.rad"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dump_written_when_enabled() {
        let dir = test_dir("dump");
        fs::write(dir.join("valve/maps/empty.bsp"), empty_bsp(0.0, 100.0)).unwrap();
        let dot = dir.join("out.dot");

        let (mut cvars, rest) = sys_init_cvars(&args(&[
            "+set", "basedir", &dir.to_string_lossy(),
            "+set", "vk_dump_bsp", "1",
            "+set", "vk_dump_path", &dot.to_string_lossy(),
            "empty",
        ]));
        let (level, _) = com_capture(|| sys_load_lights(&mut cvars, &rest));
        assert!(level.is_ok());
        assert!(fs::read_to_string(&dot).unwrap().starts_with("digraph bsp"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_failures() {
        let dir = test_dir("fail");
        let mut bad = empty_bsp(0.0, 1.0);
        bad[0] = 29;
        fs::write(dir.join("valve/maps/old.bsp"), bad).unwrap();
        fs::write(dir.join("valve/maps/huge.bsp"), empty_bsp(-65536.0, 65536.0)).unwrap();

        let (mut cvars, _) = sys_init_cvars(&args(&["+set", "basedir", &dir.to_string_lossy()]));
        let (results, _) = com_capture(|| {
            ["nowhere", "old", "huge"].map(|m| sys_load_lights(&mut cvars, &args(&[m])))
        });
        let [missing, old, huge] = results;

        assert!(matches!(missing, Err(SysError::MapNotFound(ref n)) if n == "maps/nowhere.bsp"));
        match old {
            Err(SysError::BadMap(msg)) => assert!(msg.contains("wrong version number (29 should be 30)")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            huge,
            Err(SysError::Lights { source: LightsError::GridTooLarge { .. }, .. })
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
