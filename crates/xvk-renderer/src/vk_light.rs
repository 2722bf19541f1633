// vk_light.rs — static light clusters: emissive surfaces binned into a
// uniform grid over the world
//
// Everything here is rebuilt from scratch by VkLights::load_map and is
// read-only until the next load.

use bytemuck::{Pod, Zeroable};

use crate::platform::RefImport;
use crate::vk_bsp_dump::traverse_bsp;
use crate::vk_entities::{parse_static_light_entities, StaticLight};
use crate::vk_local::*;
use crate::vk_model_types::{BrushModel, WorldStatic};
use crate::vk_rad::EmissiveTextureTable;
use crate::vk_textures::TextureRegistry;
use xvk_common::common::{com_dprintf, com_printf, com_wprintf};
use xvk_common::q_shared::{vector_max_component, Vec3};

/// Occupancy histogram bucket width.
pub const GROUPSIZE: usize = 4;
/// Empty cells, then one bucket per GROUPSIZE occupancy levels.
pub const HISTOGRAM_SIZE: usize = 1 + MAX_VISIBLE_SURFACE_LIGHTS.div_ceil(GROUPSIZE);

// ============================================================
// Types
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissiveSurface {
    /// Index into `BrushModel::surfaces`.
    pub surface_index: usize,
    pub emissive: Vec3,
}

/// One grid cell, laid out for direct upload to a storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightCluster {
    pub num_emissive_surfaces: u8,
    pub emissive_surfaces: [u8; MAX_VISIBLE_SURFACE_LIGHTS],
}

impl LightCluster {
    pub fn surfaces(&self) -> &[u8] {
        &self.emissive_surfaces[..self.num_emissive_surfaces as usize]
    }

    fn is_full(&self) -> bool {
        self.num_emissive_surfaces as usize >= MAX_VISIBLE_SURFACE_LIGHTS
    }

    fn push(&mut self, index: u8) {
        self.emissive_surfaces[self.num_emissive_surfaces as usize] = index;
        self.num_emissive_surfaces += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct LightGrid {
    /// Grid origin in cell units.
    pub min_cell: [i32; 3],
    pub size: [i32; 3],
    pub num_cells: usize,
    pub cells: Vec<LightCluster>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightGridStats {
    pub num_cells: usize,
    pub size: [i32; 3],
    pub static_lights: usize,
    pub emissive_found: usize,
    pub emissive_stored: usize,
    /// Cells considered by the insertion cubes before bounds clipping.
    pub candidate_cells: usize,
    pub inserted: usize,
    /// Insertions dropped because the cell was full.
    pub overflowed: usize,
    pub histogram: [usize; HISTOGRAM_SIZE],
    pub non_empty_cells: usize,
}

// ============================================================
// Emissive surfaces
// ============================================================

/// Collect emissive surfaces of the world model, keeping at most
/// MAX_EMISSIVE_SURFACES. Returns the stored list and the total found.
/// Animated textures are matched by their own frame name only.
pub fn build_static_map_emissive_surfaces(
    map: &BrushModel,
    table: &EmissiveTextureTable,
) -> (Vec<EmissiveSurface>, usize) {
    let mut surfaces = Vec::new();
    let mut found = 0;
    let mut animated_noted = Vec::new();

    for i in map.model_surfaces() {
        let surf = &map.surfaces[i];
        let texture_num = map.surface_texnum(surf);

        let Some(emissive) = table.get(texture_num) else {
            if let Some(tex) = map.surface_texture(surf) {
                if tex.name.starts_with('+') && !animated_noted.contains(&texture_num) {
                    com_dprintf(&format!("{} is an animated texture, only this frame is matched\n", tex.name));
                    animated_noted.push(texture_num);
                }
            }
            continue;
        };

        if surfaces.len() < MAX_EMISSIVE_SURFACES {
            surfaces.push(EmissiveSurface {
                surface_index: i,
                emissive,
            });
        }
        found += 1;
    }

    com_printf(&format!("Emissive surfaces found: {}\n", found));

    if found > MAX_EMISSIVE_SURFACES {
        com_wprintf(&format!(
            "Too many emissive surfaces found: {}; some areas will be dark\n",
            found
        ));
    }

    (surfaces, found)
}

// ============================================================
// Grid
// ============================================================

/// Distance at which `intensity / d^2` falls to the visibility threshold.
pub fn effective_radius(intensity: f32) -> f32 {
    if intensity > 0.0 {
        (intensity / LIGHT_INTENSITY_THRESHOLD).sqrt()
    } else {
        0.0
    }
}

/// Effective radius in whole cells, rounded up.
pub fn cell_radius(intensity: f32) -> i32 {
    (effective_radius(intensity) / LIGHT_GRID_CELL_SIZE as f32).ceil() as i32
}

fn world_to_cell(p: &Vec3) -> [i32; 3] {
    let c = LIGHT_GRID_CELL_SIZE as f32;
    [
        (p[0] / c).floor() as i32,
        (p[1] / c).floor() as i32,
        (p[2] / c).floor() as i32,
    ]
}

impl LightGrid {
    /// Size a grid covering `mins..maxs`, with the lower cell boundary
    /// floored and the upper one ceiled.
    pub fn new(mins: &Vec3, maxs: &Vec3) -> Result<Self, LightsError> {
        if (0..3).any(|i| !(mins[i] <= maxs[i])) {
            return Err(LightsError::InvertedBounds {
                mins: *mins,
                maxs: *maxs,
            });
        }

        let c = LIGHT_GRID_CELL_SIZE as f32;
        let min_cell = world_to_cell(mins);
        let mut size = [0i32; 3];
        for i in 0..3 {
            let max_cell = (maxs[i] / c).ceil() as i32;
            // a flat axis still needs one layer of cells
            size[i] = max_cell.saturating_sub(min_cell[i]).max(1);
        }

        let num_cells = size.iter().fold(1u64, |n, &s| n.saturating_mul(s as u64));
        com_dprintf(&format!(
            "Map mins:({}, {}, {}), maxs:({}, {}, {}), min_cell:({}, {}, {}) cells:({}, {}, {}); total: {}\n",
            mins[0], mins[1], mins[2],
            maxs[0], maxs[1], maxs[2],
            min_cell[0], min_cell[1], min_cell[2],
            size[0], size[1], size[2],
            num_cells
        ));

        if num_cells > MAX_LIGHT_CLUSTERS as u64 {
            return Err(LightsError::GridTooLarge {
                cells: usize::try_from(num_cells).unwrap_or(usize::MAX),
                x: size[0],
                y: size[1],
                z: size[2],
            });
        }

        let num_cells = num_cells as usize;
        Ok(Self {
            min_cell,
            size,
            num_cells,
            cells: vec![LightCluster::zeroed(); num_cells],
        })
    }

    /// Cell coordinates of a world point relative to the grid origin.
    /// May lie outside the grid.
    pub fn cell_for_point(&self, p: &Vec3) -> [i32; 3] {
        let cell = world_to_cell(p);
        [
            cell[0].saturating_sub(self.min_cell[0]),
            cell[1].saturating_sub(self.min_cell[1]),
            cell[2].saturating_sub(self.min_cell[2]),
        ]
    }

    pub fn contains(&self, cell: &[i32; 3]) -> bool {
        (0..3).all(|i| cell[i] >= 0 && cell[i] < self.size[i])
    }

    /// Linear index of an in-grid cell, x fastest.
    pub fn cell_index(&self, cell: &[i32; 3]) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let [sx, sy, _] = self.size.map(|s| s as usize);
        Some(cell[0] as usize + cell[1] as usize * sx + cell[2] as usize * sx * sy)
    }

    /// Append emissive surface `index` to a cell. Out-of-grid cells are
    /// ignored; a full cell drops the insertion with a warning.
    pub fn add_surface_light_to_cell(&mut self, cell: &[i32; 3], index: u8) -> Result<(), CellInsert> {
        let Some(cluster_index) = self.cell_index(cell) else {
            return Err(CellInsert::OutOfBounds);
        };

        let cluster = &mut self.cells[cluster_index];
        if cluster.is_full() {
            com_wprintf(&format!(
                "Cluster {},{},{}({}) ran out of emissive surfaces slots\n",
                cell[0], cell[1], cell[2], cluster_index
            ));
            return Err(CellInsert::Full);
        }

        cluster.push(index);
        Ok(())
    }

    pub fn histogram(&self) -> [usize; HISTOGRAM_SIZE] {
        let mut histogram = [0usize; HISTOGRAM_SIZE];
        for cluster in &self.cells {
            let n = cluster.num_emissive_surfaces as usize;
            let bucket = if n == 0 { 0 } else { 1 + (n - 1) / GROUPSIZE };
            histogram[bucket] += 1;
        }
        histogram
    }
}

/// Why a cell insertion did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellInsert {
    OutOfBounds,
    Full,
}

/// Where one emissive surface lands: its own cell and its cell radius.
struct Placement {
    cell: [i32; 3],
    irad: i32,
}

fn place_emissive_surface(
    map: &BrushModel,
    grid: &LightGrid,
    esurf: &EmissiveSurface,
) -> Result<Placement, LightsError> {
    let surf = map
        .surfaces
        .get(esurf.surface_index)
        .ok_or(LightsError::SurfaceOutOfRange {
            index: esurf.surface_index,
            count: map.surfaces.len(),
        })?;
    let info = surf
        .info
        .ok_or(LightsError::MissingSurfaceInfo(esurf.surface_index))?;

    Ok(Placement {
        cell: grid.cell_for_point(&info.origin),
        irad: cell_radius(vector_max_component(&esurf.emissive)),
    })
}

/// Size the grid for the world bounds and insert every emissive surface
/// into each cell of the cube of cells its light can reach.
pub fn build_static_map_lights_grid(
    map: &BrushModel,
    surfaces: &[EmissiveSurface],
) -> Result<(LightGrid, LightGridStats), LightsError> {
    let mut grid = LightGrid::new(&map.mins, &map.maxs)?;
    let mut stats = LightGridStats {
        num_cells: grid.num_cells,
        size: grid.size,
        ..Default::default()
    };

    // cluster slots hold u8 surface indices
    let surfaces = if surfaces.len() > MAX_EMISSIVE_SURFACES {
        com_wprintf(&format!(
            "Too many emissive surfaces for the light grid: {}; only the first {} are binned\n",
            surfaces.len(),
            MAX_EMISSIVE_SURFACES
        ));
        &surfaces[..MAX_EMISSIVE_SURFACES]
    } else {
        surfaces
    };

    // first bad surface in scan order fails the build
    let placements: Vec<Placement> = surfaces
        .iter()
        .map(|esurf| place_emissive_surface(map, &grid, esurf))
        .collect::<Result<_, _>>()?;

    for (i, p) in placements.iter().enumerate() {
        let Ok(index) = u8::try_from(i) else {
            break;
        };
        let irad = p.irad;

        com_dprintf(&format!(
            "Emissive surface {}: max intensity: {}; eff rad: {}; cell rad: {}\n",
            i,
            vector_max_component(&surfaces[i].emissive),
            effective_radius(vector_max_component(&surfaces[i].emissive)),
            irad
        ));

        if !grid.contains(&p.cell) {
            com_wprintf(&format!(
                "Emissive surface {} centroid is outside the light grid at cell {},{},{}\n",
                surfaces[i].surface_index, p.cell[0], p.cell[1], p.cell[2]
            ));
        }

        let span = 2 * irad as usize + 1;
        stats.candidate_cells = stats.candidate_cells.saturating_add(span.saturating_pow(3));

        // offsets whose cell falls outside the grid would be skipped anyway
        let [rx, ry, rz] = [0usize, 1, 2].map(|a| {
            let lo = (-irad).max(p.cell[a].saturating_neg());
            let hi = irad.min(grid.size[a].saturating_sub(1).saturating_sub(p.cell[a]));
            lo..=hi
        });

        for x in rx {
            for y in ry.clone() {
                for z in rz.clone() {
                    let cell = [p.cell[0] + x, p.cell[1] + y, p.cell[2] + z];
                    match grid.add_surface_light_to_cell(&cell, index) {
                        Ok(()) => stats.inserted += 1,
                        Err(CellInsert::Full) => stats.overflowed += 1,
                        Err(CellInsert::OutOfBounds) => {}
                    }
                }
            }
        }
    }

    stats.histogram = grid.histogram();
    stats.non_empty_cells = grid.num_cells - stats.histogram[0];

    com_dprintf(&format!("Built {} light clusters. Stats:\n", grid.num_cells));
    com_dprintf(&format!("  0: {}\n", stats.histogram[0]));
    for (i, count) in stats.histogram.iter().enumerate().skip(1) {
        com_dprintf(&format!("  {}-{}: {}\n", (i - 1) * GROUPSIZE + 1, i * GROUPSIZE, count));
    }
    for (i, cluster) in grid.cells.iter().enumerate() {
        if cluster.num_emissive_surfaces > 0 {
            com_dprintf(&format!(
                " cluster {}: emissive_surfaces={}\n",
                i, cluster.num_emissive_surfaces
            ));
        }
    }

    Ok((grid, stats))
}

// ============================================================
// Per-level context
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct VkLights {
    pub table: EmissiveTextureTable,
    pub emissive_surfaces: Vec<EmissiveSurface>,
    pub num_emissive_found: usize,
    pub grid: LightGrid,
    /// Classified light entities. Not part of the grid.
    pub static_lights: Vec<StaticLight>,
    pub stats: LightGridStats,
}

impl VkLights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild all static light data for a freshly loaded world.
    /// Missing or bad rad data only degrades lighting; an unusable world
    /// returns Err and leaves the context empty.
    pub fn load_map(
        &mut self,
        map: Option<&BrushModel>,
        textures: &dyn TextureRegistry,
        ri: &RefImport,
        config: &LightsConfig,
    ) -> Result<&LightGridStats, LightsError> {
        self.shutdown();
        let map = map.ok_or(LightsError::NoWorldModel)?;

        self.static_lights = parse_static_light_entities(&map.entities);

        self.table.load_rad_data(ri, &config.rad_file, &map.name, textures);

        let (surfaces, found) = build_static_map_emissive_surfaces(map, &self.table);
        self.emissive_surfaces = surfaces;
        self.num_emissive_found = found;

        let (grid, mut stats) = match build_static_map_lights_grid(map, &self.emissive_surfaces) {
            Ok(built) => built,
            Err(e) => {
                self.shutdown();
                return Err(e);
            }
        };
        stats.static_lights = self.static_lights.len();
        stats.emissive_found = found;
        stats.emissive_stored = self.emissive_surfaces.len();
        self.grid = grid;
        self.stats = stats;

        if config.dump_bsp > 0 {
            let world = WorldStatic::for_model(map);
            if let Err(e) = traverse_bsp(map, &world, &self.table, &config.dump_path, config.dump_bsp > 1) {
                com_wprintf(&format!("Couldn't write {}: {}\n", config.dump_path, e));
            }
        }

        Ok(&self.stats)
    }

    /// Drop everything built by the last load.
    pub fn shutdown(&mut self) {
        self.table.reset();
        self.emissive_surfaces.clear();
        self.num_emissive_found = 0;
        self.grid = LightGrid::default();
        self.static_lights.clear();
        self.stats = LightGridStats::default();
    }

    // ============================================================
    // Queries
    // ============================================================

    /// Grid cell holding a world point, if the point is inside the grid.
    pub fn cell_for_point(&self, p: &Vec3) -> Option<[i32; 3]> {
        let cell = self.grid.cell_for_point(p);
        self.grid.contains(&cell).then_some(cell)
    }

    pub fn cluster_for_point(&self, p: &Vec3) -> Option<&LightCluster> {
        let cell = self.grid.cell_for_point(p);
        self.grid.cell_index(&cell).map(|i| &self.grid.cells[i])
    }

    /// Emissive surfaces binned into the cell containing `p`.
    pub fn emissive_surfaces_near(&self, p: &Vec3) -> Vec<&EmissiveSurface> {
        self.cluster_for_point(p)
            .map(|cluster| {
                cluster
                    .surfaces()
                    .iter()
                    .filter_map(|&i| self.emissive_surfaces.get(i as usize))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Packed cluster array for a GPU storage buffer.
    pub fn cells_as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.grid.cells)
    }
}
