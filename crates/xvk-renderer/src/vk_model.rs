// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// vk_model.rs — BSP version 30 level loading
//
// Lumps are decoded into a BrushModel owned by the caller. Malformed data
// becomes an Err with the engine's drop message instead of a longjmp.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::platform::RefImport;
use crate::vk_entities::worldspawn_value;
use crate::vk_model_types::*;
use crate::vk_textures::{wad_lump_names, VkTextures};
use xvk_common::common::{com_dprintf, com_printf, com_wprintf};
use xvk_common::q_shared::{com_file_base, vector_add, vector_scale, Vec3};
use xvk_common::qfiles::*;

// ===============================================================
//  Lump access
// ===============================================================

struct BspFile<'a> {
    name: &'a str,
    data: &'a [u8],
    lumps: [Lump; HEADER_LUMPS],
}

impl<'a> BspFile<'a> {
    fn parse(name: &'a str, data: &'a [u8]) -> Result<Self, String> {
        if data.len() < BSP_HEADER_SIZE {
            return Err(format!("Mod_LoadBrushModel: {} is too short", name));
        }

        let version = read_i32_le(data, 0).unwrap_or(0);
        if version != BSPVERSION {
            return Err(format!(
                "Mod_LoadBrushModel: {} has wrong version number ({} should be {})",
                name, version, BSPVERSION
            ));
        }

        let mut lumps = [Lump::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter_mut().enumerate() {
            let ofs = 4 + i * 8;
            lump.fileofs = read_i32_le(data, ofs).unwrap_or(-1);
            lump.filelen = read_i32_le(data, ofs + 4).unwrap_or(-1);
        }

        Ok(Self { name, data, lumps })
    }

    /// Raw bytes of lump `idx` and its record count for `rec_size`.
    fn lump(&self, idx: usize, rec_size: usize) -> Result<(&'a [u8], usize), String> {
        let l = self.lumps[idx];
        if l.fileofs < 0 || l.filelen < 0 {
            return Err(format!("MOD_LoadBmodel: bad lump {} in {}", idx, self.name));
        }
        let (ofs, len) = (l.fileofs as usize, l.filelen as usize);
        if !len.is_multiple_of(rec_size) {
            return Err(format!("MOD_LoadBmodel: funny lump size in {}", self.name));
        }
        let bytes = self
            .data
            .get(ofs..ofs + len)
            .ok_or_else(|| format!("MOD_LoadBmodel: lump {} past end of {}", idx, self.name))?;
        Ok((bytes, len / rec_size))
    }
}

fn read_vec3(b: &[u8], ofs: usize) -> Vec3 {
    [
        read_f32_le(b, ofs).unwrap_or(0.0),
        read_f32_le(b, ofs + 4).unwrap_or(0.0),
        read_f32_le(b, ofs + 8).unwrap_or(0.0),
    ]
}

fn read_minmaxs_i16(b: &[u8], ofs: usize) -> [f32; 6] {
    let mut out = [0.0f32; 6];
    for (j, v) in out.iter_mut().enumerate() {
        *v = read_i16_le(b, ofs + j * 2).unwrap_or(0) as f32;
    }
    out
}

// Fixed-size records below are sliced out of a lump whose length was
// checked against the record size, so the field reads cannot miss.

// ===============================================================
//  BRUSHMODEL LOADING
// ===============================================================

fn mod_load_entities(bsp: &BspFile) -> Result<String, String> {
    let (b, _) = bsp.lump(LUMP_ENTITIES, 1)?;
    let end = b.iter().position(|&c| c == 0).unwrap_or(b.len());
    Ok(String::from_utf8_lossy(&b[..end]).into_owned())
}

fn mod_load_vertexes(bsp: &BspFile) -> Result<Vec<Vec3>, String> {
    let (b, count) = bsp.lump(LUMP_VERTEXES, DVERTEX_SIZE)?;
    Ok((0..count).map(|i| read_vec3(b, i * DVERTEX_SIZE)).collect())
}

fn mod_load_edges(bsp: &BspFile, numvertexes: usize) -> Result<Vec<MEdge>, String> {
    let (b, count) = bsp.lump(LUMP_EDGES, DEDGE_SIZE)?;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let ofs = i * DEDGE_SIZE;
        let v = [
            read_u16_le(b, ofs).unwrap_or(0),
            read_u16_le(b, ofs + 2).unwrap_or(0),
        ];
        if v.iter().any(|&v| v as usize >= numvertexes) {
            return Err(format!("MOD_LoadBmodel: bad vertex number in edge {} of {}", i, bsp.name));
        }
        out.push(MEdge { v });
    }
    Ok(out)
}

fn mod_load_surfedges(bsp: &BspFile, numedges: usize) -> Result<Vec<i32>, String> {
    let (b, count) = bsp.lump(LUMP_SURFEDGES, 4)?;
    if count > MAX_MAP_SURFEDGES {
        return Err(format!(
            "MOD_LoadBmodel: bad surfedges count in {}: {}",
            bsp.name, count
        ));
    }
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let e = read_i32_le(b, i * 4).unwrap_or(0);
        if e.unsigned_abs() as usize >= numedges {
            return Err(format!("MOD_LoadBmodel: bad surfedge {} in {}", e, bsp.name));
        }
        out.push(e);
    }
    Ok(out)
}

fn mod_load_textures(bsp: &BspFile) -> Result<Vec<Option<MTexture>>, String> {
    let (b, _) = bsp.lump(LUMP_TEXTURES, 1)?;
    if b.is_empty() {
        return Ok(Vec::new());
    }

    let nummiptex = read_i32_le(b, 0).unwrap_or(0);
    if nummiptex < 0 || 4 + nummiptex as usize * 4 > b.len() {
        return Err(format!("Mod_LoadTextures: bad miptex count in {}", bsp.name));
    }

    let mut out = Vec::with_capacity(nummiptex as usize);
    for i in 0..nummiptex as usize {
        let ofs = read_i32_le(b, 4 + i * 4).unwrap_or(-1);
        if ofs < 0 {
            out.push(None);
            continue;
        }
        let ofs = ofs as usize;
        if ofs + MIPTEX_SIZE > b.len() {
            return Err(format!("Mod_LoadTextures: miptex {} past end of {}", i, bsp.name));
        }

        let name = read_fixed_name(b, ofs, MIPTEX_NAME_LEN).unwrap_or_default();
        let width = read_u32_le(b, ofs + 16).unwrap_or(0);
        let height = read_u32_le(b, ofs + 20).unwrap_or(0);
        let embedded = read_u32_le(b, ofs + 24).unwrap_or(0) != 0;

        out.push(Some(MTexture {
            name,
            width,
            height,
            embedded,
            texnum: -1,
        }));
    }
    Ok(out)
}

fn mod_load_texinfo(bsp: &BspFile, nummiptex: usize) -> Result<Vec<MTexInfo>, String> {
    let (b, count) = bsp.lump(LUMP_TEXINFO, TEXINFO_SIZE)?;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let ofs = i * TEXINFO_SIZE;
        let mut vecs = [[0.0f32; 4]; 2];
        for (j, v) in vecs.iter_mut().flatten().enumerate() {
            *v = read_f32_le(b, ofs + j * 4).unwrap_or(0.0);
        }
        let miptex = read_i32_le(b, ofs + 32).unwrap_or(-1);
        let flags = read_i32_le(b, ofs + 36).unwrap_or(0);

        let texture = if miptex >= 0 && (miptex as usize) < nummiptex {
            Some(miptex as usize)
        } else {
            com_wprintf(&format!("Mod_LoadTexinfo: bad miptex {} in {}\n", miptex, bsp.name));
            None
        };

        out.push(MTexInfo { vecs, flags, texture });
    }
    Ok(out)
}

/// Average of the polygon's edge-loop vertices.
fn calc_surface_centroid(
    firstedge: i32,
    numedges: i32,
    surfedges: &[i32],
    edges: &[MEdge],
    vertexes: &[Vec3],
) -> Option<Vec3> {
    if numedges <= 0 || firstedge < 0 {
        return None;
    }

    let mut sum: Vec3 = [0.0; 3];
    for i in 0..numedges as usize {
        let e = *surfedges.get(firstedge as usize + i)?;
        let vi = if e >= 0 {
            edges.get(e as usize)?.v[0]
        } else {
            edges.get(e.unsigned_abs() as usize)?.v[1]
        };
        sum = vector_add(&sum, vertexes.get(vi as usize)?);
    }
    Some(vector_scale(&sum, 1.0 / numedges as f32))
}

fn mod_load_faces(bsp: &BspFile, model: &BrushModel) -> Result<Vec<MSurface>, String> {
    let (b, count) = bsp.lump(LUMP_FACES, DFACE_SIZE)?;

    (0..count)
        .into_par_iter()
        .map(|i| {
            let ofs = i * DFACE_SIZE;
            let firstedge = read_i32_le(b, ofs + 4).unwrap_or(0);
            let numedges = read_i16_le(b, ofs + 8).unwrap_or(0) as i32;
            let ti = read_i16_le(b, ofs + 10).unwrap_or(-1);

            if ti < 0 || ti as usize >= model.texinfo.len() {
                return Err("MOD_LoadBmodel: bad texinfo number".to_string());
            }
            if firstedge < 0 || firstedge as usize + numedges.max(0) as usize > model.surfedges.len() {
                return Err(format!("MOD_LoadBmodel: bad surface edges in {}", bsp.name));
            }

            let mut styles = [0u8; 4];
            styles.copy_from_slice(&b[ofs + 12..ofs + 16]);

            let info = calc_surface_centroid(firstedge, numedges, &model.surfedges, &model.edges, &model.vertexes)
                .map(|origin| SurfaceInfo { origin });

            Ok(MSurface {
                flags: 0,
                firstedge,
                numedges,
                texinfo: ti as usize,
                styles,
                info,
            })
        })
        .collect()
}

fn mod_load_marksurfaces(bsp: &BspFile, numsurfaces: usize) -> Result<Vec<usize>, String> {
    let (b, count) = bsp.lump(LUMP_MARKSURFACES, 2)?;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let j = read_u16_le(b, i * 2).unwrap_or(0) as usize;
        if j >= numsurfaces {
            return Err("Mod_ParseMarksurfaces: bad surface number".to_string());
        }
        out.push(j);
    }
    Ok(out)
}

fn mod_load_visibility(bsp: &BspFile) -> Result<Vec<u8>, String> {
    let (b, _) = bsp.lump(LUMP_VISIBILITY, 1)?;
    Ok(b.to_vec())
}

fn mod_load_leafs(bsp: &BspFile, model: &BrushModel) -> Result<Vec<MLeaf>, String> {
    let (b, count) = bsp.lump(LUMP_LEAFS, DLEAF_SIZE)?;
    if count > MAX_MAP_LEAFS {
        return Err(format!("Mod_LoadLeafs: {} has too many leafs ({})", bsp.name, count));
    }

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let ofs = i * DLEAF_SIZE;
        let contents = read_i32_le(b, ofs).unwrap_or(CONTENTS_SOLID);
        let visofs = read_i32_le(b, ofs + 4).unwrap_or(-1);
        let firstmarksurface = read_u16_le(b, ofs + 20).unwrap_or(0) as usize;
        let nummarksurfaces = read_u16_le(b, ofs + 22).unwrap_or(0) as usize;

        if firstmarksurface + nummarksurfaces > model.marksurfaces.len() {
            return Err(format!("Mod_LoadLeafs: bad marksurfaces in leaf {} of {}", i, bsp.name));
        }

        let compressed_vis = if visofs < 0 || model.visdata.is_empty() {
            None
        } else if visofs as usize >= model.visdata.len() {
            com_wprintf(&format!("Mod_LoadLeafs: leaf {} has bad visofs {}\n", i, visofs));
            None
        } else {
            Some(visofs as usize)
        };

        out.push(MLeaf {
            contents,
            minmaxs: read_minmaxs_i16(b, ofs + 8),
            // leaf 0 is the shared solid leaf and has no visibility row
            cluster: i as i32 - 1,
            compressed_vis,
            firstmarksurface,
            nummarksurfaces,
        });
    }
    Ok(out)
}

fn mod_load_nodes(bsp: &BspFile, numleafs: usize) -> Result<Vec<MNode>, String> {
    let (b, count) = bsp.lump(LUMP_NODES, DNODE_SIZE)?;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let ofs = i * DNODE_SIZE;
        let mut children = [NodeChild::Leaf(0); 2];
        for (j, child) in children.iter_mut().enumerate() {
            let c = NodeChild::from_disk(read_i16_le(b, ofs + 4 + j * 2).unwrap_or(-1) as i32);
            let ok = match c {
                // children always follow their parent; this also rules out cycles
                NodeChild::Node(n) => n > i && n < count,
                NodeChild::Leaf(l) => l < numleafs,
            };
            if !ok {
                return Err(format!("Mod_LoadNodes: node {} has a bad child in {}", i, bsp.name));
            }
            *child = c;
        }

        out.push(MNode {
            contents: 0,
            minmaxs: read_minmaxs_i16(b, ofs + 8),
            planenum: read_i32_le(b, ofs).unwrap_or(0),
            children,
            firstsurface: read_u16_le(b, ofs + 20).unwrap_or(0),
            numsurfaces: read_u16_le(b, ofs + 22).unwrap_or(0),
        });
    }
    Ok(out)
}

fn mod_load_submodels(bsp: &BspFile) -> Result<Vec<MModel>, String> {
    let (b, count) = bsp.lump(LUMP_MODELS, DMODEL_SIZE)?;
    if count > MAX_MAP_MODELS {
        return Err(format!("Mod_LoadSubmodels: {} has too many models", bsp.name));
    }

    Ok((0..count)
        .map(|i| {
            let ofs = i * DMODEL_SIZE;
            let mut mins = read_vec3(b, ofs);
            let mut maxs = read_vec3(b, ofs + 12);
            // spread the mins / maxs by a unit
            for j in 0..3 {
                mins[j] -= 1.0;
                maxs[j] += 1.0;
            }
            MModel {
                mins,
                maxs,
                origin: read_vec3(b, ofs + 24),
                headnode: read_i32_le(b, ofs + 36).unwrap_or(0),
                visleafs: read_i32_le(b, ofs + 52).unwrap_or(0),
                firstface: read_i32_le(b, ofs + 56).unwrap_or(0),
                numfaces: read_i32_le(b, ofs + 60).unwrap_or(0),
            }
        })
        .collect())
}

/// Parse a BSP version 30 file into a world model.
pub fn mod_load_brush_model(name: &str, buffer: &[u8]) -> Result<BrushModel, String> {
    let bsp = BspFile::parse(name, buffer)?;

    let mut model = BrushModel {
        name: name.to_string(),
        ..Default::default()
    };

    model.entities = mod_load_entities(&bsp)?;
    model.vertexes = mod_load_vertexes(&bsp)?;
    model.edges = mod_load_edges(&bsp, model.vertexes.len())?;
    model.surfedges = mod_load_surfedges(&bsp, model.edges.len())?;
    model.textures = mod_load_textures(&bsp)?;
    model.texinfo = mod_load_texinfo(&bsp, model.textures.len())?;
    model.surfaces = mod_load_faces(&bsp, &model)?;
    model.marksurfaces = mod_load_marksurfaces(&bsp, model.surfaces.len())?;
    model.visdata = mod_load_visibility(&bsp)?;
    model.leafs = mod_load_leafs(&bsp, &model)?;
    model.nodes = mod_load_nodes(&bsp, model.leafs.len())?;
    model.submodels = mod_load_submodels(&bsp)?;

    // set up the world from submodel 0
    let bm = *model
        .submodels
        .first()
        .ok_or_else(|| format!("Mod_LoadBrushModel: {} has no models", name))?;

    let face_end = bm.firstface.checked_add(bm.numfaces);
    if bm.firstface < 0 || bm.numfaces < 0 || face_end.is_none_or(|end| end as usize > model.surfaces.len()) {
        return Err(format!("Mod_LoadBrushModel: world model has bad faces in {}", name));
    }
    if !model.nodes.is_empty() && (bm.headnode < 0 || bm.headnode as usize >= model.nodes.len()) {
        return Err(format!("Inline model 0 has bad firstnode in {}", name));
    }

    model.firstmodelsurface = bm.firstface as usize;
    model.nummodelsurfaces = bm.numfaces as usize;
    model.mins = bm.mins;
    model.maxs = bm.maxs;

    com_dprintf(&format!(
        "Loaded {}: {} surfaces, {} leafs, {} nodes, {} submodels\n",
        name,
        model.surfaces.len(),
        model.leafs.len(),
        model.nodes.len(),
        model.submodels.len()
    ));

    Ok(model)
}

// ===============================================================
//  Texture registration
// ===============================================================

/// WAD base names listed in worldspawn's `wad` key, in order.
pub fn map_wad_names(entities: &str) -> Vec<String> {
    worldspawn_value(entities, "wad")
        .map(|list| {
            list.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| com_file_base(s).to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Register every texture of `model` and store the handles in it.
/// Embedded textures are named `#<map>:<name>.mip`, WAD textures
/// `<wad>.wad/<name>.mip` for the first listed WAD that contains them.
pub fn mod_register_textures(model: &mut BrushModel, textures: &mut VkTextures, ri: &RefImport) {
    let wads: Vec<(String, HashSet<String>)> = map_wad_names(&model.entities)
        .into_iter()
        .filter_map(|wad| {
            let filename = format!("{}.wad", wad);
            let Some(names) = ri.load_file(&filename).as_deref().and_then(wad_lump_names) else {
                com_dprintf(&format!("Couldn't load {}\n", filename));
                return None;
            };
            let names = names.iter().map(|n| n.to_lowercase()).collect();
            Some((wad, names))
        })
        .collect();

    let mut registered = 0;
    for tex in model.textures.iter_mut().flatten() {
        let name = if tex.embedded {
            Some(format!("#{}:{}.mip", model.name, tex.name))
        } else {
            let key = tex.name.to_lowercase();
            wads.iter()
                .find(|(_, names)| names.contains(&key))
                .map(|(wad, _)| format!("{}.wad/{}.mip", wad, tex.name))
        };

        let Some(name) = name else {
            com_dprintf(&format!("Texture {} not found in any wad\n", tex.name));
            continue;
        };

        if let Some(handle) = textures.register(&name) {
            tex.texnum = handle as i32;
            registered += 1;
        }
    }

    com_printf(&format!("Registered {} textures for {}\n", registered, model.name));
}
