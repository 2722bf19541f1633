// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// vk_model_types.rs — in-memory brush model representation
//
// d* structures are on-disk representations (see xvk_common::qfiles),
// m* structures are in-memory. Cross references are indices into the
// owning BrushModel's arrays instead of raw pointers.

use std::ops::Range;

use xvk_common::q_shared::Vec3;

/// Texture registry handle. 0 is never handed out; it means "no texture".
pub type TexHandle = u32;

// ============================================================================
// BRUSH MODELS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3, // for sounds or lights
    pub headnode: i32,
    pub visleafs: i32, // not including the solid leaf 0
    pub firstface: i32,
    pub numfaces: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MEdge {
    pub v: [u16; 2],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Pixels live in the map file; otherwise the texture comes from a WAD.
    pub embedded: bool,
    /// Registry handle, or -1 while unresolved.
    pub texnum: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MTexInfo {
    pub vecs: [[f32; 4]; 2],
    pub flags: i32,
    /// Index into `BrushModel::textures`; `None` for a missing miptex.
    pub texture: Option<usize>,
}

/// Per-surface data precomputed at load time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceInfo {
    /// Centroid of the surface polygon.
    pub origin: Vec3,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MSurface {
    pub flags: i32,

    pub firstedge: i32, // look up in model->surfedges[], negative numbers
    pub numedges: i32,  // are backwards edges

    pub texinfo: usize,
    pub styles: [u8; 4],

    pub info: Option<SurfaceInfo>,
}

/// A BSP child reference: interior node or leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeChild {
    Node(usize),
    Leaf(usize),
}

impl NodeChild {
    /// Decode an on-disk child number: non-negative is a node,
    /// negative is `-(leaf + 1)`.
    pub fn from_disk(child: i32) -> Self {
        if child >= 0 {
            NodeChild::Node(child as usize)
        } else {
            NodeChild::Leaf((-1 - child) as usize)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MNode {
    // common with leaf
    pub contents: i32, // 0, to differentiate from leafs
    pub minmaxs: [f32; 6], // for bounding box culling

    // node specific
    pub planenum: i32,
    pub children: [NodeChild; 2],

    pub firstsurface: u16,
    pub numsurfaces: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MLeaf {
    // common with node
    pub contents: i32, // will be a negative contents number
    pub minmaxs: [f32; 6],

    // leaf specific
    pub cluster: i32,
    /// Offset of this leaf's run-length encoded row in `BrushModel::visdata`.
    pub compressed_vis: Option<usize>,

    pub firstmarksurface: usize,
    pub nummarksurfaces: usize,
}

// ===================================================================
// Whole model
// ===================================================================

#[derive(Debug, Clone, Default)]
pub struct BrushModel {
    pub name: String,

    // volume occupied by the model graphics
    pub mins: Vec3,
    pub maxs: Vec3,

    pub firstmodelsurface: usize,
    pub nummodelsurfaces: usize,

    pub submodels: Vec<MModel>,
    pub leafs: Vec<MLeaf>,
    pub vertexes: Vec<Vec3>,
    pub edges: Vec<MEdge>,
    pub nodes: Vec<MNode>,
    pub textures: Vec<Option<MTexture>>,
    pub texinfo: Vec<MTexInfo>,
    pub surfaces: Vec<MSurface>,
    pub surfedges: Vec<i32>,
    pub marksurfaces: Vec<usize>,
    pub visdata: Vec<u8>,
    pub entities: String,
}

/// World state shared by every model of the loaded level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldStatic {
    /// Bytes in one decompressed visibility row.
    pub visbytes: usize,
}

impl WorldStatic {
    pub fn for_model(model: &BrushModel) -> Self {
        let visleafs = model.submodels.first().map_or(0, |m| m.visleafs.max(0) as usize);
        Self {
            visbytes: visleafs.div_ceil(8),
        }
    }
}

impl BrushModel {
    /// Surface range of the primary submodel (the static world geometry).
    pub fn model_surfaces(&self) -> Range<usize> {
        let start = self.firstmodelsurface.min(self.surfaces.len());
        let end = (self.firstmodelsurface + self.nummodelsurfaces).min(self.surfaces.len());
        start..end
    }

    pub fn surface_texture(&self, surf: &MSurface) -> Option<&MTexture> {
        let ti = self.texinfo.get(surf.texinfo)?;
        self.textures.get(ti.texture?)?.as_ref()
    }

    /// Registry handle of a surface's texture, -1 if it has none.
    pub fn surface_texnum(&self, surf: &MSurface) -> i32 {
        self.surface_texture(surf).map_or(-1, |t| t.texnum)
    }

    pub fn leaf_surfaces(&self, leaf: &MLeaf) -> &[usize] {
        let start = leaf.firstmarksurface.min(self.marksurfaces.len());
        let end = (leaf.firstmarksurface + leaf.nummarksurfaces).min(self.marksurfaces.len());
        &self.marksurfaces[start..end]
    }

    pub fn leaf_compressed_vis(&self, leaf: &MLeaf) -> Option<&[u8]> {
        leaf.compressed_vis.and_then(|ofs| self.visdata.get(ofs..))
    }

    /// Head of the BSP tree of the primary submodel.
    pub fn root(&self) -> NodeChild {
        if self.nodes.is_empty() {
            NodeChild::Leaf(0)
        } else {
            NodeChild::Node(self.submodels.first().map_or(0, |m| m.headnode.max(0) as usize))
        }
    }
}
