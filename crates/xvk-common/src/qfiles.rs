// qfiles.rs — on-disk file format structures (PAK, WAD3, BSP version 30)
//
// All multi-byte fields are little-endian on disk. Readers decode them with
// the `read_*_le` helpers below rather than transmuting raw bytes.

// ============================================================
// PAK files
// ============================================================

/// PAK file magic: "PACK" in little-endian
pub const IDPAKHEADER: i32 = (b'K' as i32) << 24 | (b'C' as i32) << 16 | (b'A' as i32) << 8 | b'P' as i32;

pub const PAK_HEADER_SIZE: usize = 12; // ident, dirofs, dirlen
pub const PAK_FILE_ENTRY_SIZE: usize = 64; // name[56], filepos, filelen
pub const PAK_NAME_LEN: usize = 56;

pub const MAX_FILES_IN_PACK: usize = 4096;

// ============================================================
// WAD3 texture archives
// ============================================================

/// WAD3 magic: "WAD3" in little-endian
pub const IDWAD3HEADER: i32 = (b'3' as i32) << 24 | (b'D' as i32) << 16 | (b'A' as i32) << 8 | b'W' as i32;

pub const WAD_HEADER_SIZE: usize = 12; // ident, numlumps, infotableofs
pub const WAD_LUMP_INFO_SIZE: usize = 32; // filepos, disksize, size, type, compression, pad1, pad2, name[16]
pub const WAD_LUMP_NAME_OFS: usize = 16;

// ============================================================
// BSP version 30
// ============================================================

pub const BSPVERSION: i32 = 30;

pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_TEXTURES: usize = 2;
pub const LUMP_VERTEXES: usize = 3;
pub const LUMP_VISIBILITY: usize = 4;
pub const LUMP_NODES: usize = 5;
pub const LUMP_TEXINFO: usize = 6;
pub const LUMP_FACES: usize = 7;
pub const LUMP_LIGHTING: usize = 8;
pub const LUMP_CLIPNODES: usize = 9;
pub const LUMP_LEAFS: usize = 10;
pub const LUMP_MARKSURFACES: usize = 11;
pub const LUMP_EDGES: usize = 12;
pub const LUMP_SURFEDGES: usize = 13;
pub const LUMP_MODELS: usize = 14;
pub const HEADER_LUMPS: usize = 15;

/// version + HEADER_LUMPS * (fileofs, filelen)
pub const BSP_HEADER_SIZE: usize = 4 + HEADER_LUMPS * 8;

// on-disk record sizes
pub const DPLANE_SIZE: usize = 20; // normal[3], dist, type
pub const DVERTEX_SIZE: usize = 12; // point[3]
pub const DNODE_SIZE: usize = 24; // planenum, children[2] (i16), mins[3], maxs[3] (i16), firstface, numfaces (u16)
pub const TEXINFO_SIZE: usize = 40; // vecs[2][4], miptex, flags
pub const DFACE_SIZE: usize = 20; // planenum (u16), side (i16), firstedge, numedges (i16), texinfo (i16), styles[4], lightofs
pub const DLEAF_SIZE: usize = 28; // contents, visofs, mins[3], maxs[3] (i16), firstmarksurface, nummarksurfaces (u16), ambient_level[4]
pub const DEDGE_SIZE: usize = 4; // v[2] (u16)
pub const DMODEL_SIZE: usize = 64; // mins[3], maxs[3], origin[3], headnode[4], visleafs, firstface, numfaces
pub const MIPTEX_SIZE: usize = 40; // name[16], width, height, offsets[4]
pub const MIPTEX_NAME_LEN: usize = 16;

pub const MAX_MAP_MODELS: usize = 1024;
pub const MAX_MAP_LEAFS: usize = 32767;
pub const MAX_MAP_SURFEDGES: usize = 512000;

// leaf contents
pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;

// ============================================================
// Lump directory
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
}

// ============================================================
// Little-endian field readers
// ============================================================

/// Read a little-endian `i32` at `ofs`, or `None` past the end of `buf`.
#[inline]
pub fn read_i32_le(buf: &[u8], ofs: usize) -> Option<i32> {
    let b = buf.get(ofs..ofs + 4)?;
    Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[inline]
pub fn read_u32_le(buf: &[u8], ofs: usize) -> Option<u32> {
    let b = buf.get(ofs..ofs + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[inline]
pub fn read_i16_le(buf: &[u8], ofs: usize) -> Option<i16> {
    let b = buf.get(ofs..ofs + 2)?;
    Some(i16::from_le_bytes([b[0], b[1]]))
}

#[inline]
pub fn read_u16_le(buf: &[u8], ofs: usize) -> Option<u16> {
    let b = buf.get(ofs..ofs + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

#[inline]
pub fn read_f32_le(buf: &[u8], ofs: usize) -> Option<f32> {
    read_u32_le(buf, ofs).map(f32::from_bits)
}

/// Decode a fixed-size NUL-padded name field.
pub fn read_fixed_name(buf: &[u8], ofs: usize, len: usize) -> Option<String> {
    let b = buf.get(ofs..ofs + len)?;
    let end = b.iter().position(|&c| c == 0).unwrap_or(len);
    Some(String::from_utf8_lossy(&b[..end]).into_owned())
}
