// vk_bsp_dump.rs — BSP tree export as a graphviz digraph, for debugging
// emissive surface placement
//
// Uses its own PVS buffer and only reads the model and material table.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::vk_model_types::{BrushModel, MLeaf, NodeChild, WorldStatic};
use crate::vk_pvs::{check_vis_bit, PvsBuffer};
use crate::vk_rad::EmissiveTextureTable;
use xvk_common::common::com_dprintf;

struct Traversal<'a, W: Write> {
    map: &'a BrushModel,
    world: &'a WorldStatic,
    table: &'a EmissiveTextureTable,
    pvs: PvsBuffer,
    pvs_edges: bool,
    visited: Vec<bool>,
    f: W,
}

impl<W: Write> Traversal<'_, W> {
    fn is_emissive(&self, surf_index: usize) -> bool {
        self.map
            .surfaces
            .get(surf_index)
            .is_some_and(|s| self.table.get(self.map.surface_texnum(s)).is_some())
    }

    fn visit_leaf(&mut self, leaf: &MLeaf, parent_index: i64) -> io::Result<()> {
        if leaf.cluster < 0 {
            return Ok(());
        }

        writeln!(self.f, "\"N{}\" -> \"L{}\"", parent_index, leaf.cluster)?;

        let mut num_emissive = 0;
        for &surf_index in self.map.leaf_surfaces(leaf) {
            let emissive = self.is_emissive(surf_index);
            if emissive {
                num_emissive += 1;
            }
            writeln!(
                self.f,
                "L{} -> S{} [color=\"#{}\"; dir=\"none\"];",
                leaf.cluster,
                surf_index,
                if emissive { "ff0000ff" } else { "00000040" }
            )?;
        }

        let visdata = self
            .pvs
            .decompress(self.map.leaf_compressed_vis(leaf), self.world.visbytes)
            .map_err(io::Error::other)?;

        let mut pvs_count = 0;
        for other in &self.map.leafs {
            if !check_vis_bit(visdata, other.cluster) {
                continue;
            }
            pvs_count += 1;
            if self.pvs_edges && other.cluster != leaf.cluster {
                writeln!(
                    self.f,
                    "\"L{}\" -> \"L{}\" [style=dotted; constraint=false];",
                    leaf.cluster, other.cluster
                )?;
            }
        }

        writeln!(
            self.f,
            "\"L{}\" [label=\"Leaf cluster {}\\npvs_count: {}\\nnummarksurfaces: {}\\nnum_emissive: {}\"; style=filled; fillcolor=\"{}\"; ];",
            leaf.cluster,
            leaf.cluster,
            pvs_count,
            leaf.nummarksurfaces,
            num_emissive,
            if num_emissive > 0 { "red" } else { "transparent" }
        )
    }

    fn visit(&mut self, child: NodeChild, parent_index: i64) -> io::Result<()> {
        match child {
            NodeChild::Leaf(l) => {
                let map = self.map;
                match map.leafs.get(l) {
                    Some(leaf) => self.visit_leaf(leaf, parent_index),
                    None => Ok(()),
                }
            }
            NodeChild::Node(n) => {
                let Some(node) = self.map.nodes.get(n) else {
                    return Ok(());
                };
                if std::mem::replace(&mut self.visited[n], true) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("node {} is reached twice in {}", n, self.map.name),
                    ));
                }
                writeln!(self.f, "\"N{}\" -> \"N{}\"", parent_index, n)?;
                writeln!(
                    self.f,
                    "\"N{}\" [label=\"numsurfaces: {}\\nfirstsurface: {}\"];",
                    n, node.numsurfaces, node.firstsurface
                )?;
                let children = node.children;
                self.visit(children[0], n as i64)?;
                self.visit(children[1], n as i64)
            }
        }
    }

    fn write_surfaces(&mut self) -> io::Result<()> {
        writeln!(
            self.f,
            "subgraph surfaces {{rank = max; style= filled; color = lightgray;"
        )?;
        for (i, surf) in self.map.surfaces.iter().enumerate() {
            let name = self.map.surface_texture(surf).map_or("NULL", |t| t.name.as_str());
            writeln!(
                self.f,
                "S{} [rank=\"max\"; label=\"S{}\\ntexture: {}\\nnumedges: {}\\ntexture_num={}\"; style=filled; fillcolor=\"{}\";];",
                i,
                i,
                name,
                surf.numedges,
                self.map.surface_texnum(surf),
                if self.is_emissive(i) { "red" } else { "transparent" }
            )?;
        }
        writeln!(self.f, "}}")
    }
}

/// Write the BSP graph of `map` to `f`. With `pvs_edges`, each leaf also
/// links to every leaf in its PVS.
pub fn write_bsp_dot<W: Write>(
    f: W,
    map: &BrushModel,
    world: &WorldStatic,
    table: &EmissiveTextureTable,
    pvs_edges: bool,
) -> io::Result<()> {
    let mut t = Traversal {
        map,
        world,
        table,
        pvs: PvsBuffer::new(),
        pvs_edges,
        visited: vec![false; map.nodes.len()],
        f,
    };

    writeln!(t.f, "digraph bsp {{ node [shape=box];")?;
    t.visit(map.root(), -1)?;
    t.write_surfaces()?;
    writeln!(t.f, "}}")?;
    t.f.flush()
}

/// Write the BSP graph to `path`.
pub fn traverse_bsp(
    map: &BrushModel,
    world: &WorldStatic,
    table: &EmissiveTextureTable,
    path: &str,
    pvs_edges: bool,
) -> io::Result<()> {
    dump_leaves(map, world);
    let f = BufWriter::new(File::create(path)?);
    write_bsp_dot(f, map, world, table, pvs_edges)?;
    com_dprintf(&format!("Wrote BSP graph to {}\n", path));
    Ok(())
}

/// Developer listing of every leaf and the leafs in its PVS.
pub fn dump_leaves(map: &BrushModel, world: &WorldStatic) {
    let mut pvs = PvsBuffer::new();

    com_dprintf(&format!("visbytes={} leafs: {}:\n", world.visbytes, map.leafs.len()));
    for (i, leaf) in map.leafs.iter().enumerate() {
        com_dprintf(&format!(
            "  {}: contents={} numsurfaces={} cluster={}\n",
            i, leaf.contents, leaf.nummarksurfaces, leaf.cluster
        ));

        let Ok(visdata) = pvs.decompress(map.leaf_compressed_vis(leaf), world.visbytes) else {
            continue;
        };
        let visible: Vec<String> = map
            .leafs
            .iter()
            .enumerate()
            .filter(|(_, other)| check_vis_bit(visdata, other.cluster))
            .map(|(j, _)| j.to_string())
            .collect();
        com_dprintf(&format!("    PVS: {} TOTAL: {}\n", visible.join(" "), visible.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vk_model::mod_load_brush_model;
    use crate::vk_model::tests::{build_test_bsp, test_imports};
    use crate::vk_model::mod_register_textures;
    use crate::vk_textures::{TextureRegistry, VkTextures};

    fn dump(pvs_edges: bool, emissive: bool) -> String {
        let mut map = mod_load_brush_model("maps/test.bsp", &build_test_bsp()).unwrap();
        let mut textures = VkTextures::new();
        mod_register_textures(&mut map, &mut textures, &test_imports());

        let mut table = EmissiveTextureTable::new();
        if emissive {
            let h = textures.find_texture("#maps/test.bsp:~LIGHT1.mip").unwrap();
            table.set(h, [1.0; 3]);
        }

        let mut out = Vec::new();
        write_bsp_dot(&mut out, &map, &WorldStatic::for_model(&map), &table, pvs_edges).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_graph_structure() {
        let dot = dump(false, true);
        assert!(dot.starts_with("digraph bsp { node [shape=box];\n"));
        assert!(dot.ends_with("}\n}\n"));
        assert!(dot.contains("\"N-1\" -> \"N0\"\n"));
        assert!(dot.contains("\"N0\" [label=\"numsurfaces: 2\\nfirstsurface: 0\"];"));
        assert!(dot.contains("\"N0\" -> \"L0\"\n"));
        assert!(dot.contains("\"N0\" -> \"L1\"\n"));
    }

    #[test]
    fn test_emissive_coloring() {
        let dot = dump(false, true);
        assert!(dot.contains("L0 -> S0 [color=\"#ff0000ff\"; dir=\"none\"];"));
        assert!(dot.contains("L0 -> S1 [color=\"#00000040\"; dir=\"none\"];"));
        assert!(dot.contains("L1 -> S1 [color=\"#00000040\"; dir=\"none\"];"));
        assert!(dot.contains("num_emissive: 1\"; style=filled; fillcolor=\"red\""));
        assert!(dot.contains("num_emissive: 0\"; style=filled; fillcolor=\"transparent\""));
        assert!(dot.contains("S0 [rank=\"max\"; label=\"S0\\ntexture: ~LIGHT1\\nnumedges: 4\\ntexture_num=1\"; style=filled; fillcolor=\"red\";];"));
        assert!(dot.contains("label=\"S1\\ntexture: BRICK"));

        let plain = dump(false, false);
        assert!(!plain.contains("fillcolor=\"red\""));
    }

    #[test]
    fn test_pvs_counts_and_edges() {
        let dot = dump(false, false);
        // leaf 1 sees clusters 0 and 1, leaf 2 only cluster 1
        assert!(dot.contains("Leaf cluster 0\\npvs_count: 2"));
        assert!(dot.contains("Leaf cluster 1\\npvs_count: 1"));
        assert!(!dot.contains("style=dotted"));

        let dot = dump(true, false);
        assert!(dot.contains("\"L0\" -> \"L1\" [style=dotted; constraint=false];"));
        assert!(!dot.contains("\"L1\" -> \"L0\" [style=dotted"));
    }

    #[test]
    fn test_node_cycle_is_an_error() {
        let mut map = mod_load_brush_model("maps/test.bsp", &build_test_bsp()).unwrap();
        map.nodes[0].children[0] = NodeChild::Node(0);
        let mut out = Vec::new();
        let err = write_bsp_dot(&mut out, &map, &WorldStatic::for_model(&map), &EmissiveTextureTable::new(), false)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_traverse_bsp_writes_file() {
        let map = mod_load_brush_model("maps/test.bsp", &build_test_bsp()).unwrap();
        let path = std::env::temp_dir().join(format!("xvk_test_bsp_{}.dot", std::process::id()));
        let path = path.to_string_lossy().into_owned();
        traverse_bsp(&map, &WorldStatic::for_model(&map), &EmissiveTextureTable::new(), &path, false).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("digraph bsp"));
        let _ = std::fs::remove_file(&path);
    }
}
