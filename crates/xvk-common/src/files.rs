// files.rs — virtual filesystem: game directories and id PACK archives

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use rayon::prelude::*;

use crate::common::{com_dprintf, com_printf, com_wprintf};
use crate::qfiles::{
    read_fixed_name, read_i32_le, IDPAKHEADER, MAX_FILES_IN_PACK, PAK_FILE_ENTRY_SIZE,
    PAK_HEADER_SIZE, PAK_NAME_LEN,
};

// ============================================================
// In-memory structures
// ============================================================

/// A file entry within a pack file (in-memory representation).
#[derive(Debug, Clone)]
pub struct PackFile {
    pub name: String,
    pub filepos: u64,
    pub filelen: usize,
}

/// A loaded .pak archive.
#[derive(Debug)]
pub struct Pack {
    pub filename: String,
    pub files: Vec<PackFile>,
    /// lowercase filename -> index in files
    file_index: HashMap<String, usize>,
}

impl Pack {
    pub fn new(filename: String, files: Vec<PackFile>) -> Self {
        let file_index = files
            .iter()
            .enumerate()
            .map(|(i, pf)| (pf.name.to_lowercase(), i))
            .collect();
        Self {
            filename,
            files,
            file_index,
        }
    }

    /// Finds a file by name (case-insensitive).
    #[inline]
    pub fn find_file(&self, filename: &str) -> Option<&PackFile> {
        self.file_index
            .get(&filename.to_lowercase())
            .map(|&idx| &self.files[idx])
    }
}

/// A single element on the search path: either a directory or a pack file.
#[derive(Debug)]
pub struct SearchPath {
    /// Directory path (used when `pack` is `None`).
    pub filename: String,
    pub pack: Option<Pack>,
}

// ============================================================
// Filesystem context
// ============================================================

#[derive(Debug)]
pub struct FsContext {
    /// Current game directory.
    pub gamedir: String,

    /// The search path list. Earlier entries have higher priority.
    pub search_paths: Vec<SearchPath>,

    /// Base directory (default ".").
    pub basedir: String,

    /// Set to true when the last load found the file inside a pak.
    pub file_from_pak: bool,
}

impl Default for FsContext {
    fn default() -> Self {
        Self {
            gamedir: String::new(),
            search_paths: Vec::new(),
            basedir: ".".to_string(),
            file_from_pak: false,
        }
    }
}

impl FsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up the search path: `basedir` itself, then `basedir/game` on top.
    pub fn init(basedir: &str, game: &str) -> Self {
        let mut ctx = Self {
            basedir: basedir.to_string(),
            ..Self::default()
        };
        ctx.add_game_directory(basedir);
        if !game.is_empty() {
            ctx.add_game_directory(&format!("{}/{}", basedir, game));
        }
        ctx
    }

    // ============================================================
    // FS_LoadFile
    // ============================================================

    /// Loads a file into memory. Returns `None` if not found.
    pub fn load_file(&mut self, path: &str) -> Option<Vec<u8>> {
        self.file_from_pak = false;

        for sp in &self.search_paths {
            if let Some(ref pack) = sp.pack {
                if let Some(pf) = pack.find_file(path) {
                    com_dprintf(&format!("PackFile: {} : {}\n", pack.filename, path));
                    let data = Self::read_pack_entry(&pack.filename, pf);
                    self.file_from_pak = data.is_some();
                    return data;
                }
            } else {
                let netpath = format!("{}/{}", sp.filename, path);
                if Path::new(&netpath).is_file() {
                    com_dprintf(&format!("FindFile: {}\n", netpath));
                    return match fs::read(&netpath) {
                        Ok(data) => Some(data),
                        Err(e) => {
                            com_wprintf(&format!("FS_LoadFile: read error on {}: {}\n", netpath, e));
                            None
                        }
                    };
                }
            }
        }

        com_dprintf(&format!("FindFile: can't find {}\n", path));
        None
    }

    fn read_pack_entry(packname: &str, pf: &PackFile) -> Option<Vec<u8>> {
        let mut f = match File::open(packname) {
            Ok(f) => f,
            Err(e) => {
                com_wprintf(&format!("Couldn't reopen {}: {}\n", packname, e));
                return None;
            }
        };
        let mut buf = vec![0u8; pf.filelen];
        let read = f
            .seek(SeekFrom::Start(pf.filepos))
            .and_then(|_| f.read_exact(&mut buf));
        match read {
            Ok(()) => Some(buf),
            Err(e) => {
                com_wprintf(&format!("FS_LoadFile: read error in {}: {}\n", packname, e));
                None
            }
        }
    }

    // ============================================================
    // FS_LoadPackFile
    // ============================================================

    /// Loads a .pak directory, returning a `Pack` on success.
    pub fn load_pack_file(packfile: &str) -> Option<Pack> {
        let data = fs::read(packfile).ok()?;

        if read_i32_le(&data, 0)? != IDPAKHEADER {
            com_wprintf(&format!("{} is not a packfile\n", packfile));
            return None;
        }

        let dirofs = read_i32_le(&data, 4)?.max(0) as usize;
        let dirlen = read_i32_le(&data, 8)?.max(0) as usize;
        let numpackfiles = dirlen / PAK_FILE_ENTRY_SIZE;

        if numpackfiles > MAX_FILES_IN_PACK {
            com_wprintf(&format!("{} has {} files\n", packfile, numpackfiles));
            return None;
        }
        if dirofs < PAK_HEADER_SIZE || dirofs + numpackfiles * PAK_FILE_ENTRY_SIZE > data.len() {
            com_wprintf(&format!("{} has a bad directory\n", packfile));
            return None;
        }

        let mut files = Vec::with_capacity(numpackfiles);
        for i in 0..numpackfiles {
            let ofs = dirofs + i * PAK_FILE_ENTRY_SIZE;
            let name = read_fixed_name(&data, ofs, PAK_NAME_LEN)?;
            let filepos = read_i32_le(&data, ofs + PAK_NAME_LEN)?.max(0) as u64;
            let filelen = read_i32_le(&data, ofs + PAK_NAME_LEN + 4)?.max(0) as usize;
            files.push(PackFile {
                name,
                filepos,
                filelen,
            });
        }

        com_printf(&format!("Added packfile {} ({} files)\n", packfile, numpackfiles));
        Some(Pack::new(packfile.to_string(), files))
    }

    // ============================================================
    // FS_AddGameDirectory
    // ============================================================

    /// Adds a game directory to the search path, loading all .pak files
    /// in it. Pak files take priority over loose files, higher-numbered
    /// paks over lower ones.
    pub fn add_game_directory(&mut self, dir: &str) {
        self.gamedir = dir.to_string();

        self.search_paths.insert(
            0,
            SearchPath {
                filename: dir.to_string(),
                pack: None,
            },
        );

        let mut pakfiles: Vec<String> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("pak"))
                })
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        pakfiles.sort();

        let loaded: Vec<Option<Pack>> = pakfiles
            .par_iter()
            .map(|path| Self::load_pack_file(path))
            .collect();

        // sequential insert keeps priority order deterministic
        for pack in loaded.into_iter().flatten() {
            self.search_paths.insert(
                0,
                SearchPath {
                    filename: String::new(),
                    pack: Some(pack),
                },
            );
        }
    }

    /// Returns the current game directory, or the base directory if not set.
    pub fn gamedir(&self) -> &str {
        if !self.gamedir.is_empty() {
            &self.gamedir
        } else {
            &self.basedir
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("xvk_test_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_pak(path: &Path, entries: &[(&str, &[u8])]) {
        let mut body = Vec::new();
        let mut dir = Vec::new();
        for (name, data) in entries {
            let pos = PAK_HEADER_SIZE + body.len();
            body.extend_from_slice(data);
            let mut entry = [0u8; PAK_FILE_ENTRY_SIZE];
            entry[..name.len()].copy_from_slice(name.as_bytes());
            entry[PAK_NAME_LEN..PAK_NAME_LEN + 4].copy_from_slice(&(pos as i32).to_le_bytes());
            entry[PAK_NAME_LEN + 4..].copy_from_slice(&(data.len() as i32).to_le_bytes());
            dir.extend_from_slice(&entry);
        }
        let mut out = Vec::new();
        out.extend_from_slice(&IDPAKHEADER.to_le_bytes());
        out.extend_from_slice(&((PAK_HEADER_SIZE + body.len()) as i32).to_le_bytes());
        out.extend_from_slice(&(dir.len() as i32).to_le_bytes());
        out.extend_from_slice(&body);
        out.extend_from_slice(&dir);
        fs::write(path, out).unwrap();
    }

    #[test]
    fn test_fs_context_defaults() {
        let ctx = FsContext::new();
        assert_eq!(ctx.basedir, ".");
        assert!(ctx.search_paths.is_empty());
        assert!(!ctx.file_from_pak);
        assert_eq!(ctx.gamedir(), ".");
    }

    #[test]
    fn test_load_loose_file() {
        let dir = test_dir("loose");
        fs::create_dir_all(dir.join("rad")).unwrap();
        fs::write(dir.join("rad/test.rad"), b"brick 128\n").unwrap();

        let mut ctx = FsContext::init(&dir.to_string_lossy(), "");
        assert_eq!(ctx.load_file("rad/test.rad").as_deref(), Some(&b"brick 128\n"[..]));
        assert!(!ctx.file_from_pak);
        assert!(ctx.load_file("rad/missing.rad").is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_game_dir_overrides_base() {
        let dir = test_dir("gamedir");
        fs::create_dir_all(dir.join("mod")).unwrap();
        fs::write(dir.join("a.txt"), b"base").unwrap();
        fs::write(dir.join("mod/a.txt"), b"mod").unwrap();

        let mut ctx = FsContext::init(&dir.to_string_lossy(), "mod");
        assert_eq!(ctx.load_file("a.txt").as_deref(), Some(&b"mod"[..]));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_from_pak() {
        let dir = test_dir("pak");
        write_pak(&dir.join("pak0.pak"), &[("maps/test.bsp", b"BSPDATA"), ("rad/x.rad", b"x 1")]);

        let mut ctx = FsContext::init(&dir.to_string_lossy(), "");
        assert_eq!(ctx.load_file("MAPS/TEST.BSP").as_deref(), Some(&b"BSPDATA"[..]));
        assert!(ctx.file_from_pak);
        assert_eq!(ctx.load_file("rad/x.rad").as_deref(), Some(&b"x 1"[..]));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_not_a_packfile() {
        let dir = test_dir("badpak");
        let path = dir.join("pak0.pak");
        fs::write(&path, b"JUNKJUNKJUNKJUNK").unwrap();
        assert!(FsContext::load_pack_file(&path.to_string_lossy()).is_none());
        let _ = fs::remove_dir_all(&dir);
    }
}
