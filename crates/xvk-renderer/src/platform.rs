// platform.rs — engine imports dispatched to the embedding program
//
// The renderer crate cannot depend on xvk-sys (that would be circular),
// so the host hands over a table of callbacks at level-load time.
// Missing callbacks behave as a miss instead of panicking.

use xvk_common::common::com_dprintf;

// ============================================================
// Function pointer type aliases
// ============================================================

/// FS_LoadFile(name) -> contents
pub type LoadFileFn = Box<dyn Fn(&str) -> Option<Vec<u8>> + Send>;

// ============================================================
// Dispatch table
// ============================================================

#[derive(Default)]
pub struct RefImport {
    pub load_file: Option<LoadFileFn>,
}

impl std::fmt::Debug for RefImport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefImport")
            .field("load_file", &self.load_file.is_some())
            .finish()
    }
}

impl RefImport {
    pub fn with_load_file(f: impl Fn(&str) -> Option<Vec<u8>> + Send + 'static) -> Self {
        Self {
            load_file: Some(Box::new(f)),
        }
    }

    // ============================================================
    // Invocation API (called by the level and light loaders)
    // ============================================================

    pub fn load_file(&self, name: &str) -> Option<Vec<u8>> {
        match self.load_file {
            Some(ref f) => f(name),
            None => {
                com_dprintf(&format!("FS_LoadFile: no import registered for {}\n", name));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_load_file_is_miss() {
        let ri = RefImport::default();
        assert!(ri.load_file("rad/lights.rad").is_none());
    }

    #[test]
    fn test_registered_load_file() {
        let ri = RefImport::with_load_file(|name| {
            if name == "rad/lights.rad" {
                Some(b"brick 128\n".to_vec())
            } else {
                None
            }
        });
        assert_eq!(ri.load_file("rad/lights.rad").as_deref(), Some(&b"brick 128\n"[..]));
        assert!(ri.load_file("rad/other.rad").is_none());
    }
}
