// platform_register.rs — Register xvk-sys platform callbacks with xvk-renderer
//
// The filesystem lives behind a shared Mutex so the boxed callbacks handed
// to the renderer's import table can reach it.

use std::sync::Arc;

use parking_lot::Mutex;

use xvk_common::files::FsContext;
use xvk_renderer::platform::RefImport;

pub type SharedFs = Arc<Mutex<FsContext>>;

pub fn shared_fs(basedir: &str, game: &str) -> SharedFs {
    Arc::new(Mutex::new(FsContext::init(basedir, game)))
}

/// Build the renderer import table over `fs`.
pub fn platform_imports(fs: &SharedFs) -> RefImport {
    let fs = Arc::clone(fs);
    RefImport::with_load_file(move |name| fs.lock().load_file(name))
}
