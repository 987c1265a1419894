//! Process-wide storage state
//!
//! Every `ConnectionManager` in the process sees the same web store
//! initialization and the same set of open databases, keyed by where the
//! data lives. Databases with no location (in memory) are never shared.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

static WEB_STORES: OnceLock<Mutex<HashMap<PathBuf, Arc<OnceCell<()>>>>> = OnceLock::new();
static OPEN_DATABASES: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

/// Initialization cell for the web store rooted at `root`.
pub(crate) fn web_store_cell(root: Option<PathBuf>) -> Arc<OnceCell<()>> {
    let Some(root) = root else {
        return Arc::new(OnceCell::new());
    };

    let mut stores = WEB_STORES.get_or_init(Default::default).lock();
    Arc::clone(stores.entry(root).or_default())
}

/// Mark the database at `location` open. False if it already is.
pub(crate) fn claim(location: &Path) -> bool {
    OPEN_DATABASES
        .get_or_init(Default::default)
        .lock()
        .insert(location.to_path_buf())
}

pub(crate) fn release(location: &Path) {
    if let Some(open) = OPEN_DATABASES.get() {
        open.lock().remove(location);
    }
}
