use anyhow::{Context, Result};
use std::path::Path;

pub mod task_store;

pub use task_store::TaskStore;

pub fn init_store(data_dir: &Path, file_name: &str) -> Result<TaskStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let path = data_dir.join(file_name);
    TaskStore::open(&path).with_context(|| format!("Failed to open task store {}", path.display()))
}
