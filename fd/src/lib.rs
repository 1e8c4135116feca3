//! FileDriver - reference file-backed storage collaborator
//!
//! Stores every task snapshot in one JSON-array file, rewritten in full on
//! each mutation behind an exclusive advisory lock. Fine for the low task
//! counts this engine targets; not designed for high write volume.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use eyre::{Context, Result};
use fs2::FileExt;
use tracing::{debug, info};

use taskengine::{Storage, TaskSnapshot};

/// Stores task snapshots in a local JSON file
#[derive(Debug)]
pub struct FileDriver {
    path: PathBuf,
}

impl FileDriver {
    /// Open or create the task file at the given path.
    ///
    /// Missing or empty files are bootstrapped to an empty task list.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create task file directory")?;
        }

        let driver = Self { path };
        let needs_bootstrap = match fs::metadata(&driver.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if needs_bootstrap {
            let mut file = driver.open_locked()?;
            write_tasks(&mut file, &[])?;
            info!(path = %driver.path.display(), "initialized empty task file");
        }

        Ok(driver)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point lookup of a single snapshot by task ID
    pub fn load_task(&self, id: &str) -> Result<Option<TaskSnapshot>> {
        let mut file = self.open_locked()?;
        let tasks = read_tasks(&mut file)?;
        Ok(tasks.into_iter().find(|t| t.id == id))
    }

    // The advisory lock is released when the handle is dropped (closed).
    fn open_locked(&self) -> Result<fs::File> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .context(format!("Failed to open task file: {}", self.path.display()))?;
        file.lock_exclusive().context("Failed to lock task file")?;
        Ok(file)
    }
}

fn read_tasks(file: &mut fs::File) -> Result<Vec<TaskSnapshot>> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut contents).context("Failed to read task file")?;

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents).context("Malformed task file")
}

fn write_tasks(file: &mut fs::File, tasks: &[TaskSnapshot]) -> Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    serde_json::to_writer(&mut *file, tasks).context("Failed to write task file")?;
    file.write_all(b"\n")?;
    Ok(())
}

#[async_trait]
impl Storage for FileDriver {
    async fn save_task(&self, snapshot: &TaskSnapshot) -> Result<()> {
        let mut file = self.open_locked()?;
        let mut tasks = read_tasks(&mut file)?;

        match tasks.iter_mut().find(|t| t.id == snapshot.id) {
            Some(existing) => *existing = snapshot.clone(),
            None => tasks.push(snapshot.clone()),
        }

        write_tasks(&mut file, &tasks)?;
        debug!(task_id = %snapshot.id, status = %snapshot.status, "saved task snapshot");
        Ok(())
    }

    async fn remove_task(&self, id: &str) -> Result<()> {
        let mut file = self.open_locked()?;
        let mut tasks = read_tasks(&mut file)?;

        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            // Removing a nonexistent ID is not an error.
            return Ok(());
        }

        write_tasks(&mut file, &tasks)?;
        debug!(task_id = %id, "removed task snapshot");
        Ok(())
    }

    async fn load_tasks(&self) -> Result<Vec<TaskSnapshot>> {
        let mut file = self.open_locked()?;
        read_tasks(&mut file)
    }
}
