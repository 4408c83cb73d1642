// src/system/writer.rs

//! Persists a render output.
//!
//! Conflicts are checked for every file before anything is written. If a
//! write fails half way, files created so far are removed and overwritten
//! files get their previous content back.

use crate::core::paths;
use crate::core::tree_renderer::RenderOutput;
use crate::system::storage::{Storage, StorageError};
use log::{debug, error, info, warn};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Refusing to overwrite existing file(s): {}. Use --allow-overwriting (-o) to overwrite.", .0.join(", "))]
    Conflicts(Vec<String>),

    #[error("Failed to write '{path}': {source}. {rolled_back} change(s) were rolled back.")]
    Failed {
        path: String,
        #[source]
        source: StorageError,
        rolled_back: usize,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub allow_overwriting: bool,
    /// Plan the writes without touching the storage.
    pub dry_run: bool,
}

/// What was (or, in a dry run, would be) written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub created: Vec<String>,
    pub overwritten: Vec<String>,
    pub dry_run: bool,
}

impl WriteReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.overwritten.len()
    }
}

/// A change already applied, kept so it can be undone.
#[derive(Debug)]
enum Applied {
    Created(String),
    Overwritten { path: String, previous: String },
}

/// Writes every file of `output` through `storage`.
pub fn save_render_output(
    storage: &dyn Storage,
    output: &RenderOutput,
    options: WriteOptions,
) -> Result<WriteReport, WriteError> {
    let existing: Vec<String> = output
        .keys()
        .filter(|path| storage.exists(path))
        .cloned()
        .collect();

    if !existing.is_empty() && !options.allow_overwriting {
        return Err(WriteError::Conflicts(existing));
    }

    let mut report = WriteReport {
        dry_run: options.dry_run,
        ..Default::default()
    };
    for path in output.keys() {
        if existing.contains(path) {
            report.overwritten.push(path.clone());
        } else {
            report.created.push(path.clone());
        }
    }

    if options.dry_run {
        info!("Dry run: {} file(s) would be written", report.total());
        return Ok(report);
    }

    let mut applied: Vec<Applied> = Vec::with_capacity(output.len());
    for (path, content) in output {
        if let Err(source) = write_one(storage, path, content, &mut applied) {
            error!("Writing '{}' failed, rolling back", path);
            let rolled_back = rollback(storage, applied);
            return Err(WriteError::Failed {
                path: path.clone(),
                source,
                rolled_back,
            });
        }
    }

    info!("Wrote {} file(s)", report.total());
    Ok(report)
}

fn write_one(
    storage: &dyn Storage,
    path: &str,
    content: &str,
    applied: &mut Vec<Applied>,
) -> Result<(), StorageError> {
    let previous = if storage.exists(path) {
        Some(storage.read(path)?)
    } else {
        None
    };

    storage.create_dir(&paths::dirname(path))?;
    storage.write(path, content)?;
    debug!("Wrote '{}'", path);

    applied.push(match previous {
        Some(previous) => Applied::Overwritten {
            path: path.to_string(),
            previous,
        },
        None => Applied::Created(path.to_string()),
    });
    Ok(())
}

/// Undoes `applied` in reverse order; returns how many changes were undone.
fn rollback(storage: &dyn Storage, applied: Vec<Applied>) -> usize {
    let mut undone = 0;
    for change in applied.into_iter().rev() {
        let result = match &change {
            Applied::Created(path) => storage.remove(path),
            Applied::Overwritten { path, previous } => storage.write(path, previous),
        };
        match result {
            Ok(()) => undone += 1,
            Err(e) => warn!("Rollback of {:?} failed: {}", change, e),
        }
    }
    undone
}
