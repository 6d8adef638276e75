use log::debug;
use std::collections::HashSet;
use uuid::Uuid;

use crate::model::{ImageRef, LocalFile, VariantRow};

const PREVIEW_SCHEME: &str = "blob:variant-preview/";

/// Live local preview handles. Every handle created must eventually be
/// released: on replace, on remove, when its row is dropped, and at teardown.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: HashSet<String>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, file: &LocalFile) -> String {
        let url = format!("{}{}", PREVIEW_SCHEME, Uuid::new_v4());
        debug!("Created preview {} for {} ({} bytes)", url, file.file_name, file.size());
        self.live.insert(url.clone());
        url
    }

    /// Returns false when the handle was not live
    pub fn release(&mut self, url: &str) -> bool {
        let released = self.live.remove(url);
        if released {
            debug!("Released preview {}", url);
        }
        released
    }

    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        if count > 0 {
            debug!("Releasing {} outstanding previews", count);
        }
        self.live.clear();
        count
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live.contains(url)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

/// Per-row photo bookkeeping. Purely local: nothing here talks to the backend;
/// removals of stored images are collected for the next submission.
#[derive(Debug, Default)]
pub struct ImageStager {
    previews: PreviewRegistry,
    removed: Vec<String>,
}

impl ImageStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a local file on `row`, replacing whatever image it had. A stored
    /// image being replaced is not queued for removal; the upload supersedes it.
    pub fn attach_local(&mut self, row: &mut VariantRow, file: LocalFile) -> String {
        self.release_row(row);
        let preview_url = self.previews.create(&file);
        row.image = Some(ImageRef::Pending {
            file,
            preview_url: preview_url.clone(),
        });
        preview_url
    }

    /// Clear `row`'s image. A stored image's remote path is queued so the
    /// backend can delete it.
    pub fn remove(&mut self, row: &mut VariantRow) {
        self.release_row(row);
        if let Some(ImageRef::Stored { remote_path, .. }) = row.image.take() {
            if !self.removed.contains(&remote_path) {
                debug!("Queued stored image {} for removal", remote_path);
                self.removed.push(remote_path);
            }
        }
    }

    /// Release resources held by a row that is leaving the row set. Stored
    /// images of dropped rows are not queued for removal.
    pub fn release_row(&mut self, row: &VariantRow) {
        if let Some(url) = row.image.as_ref().and_then(|i| i.preview_url()) {
            self.previews.release(url);
        }
    }

    pub fn removed_paths(&self) -> &[String] {
        &self.removed
    }

    pub fn clear_removed(&mut self) {
        self.removed.clear();
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn release_all(&mut self) -> usize {
        self.previews.release_all()
    }
}
