//! Snapshot writing

use super::{SaveReport, SkipReason, SNAPSHOT_VERSION};
use crate::registry::Registry;
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

impl Registry {
    /// Save every initialized owned variable to the configured snapshot
    /// file.
    pub fn save(&self) -> Result<SaveReport> {
        let path = self.snapshot_path().to_path_buf();
        self.save_to(&path)
    }

    /// Save to an explicit path.
    ///
    /// The whole snapshot is serialized first and written atomically: a
    /// temporary file in the target directory is renamed over the
    /// destination, so a crash mid-save never leaves a partial snapshot.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<SaveReport> {
        let path = path.as_ref();
        let mut report = SaveReport::default();

        let mut entries: Vec<(String, Vec<u8>, Vec<usize>)> = Vec::new();
        for var in self.owned_variables() {
            let Some(relative) = self.relative_name(var.name()) else {
                continue;
            };
            if !var.is_initialized() {
                report
                    .skipped
                    .push((relative.to_string(), SkipReason::Uninitialized));
                continue;
            }
            match var.read() {
                Ok(value) => {
                    let values = value.to_vec();
                    let bytes: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
                    entries.push((relative.to_string(), bytes, vec![var.size()]));
                }
                Err(err) => {
                    report
                        .skipped
                        .push((relative.to_string(), SkipReason::ReadFailed(err.to_string())));
                }
            }
        }

        let views: Vec<(&str, TensorView<'_>)> = entries
            .iter()
            .map(|(name, bytes, shape)| {
                let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                    .map_err(|e| Error::Serialization(format!("tensor view for {name}: {e}")))?;
                Ok((name.as_str(), view))
            })
            .collect::<Result<_>>()?;

        let mut metadata = HashMap::new();
        metadata.insert("identifier".to_string(), self.identifier().to_string());
        metadata.insert("saved_at".to_string(), chrono::Utc::now().to_rfc3339());
        metadata.insert("format_version".to_string(), SNAPSHOT_VERSION.to_string());

        let bytes = safetensors::serialize(views, &Some(metadata))
            .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidArgument(format!("bad snapshot path {path:?}")))?;
        let tmp = path.with_file_name(format!("{file_name}.tmp"));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;

        report.written = entries.len();
        tracing::debug!(
            path = %path.display(),
            written = report.written,
            skipped = report.skipped.len(),
            "snapshot saved"
        );
        Ok(report)
    }
}
