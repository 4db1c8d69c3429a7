//! Snapshot reading

use super::LoadReport;
use crate::registry::Registry;
use crate::{Error, Result};
use ndarray::Array1;
use safetensors::tensor::Dtype;
use safetensors::SafeTensors;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

impl Registry {
    /// Load variable values from the configured snapshot file.
    ///
    /// A missing file is benign: the report's `missing_file` flag is set and
    /// nothing else happens. A file that exists but cannot be parsed is an
    /// error ([`Error::CorruptSnapshot`]); stale entries and per-entry
    /// assignment failures are collected in the report instead of aborting
    /// the rest of the snapshot.
    pub fn load(&self) -> Result<LoadReport> {
        let path = self.snapshot_path().to_path_buf();
        self.load_from(&path)
    }

    /// Load from an explicit path.
    pub fn load_from(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        let mut report = LoadReport::default();

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                report.missing_file = true;
                tracing::debug!(path = %path.display(), "no snapshot to load");
                return Ok(report);
            }
            Err(err) => return Err(err.into()),
        };

        let snapshot = SafeTensors::deserialize(&data).map_err(|e| Error::CorruptSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        for name in snapshot.names() {
            let view = match snapshot.tensor(name) {
                Ok(view) => view,
                Err(err) => {
                    report.failed.push((name.to_string(), err.to_string()));
                    continue;
                }
            };
            let full = format!("{}/{}", self.identifier(), name);
            let Some(var) = self.graph().variable(&full) else {
                report.stale.push(name.to_string());
                continue;
            };
            if view.dtype() != Dtype::F32 {
                report
                    .failed
                    .push((name.to_string(), format!("unsupported dtype {:?}", view.dtype())));
                continue;
            }
            let values: &[f32] = bytemuck::cast_slice(view.data());
            match var.assign(Array1::from_vec(values.to_vec())) {
                Ok(()) => report.restored += 1,
                Err(err) => report.failed.push((name.to_string(), err.to_string())),
            }
        }

        if !report.stale.is_empty() || !report.failed.is_empty() {
            tracing::warn!(
                path = %path.display(),
                stale = report.stale.len(),
                failed = report.failed.len(),
                "snapshot loaded with leftovers"
            );
        }
        tracing::debug!(
            path = %path.display(),
            restored = report.restored,
            "snapshot loaded"
        );
        Ok(report)
    }

    /// Seed this registry's variables from another instance's snapshot file.
    pub fn transfer_from(&self, source: impl AsRef<Path>) -> Result<LoadReport> {
        self.load_from(source)
    }
}
