//! Volume bindings attached to every container invocation of a task.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Mount mode. Container runtimes get exactly these two options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMode {
    ReadOnly,
    ReadWrite,
}

impl VolumeMode {
    /// Short form used in logs and `-v`-style flags.
    pub fn as_flag(self) -> &'static str {
        match self {
            VolumeMode::ReadOnly => "ro",
            VolumeMode::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for VolumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub local_path: PathBuf,
    pub internal_path: String,
    pub mode: VolumeMode,
}

impl VolumeBinding {
    /// Value of a docker `--mount` flag: `type=bind,source=..,target=..[,readonly]`.
    ///
    /// Keys may contain `:` so the colon-separated `-v` form cannot carry them.
    /// `--mount` is parsed as CSV, so fields holding `,` or `"` are quoted.
    pub fn to_mount_spec(&self) -> String {
        let mut spec = format!(
            "type=bind,{},{}",
            csv_field(&format!("source={}", self.local_path.display())),
            csv_field(&format!("target={}", self.internal_path)),
        );
        if self.mode == VolumeMode::ReadOnly {
            spec.push_str(",readonly");
        }
        spec
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// The mount set for one task, keyed by local path.
///
/// A local path is bound at most once, so it can never be both read-only and
/// read-write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSet {
    bindings: BTreeMap<PathBuf, VolumeBinding>,
}

impl VolumeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        local_path: impl Into<PathBuf>,
        internal_path: impl Into<String>,
        mode: VolumeMode,
    ) -> Result<(), TaskError> {
        let local_path = local_path.into();
        if self.bindings.contains_key(&local_path) {
            return Err(TaskError::StagingConflict(local_path));
        }
        self.bindings.insert(
            local_path.clone(),
            VolumeBinding {
                local_path,
                internal_path: internal_path.into(),
                mode,
            },
        );
        Ok(())
    }

    pub fn get(&self, local_path: &Path) -> Option<&VolumeBinding> {
        self.bindings.get(local_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VolumeBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
