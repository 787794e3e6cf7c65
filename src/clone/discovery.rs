// dbclonetool/src/clone/discovery.rs
//
// The platform does not return the directory a live mount creates, so it is
// found by diffing the mount root before and after the mount. The mount id is
// the second `_` separated token of that directory's name.
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{CloneError, Result};

/// Names of the entries directly under a mount root at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirSnapshot(BTreeSet<String>);

/// The directory created by a completed live mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountResult {
    pub path: PathBuf,
    pub mount_id: String,
}

pub fn snapshot(mount_root: &Path) -> Result<DirSnapshot> {
    let entries = fs::read_dir(mount_root).map_err(|e| {
        CloneError::Mount(format!(
            "Unable to list the mount path {}: {}",
            mount_root.display(),
            e
        ))
    })?;
    let mut names = BTreeSet::new();
    for entry in entries {
        names.insert(entry?.file_name().to_string_lossy().into_owned());
    }
    debug!("Mount path {} holds {} entries", mount_root.display(), names.len());
    Ok(DirSnapshot(names))
}

pub fn mount_id_from_dir_name(dir_name: &str) -> Result<String> {
    match dir_name.split('_').nth(1) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(CloneError::Mount(format!(
            "The live mount directory {} does not carry a mount id",
            dir_name
        ))),
    }
}

/// Exactly one new entry must have appeared between the two snapshots.
pub fn discover_new_mount(
    mount_root: &Path,
    before: &DirSnapshot,
    after: &DirSnapshot,
) -> Result<MountResult> {
    let created: Vec<&String> = after.0.difference(&before.0).collect();
    let dir_name = match created.as_slice() {
        [only] => *only,
        [] => {
            return Err(CloneError::Mount(format!(
                "No new directory was created in {} by the live mount. Live mount directory cannot be determined",
                mount_root.display()
            )));
        }
        many => {
            return Err(CloneError::Mount(format!(
                "Multiple directories were created in {} during this operation ({}). Live mount directory cannot be determined",
                mount_root.display(),
                many.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            )));
        }
    };

    let path = mount_root.join(dir_name);
    info!("Using the live mount path: {}", path.display());
    let mount_id = mount_id_from_dir_name(dir_name)?;
    debug!("Live mount ID is {}", mount_id);
    Ok(MountResult { path, mount_id })
}
