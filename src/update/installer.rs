use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use super::Installer;
use crate::error::{Result, UpdateError};

/// Extracts zip archives over the installation directory, keeping the
/// archive's internal layout and overwriting existing files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipInstaller;

impl Installer for ZipInstaller {
    fn install(&self, archive_path: &Path, target_dir: &Path) -> Result<()> {
        fs::create_dir_all(target_dir).map_err(|e| UpdateError::io(target_dir, e))?;

        let file =
            File::open(archive_path).map_err(|e| UpdateError::corrupt_archive(archive_path, e))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| UpdateError::corrupt_archive(archive_path, e))?;

        let mut written = 0usize;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| UpdateError::corrupt_archive(archive_path, e))?;

            let Some(relative) = entry.enclosed_name() else {
                warn!(entry = entry.name(), "skipping archive entry outside the target");
                continue;
            };
            let out_path = target_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| UpdateError::io(&out_path, e))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| UpdateError::io(parent, e))?;
            }

            make_writable(&out_path)?;
            let mut out = File::create(&out_path).map_err(|e| UpdateError::io(&out_path, e))?;
            copy_entry(&mut entry, &mut out, archive_path, &out_path)?;
            written += 1;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    // owner-write stays on so the next update can overwrite
                    fs::set_permissions(&out_path, fs::Permissions::from_mode(mode | 0o200))
                        .map_err(|e| UpdateError::io(&out_path, e))?;
                }
            }
        }

        debug!(files = written, target = %target_dir.display(), "archive extracted");
        Ok(())
    }
}

/// Clear the read-only flag on an already installed file before replacing it
fn make_writable(path: &Path) -> Result<()> {
    let Ok(metadata) = fs::metadata(path) else {
        return Ok(());
    };
    let mut perms = metadata.permissions();
    if !perms.readonly() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    perms.set_readonly(false);
    fs::set_permissions(path, perms).map_err(|e| UpdateError::io(path, e))
}

/// Stream one entry to disk, blaming decode faults on the archive and
/// write faults on the destination.
fn copy_entry(
    entry: &mut impl Read,
    out: &mut impl Write,
    archive_path: &Path,
    out_path: &Path,
) -> Result<()> {
    let mut buffer = [0u8; 8192];
    loop {
        let n = match entry.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(UpdateError::corrupt_archive(archive_path, e)),
        };
        out.write_all(&buffer[..n])
            .map_err(|e| UpdateError::io(out_path, e))?;
    }
    out.flush().map_err(|e| UpdateError::io(out_path, e))
}
