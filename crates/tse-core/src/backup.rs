use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Zip a save file (or a whole save directory) into a timestamped archive
/// next to it, before the original is overwritten. Non-destructive.
pub fn zip_backup(target: &Path) -> io::Result<PathBuf> {
    if !target.exists() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "nothing to back up"));
    }
    let parent = target.parent().unwrap_or(Path::new("."));
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("save");
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let dest = parent.join(format!("{}_{}.zip", stem, ts));

    let file = fs::File::create(&dest)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    if target.is_file() {
        let name = target
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("save.sav");
        zip.start_file(name, options)?;
        zip.write_all(&fs::read(target)?)?;
    } else {
        for entry in WalkDir::new(target) {
            let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
            let path = entry.path();
            let rel = path.strip_prefix(target).map_err(io::Error::other)?;
            if rel.as_os_str().is_empty() {
                continue;
            }
            let name = rel.to_string_lossy().replace('\\', "/");
            if path.is_dir() {
                zip.add_directory(name, options)?;
            } else {
                zip.start_file(name, options)?;
                zip.write_all(&fs::read(path)?)?;
            }
        }
    }
    zip.finish()?;
    Ok(dest)
}
