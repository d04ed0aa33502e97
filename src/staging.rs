use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn project_file_name(version: &str) -> String {
    format!("project-{version}.json")
}

/// Copy `input` to `<workdir>/project-<version>.json`, replacing any previous
/// file of that name. The copy is byte-for-byte.
pub fn stage_project(input: &Path, workdir: &Path, version: &str) -> Result<PathBuf> {
    if !input.is_file() {
        return Err(anyhow!("input file {} not found", input.display()));
    }
    let dest = workdir.join(project_file_name(version));
    publish_file(input, &dest)?;
    tracing::info!(input = %input.display(), dest = %dest.display(), "staged project file");
    Ok(dest)
}

/// Copy through a sibling temp file so readers never see a half-written file.
/// The temp file is removed on any failure.
pub fn publish_file(source: &Path, dest: &Path) -> Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut reader =
        fs::File::open(source).with_context(|| format!("open {}", source.display()))?;
    let permissions = reader
        .metadata()
        .with_context(|| format!("stat {}", source.display()))?
        .permissions();
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    io::copy(&mut reader, tmp.as_file_mut())
        .with_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
    fs::set_permissions(tmp.path(), permissions)
        .with_context(|| format!("set permissions on {}", dest.display()))?;
    tmp.persist(dest)
        .map_err(|err| err.error)
        .with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}

/// Write pretty JSON (2-space indent, trailing newline) atomically.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value).context("serialize JSON")?;
    bytes.push(b'\n');
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(&bytes)
        .with_context(|| format!("write {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
