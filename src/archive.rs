//! Source staging, metadata and archive creation.
//!
//! The final pipeline stages: copy the application source into the staging
//! tree (minus build artifacts, VCS metadata, OS droppings and bytecode
//! caches), record the package metadata, then package the whole staging tree
//! into the requested format. Archives are written to a partial name and
//! renamed on success so a failed run never leaves a half-written artifact
//! behind.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use wax::Pattern;
use flate2::Compression;
use flate2::write::GzEncoder;
use walkdir::WalkDir;

use crate::error::{Result, SkilletError};
use crate::ident::PackageInfo;
use crate::log::Log;

/// File and directory name patterns never copied into the staging tree
pub const SOURCE_EXCLUDES: &[&str] = &[
    "dist",
    ".git*",
    ".hg",
    ".svn",
    ".DS_Store",
    "*.pyc",
    "__pycache__",
];

/// Supported build artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchiveFormat {
    #[value(name = "tar.gz")]
    TarGz,
    #[value(name = "tgz")]
    Tgz,
    #[value(name = "tar")]
    Tar,
    #[value(name = "zip")]
    Zip,
    /// Plain directory under the output dir instead of an archive file
    #[value(name = "dir")]
    Dir,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Tgz => "tgz",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Dir => "",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Dir => f.write_str("dir"),
            other => f.write_str(other.extension()),
        }
    }
}

fn archive_err(message: impl Into<String>) -> SkilletError {
    SkilletError::ArchiveFailed {
        message: message.into(),
    }
}

fn build_exclusion_globs() -> Result<Vec<wax::Glob<'static>>> {
    SOURCE_EXCLUDES
        .iter()
        .map(|pattern| {
            wax::Glob::new(pattern)
                .map_err(|e| archive_err(format!("bad exclusion pattern {pattern}: {e}")))
        })
        .collect()
}

fn is_excluded(entry: &walkdir::DirEntry, globs: &[wax::Glob<'_>]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    globs.iter().any(|glob| glob.is_match(name.as_ref()))
}

/// Copy the application source into `<scratchpad>/src`
pub fn copy_source(project: &Path, scratchpad: &Path, log: &Log) -> Result<()> {
    let dest = scratchpad.join("src");
    log.info(format!(
        "Copying source {} to distribution",
        project.display()
    ));

    let globs = build_exclusion_globs()?;
    let walker = WalkDir::new(project)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, &globs));

    for entry in walker {
        let entry = entry.map_err(|e| archive_err(format!("cannot walk source tree: {e}")))?;
        let rel = entry
            .path()
            .strip_prefix(project)
            .map_err(|e| archive_err(format!("cannot relativize source path: {e}")))?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| archive_err(format!("cannot create {}: {}", target.display(), e)))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| {
                archive_err(format!(
                    "cannot copy {} to {}: {}",
                    entry.path().display(),
                    target.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

/// Record the package metadata inside the staging tree
pub fn write_meta(scratchpad: &Path, info: &PackageInfo) -> Result<()> {
    let json = serde_json::to_string_pretty(info)
        .map_err(|e| archive_err(format!("cannot serialize package info: {e}")))?;
    fs::write(scratchpad.join("info.json"), json)
        .map_err(|e| archive_err(format!("cannot write info.json: {e}")))
}

/// Package the staging tree into the requested format under the output dir
pub fn create_archive(
    scratchpad: &Path,
    info: &PackageInfo,
    format: ArchiveFormat,
    output_dir: &Path,
    log: &Log,
) -> Result<PathBuf> {
    log.info("Creating distribution archive");
    fs::create_dir_all(output_dir)
        .map_err(|e| archive_err(format!("cannot create {}: {}", output_dir.display(), e)))?;

    if format == ArchiveFormat::Dir {
        let dest = output_dir.join(&info.ident);
        if dest.exists() {
            fs::remove_dir_all(&dest)
                .map_err(|e| archive_err(format!("cannot replace {}: {}", dest.display(), e)))?;
        }
        copy_dir(scratchpad, &dest)?;
        return Ok(dest);
    }

    let file_name = format!("{}.{}", info.ident, format.extension());
    let final_path = output_dir.join(&file_name);
    let partial_path = output_dir.join(format!(".{file_name}.partial"));

    let written = match format {
        ArchiveFormat::TarGz | ArchiveFormat::Tgz => write_tar(scratchpad, &partial_path, true),
        ArchiveFormat::Tar => write_tar(scratchpad, &partial_path, false),
        ArchiveFormat::Zip => write_zip(scratchpad, &partial_path),
        ArchiveFormat::Dir => unreachable!("handled above"),
    };

    if let Err(e) = written {
        let _ = fs::remove_file(&partial_path);
        return Err(e);
    }

    fs::rename(&partial_path, &final_path).map_err(|e| {
        let _ = fs::remove_file(&partial_path);
        archive_err(format!("cannot finalize {}: {}", final_path.display(), e))
    })?;

    Ok(final_path)
}

/// Log completion; the build is done once the artifact is in place
pub fn finalize(artifact: &Path, elapsed: Duration, log: &Log) {
    log.info(format!(
        "Created {} in {:.1}s",
        artifact.display(),
        elapsed.as_secs_f64()
    ));
}

fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| archive_err(format!("cannot walk {}: {}", src.display(), e)))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| archive_err(format!("cannot relativize path: {e}")))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| archive_err(format!("cannot create {}: {}", target.display(), e)))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .map_err(|e| archive_err(format!("cannot copy {}: {}", target.display(), e)))?;
        }
    }
    Ok(())
}

fn sorted_entries(root: &Path) -> Result<Vec<walkdir::DirEntry>> {
    WalkDir::new(root)
        .sort_by(|a, b| a.path().cmp(b.path()))
        .into_iter()
        .filter(|entry| {
            entry
                .as_ref()
                .map(|e| e.path() != root)
                .unwrap_or(true)
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| archive_err(format!("cannot walk staging tree: {e}")))
}

fn write_tar(scratchpad: &Path, dest: &Path, gzip: bool) -> Result<()> {
    let map_io = |e: io::Error| archive_err(format!("cannot write {}: {}", dest.display(), e));

    let file = File::create(dest).map_err(map_io)?;
    if gzip {
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append_tree(&mut builder, scratchpad)?;
        let mut writer = builder
            .into_inner()
            .map_err(map_io)?
            .finish()
            .map_err(map_io)?;
        writer.flush().map_err(map_io)
    } else {
        let mut builder = tar::Builder::new(BufWriter::new(file));
        append_tree(&mut builder, scratchpad)?;
        let mut writer = builder.into_inner().map_err(map_io)?;
        writer.flush().map_err(map_io)
    }
}

fn append_tree<W: Write>(builder: &mut tar::Builder<W>, root: &Path) -> Result<()> {
    builder.follow_symlinks(false);
    for entry in sorted_entries(root)? {
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .map_err(|e| archive_err(format!("cannot relativize path: {e}")))?;
        let appended = if entry.file_type().is_dir() {
            builder.append_dir(rel, path)
        } else if entry.file_type().is_file() {
            builder.append_path_with_name(path, rel)
        } else {
            continue;
        };
        appended.map_err(|e| archive_err(format!("cannot archive {}: {}", path.display(), e)))?;
    }
    Ok(())
}

fn write_zip(scratchpad: &Path, dest: &Path) -> Result<()> {
    let map_io = |e: io::Error| archive_err(format!("cannot write {}: {}", dest.display(), e));

    let file = File::create(dest).map_err(map_io)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));

    for entry in sorted_entries(scratchpad)? {
        let path = entry.path();
        let rel = path
            .strip_prefix(scratchpad)
            .map_err(|e| archive_err(format!("cannot relativize path: {e}")))?;
        let rel_name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{rel_name}/"), zip::write::SimpleFileOptions::default())
                .map_err(|e| archive_err(format!("cannot add directory {rel_name}: {e}")))?;
        } else if entry.file_type().is_file() {
            let mut options = zip::write::SimpleFileOptions::default();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(metadata) = entry.metadata() {
                    options = options.unix_permissions(metadata.permissions().mode());
                }
            }
            writer
                .start_file(rel_name.as_str(), options)
                .map_err(|e| archive_err(format!("cannot add {rel_name}: {e}")))?;
            let mut reader = BufReader::new(File::open(path).map_err(map_io)?);
            io::copy(&mut reader, &mut writer).map_err(map_io)?;
        }
    }

    let mut inner = writer
        .finish()
        .map_err(|e| archive_err(format!("cannot finish zip: {e}")))?;
    inner.flush().map_err(map_io)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_info() -> PackageInfo {
        PackageInfo::new("webapp", "1.0", "linux-x86_64")
    }

    fn make_staging(root: &Path) -> PathBuf {
        let scratchpad = root.join("staging");
        fs::create_dir_all(scratchpad.join("data")).unwrap();
        fs::create_dir_all(scratchpad.join("src")).unwrap();
        fs::write(scratchpad.join("data/virtualenv.py"), "py").unwrap();
        fs::write(scratchpad.join("src/app.py"), "app").unwrap();
        fs::write(scratchpad.join("install.sh"), "#!/bin/bash\n").unwrap();
        scratchpad
    }

    fn make_project(root: &Path) -> PathBuf {
        let project = root.join("project");
        fs::create_dir_all(project.join("webapp")).unwrap();
        fs::create_dir_all(project.join(".git")).unwrap();
        fs::create_dir_all(project.join("dist")).unwrap();
        fs::create_dir_all(project.join("webapp/__pycache__")).unwrap();
        fs::write(project.join("setup.py"), "setup()").unwrap();
        fs::write(project.join("webapp/__init__.py"), "").unwrap();
        fs::write(project.join("webapp/app.pyc"), "bytecode").unwrap();
        fs::write(project.join(".gitignore"), "dist").unwrap();
        fs::write(project.join(".git/HEAD"), "ref").unwrap();
        fs::write(project.join(".DS_Store"), "junk").unwrap();
        fs::write(project.join("dist/old.tar.gz"), "stale").unwrap();
        project
    }

    #[test]
    fn test_copy_source_applies_exclusions() {
        let temp = TempDir::new().unwrap();
        let project = make_project(temp.path());
        let scratchpad = temp.path().join("staging");
        fs::create_dir_all(&scratchpad).unwrap();

        copy_source(&project, &scratchpad, &Log::new(false)).unwrap();

        let src = scratchpad.join("src");
        assert!(src.join("setup.py").exists());
        assert!(src.join("webapp/__init__.py").exists());
        assert!(!src.join(".git").exists());
        assert!(!src.join(".gitignore").exists());
        assert!(!src.join(".DS_Store").exists());
        assert!(!src.join("dist").exists());
        assert!(!src.join("webapp/app.pyc").exists());
        assert!(!src.join("webapp/__pycache__").exists());
    }

    #[test]
    fn test_write_meta() {
        let temp = TempDir::new().unwrap();
        write_meta(temp.path(), &sample_info()).unwrap();
        let raw = fs::read_to_string(temp.path().join("info.json")).unwrap();
        let back: PackageInfo = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, sample_info());
    }

    #[test]
    fn test_create_tar_gz_archive() {
        let temp = TempDir::new().unwrap();
        let scratchpad = make_staging(temp.path());
        let output = temp.path().join("dist");

        let artifact = create_archive(
            &scratchpad,
            &sample_info(),
            ArchiveFormat::TarGz,
            &output,
            &Log::new(false),
        )
        .unwrap();

        assert_eq!(
            artifact.file_name().unwrap().to_string_lossy(),
            "webapp-1.0-linux-x86_64.tar.gz"
        );

        // Readable and rooted at the staging tree's own entries
        let file = File::open(&artifact).unwrap();
        let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
        let names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"install.sh".to_string()));
        assert!(names.contains(&"data/virtualenv.py".to_string()));
        assert!(names.contains(&"src/app.py".to_string()));

        // No partial file left behind
        assert!(!output.join(".webapp-1.0-linux-x86_64.tar.gz.partial").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_tar_preserves_installer_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let scratchpad = make_staging(temp.path());
        fs::set_permissions(
            scratchpad.join("install.sh"),
            fs::Permissions::from_mode(0o755),
        )
        .unwrap();

        let artifact = create_archive(
            &scratchpad,
            &sample_info(),
            ArchiveFormat::Tar,
            &temp.path().join("dist"),
            &Log::new(false),
        )
        .unwrap();

        let file = File::open(&artifact).unwrap();
        let mut tar = tar::Archive::new(file);
        let mode = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap())
            .find(|e| e.path().unwrap().to_string_lossy() == "install.sh")
            .map(|e| e.header().mode().unwrap())
            .unwrap();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_create_zip_archive() {
        let temp = TempDir::new().unwrap();
        let scratchpad = make_staging(temp.path());

        let artifact = create_archive(
            &scratchpad,
            &sample_info(),
            ArchiveFormat::Zip,
            &temp.path().join("dist"),
            &Log::new(false),
        )
        .unwrap();

        let file = File::open(&artifact).unwrap();
        let mut archive = zip::ZipArchive::new(BufReader::new(file)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"install.sh".to_string()));
        assert!(names.contains(&"src/app.py".to_string()));
    }

    #[test]
    fn test_create_dir_artifact() {
        let temp = TempDir::new().unwrap();
        let scratchpad = make_staging(temp.path());

        let artifact = create_archive(
            &scratchpad,
            &sample_info(),
            ArchiveFormat::Dir,
            &temp.path().join("dist"),
            &Log::new(false),
        )
        .unwrap();

        assert!(artifact.ends_with("webapp-1.0-linux-x86_64"));
        assert!(artifact.join("install.sh").exists());
        assert!(artifact.join("data/virtualenv.py").exists());
    }

    #[test]
    fn test_format_extensions() {
        assert_eq!(ArchiveFormat::TarGz.extension(), "tar.gz");
        assert_eq!(ArchiveFormat::Tgz.extension(), "tgz");
        assert_eq!(ArchiveFormat::Tar.extension(), "tar");
        assert_eq!(ArchiveFormat::Zip.extension(), "zip");
    }
}
