//! Dependency files for build systems

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepFileFormat {
    /// `target: dep dep ...`
    Gcc,
    /// `/showIncludes` style; not implemented yet
    Msvc,
}

impl DepFileFormat {
    /// Fail early for formats that cannot be written
    pub fn ensure_supported(self) -> Result<()> {
        match self {
            DepFileFormat::Gcc => Ok(()),
            DepFileFormat::Msvc => Err(Error::Argument(
                "MSVC dependency files are not supported, use -deps=gcc".to_string(),
            )),
        }
    }
}

/// Path of the dep file that belongs to `target`
pub fn dependency_file_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".d");
    PathBuf::from(name)
}

/// Render a single-rule GCC dep file
pub fn render_gcc(target: &Path, dependencies: &BTreeSet<PathBuf>) -> String {
    let mut out = escape(target);
    out.push(':');
    for dependency in dependencies {
        out.push(' ');
        out.push_str(&escape(dependency));
    }
    out.push('\n');
    out
}

/// Write the dep file for `target` and return its path
pub fn write_dependency_file(
    target: &Path,
    dependencies: &BTreeSet<PathBuf>,
    format: DepFileFormat,
) -> Result<PathBuf> {
    format.ensure_supported()?;
    let path = dependency_file_path(target);
    fs::write(&path, render_gcc(target, dependencies)).map_err(|e| Error::io(&path, e))?;
    log::info!("Wrote {:?} ({} dependencies)", path, dependencies.len());
    Ok(path)
}

fn escape(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(' ', "\\ ")
        .replace('$', "$$")
        .replace('#', "\\#")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcc_rule() {
        let deps = BTreeSet::from([
            PathBuf::from("shaders/common.h"),
            PathBuf::from("shaders/blur.hlsl"),
        ]);
        let text = render_gcc(Path::new("out/Blur_permutations.h"), &deps);
        assert_eq!(
            text,
            "out/Blur_permutations.h: shaders/blur.hlsl shaders/common.h\n"
        );
    }

    #[test]
    fn test_spaces_are_escaped() {
        let deps = BTreeSet::from([PathBuf::from("my shaders/a.h")]);
        let text = render_gcc(Path::new("out.h"), &deps);
        assert_eq!(text, "out.h: my\\ shaders/a.h\n");
    }

    #[test]
    fn test_dep_file_path() {
        assert_eq!(
            dependency_file_path(Path::new("out/Blur_permutations.h")),
            PathBuf::from("out/Blur_permutations.h.d")
        );
    }

    #[test]
    fn test_msvc_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("a.h");
        let err = write_dependency_file(&target, &BTreeSet::new(), DepFileFormat::Msvc)
            .unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
        assert!(!dependency_file_path(&target).exists());
    }
}
