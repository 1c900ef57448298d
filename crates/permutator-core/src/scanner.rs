//! Textual usage scan over a shader and its `#include` closure
//!
//! The scan is not preprocessor-aware: a macro name counts as used if it
//! occurs anywhere in the text, comments and inactive branches included.
//! A false positive only costs a missed speculative duplicate, because
//! content-hash deduplication still collapses identical binaries.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::option::OptionSet;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*([<"])([^>"\r\n]+)[>"]"#)
        .unwrap_or_else(|e| panic!("include pattern must compile: {e}"))
});

/// Outcome of a usage scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageReport {
    /// Files read before the scan stopped
    pub files_scanned: usize,
    /// Whether the scan stopped because every option was resolved
    pub stopped_early: bool,
}

/// Resolves includes against a list of search paths
#[derive(Debug, Clone, Default)]
pub struct UsageScanner {
    include_paths: Vec<PathBuf>,
}

impl UsageScanner {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    /// Set `found_in_shader` on every option whose name occurs in the
    /// source or any file it includes
    pub fn scan(&self, source: &Path, options: &mut OptionSet) -> Result<UsageReport> {
        for option in options.options_mut() {
            option.found_in_shader = false;
        }
        let mut report = UsageReport::default();
        if options.is_empty() {
            return Ok(report);
        }

        let mut remaining = options.len();
        self.walk(source, |_, text| {
            report.files_scanned += 1;
            for option in options.options_mut() {
                if !option.found_in_shader && text.contains(option.name.as_str()) {
                    option.found_in_shader = true;
                    remaining -= 1;
                }
            }
            if remaining == 0 {
                report.stopped_early = true;
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        log::debug!(
            "Usage scan of {:?}: {} file(s), {} of {} option(s) found",
            source,
            report.files_scanned,
            options.len() - remaining,
            options.len()
        );
        Ok(report)
    }

    /// Every file reachable from `source` through `#include`, source included
    pub fn include_closure(&self, source: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut files = BTreeSet::new();
        self.walk(source, |path, _| {
            files.insert(path.to_path_buf());
            ControlFlow::Continue(())
        })?;
        Ok(files)
    }

    /// Depth-first walk of the include graph. The root must be readable;
    /// includes that cannot be resolved or read are skipped, the compiler
    /// reports them properly.
    fn walk<F>(&self, source: &Path, mut visit: F) -> Result<()>
    where
        F: FnMut(&Path, &str) -> ControlFlow<()>,
    {
        let root = normalize(source);
        let text = fs::read_to_string(&root).map_err(|e| Error::io(&root, e))?;

        let mut visited: HashSet<PathBuf> = HashSet::new();
        visited.insert(root.clone());
        let mut stack = vec![(root, text)];

        while let Some((path, text)) = stack.pop() {
            if visit(&path, &text).is_break() {
                break;
            }
            let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
            // Reverse so the first include in the file is visited first
            let includes: Vec<_> = INCLUDE_RE.captures_iter(&text).collect();
            for caps in includes.into_iter().rev() {
                let quoted = &caps[1] == "\"";
                let Some(resolved) = self.resolve(&caps[2], quoted.then_some(parent.as_path()))
                else {
                    log::debug!("Unresolved include '{}' in {:?}", &caps[2], path);
                    continue;
                };
                if !visited.insert(resolved.clone()) {
                    continue;
                }
                match fs::read_to_string(&resolved) {
                    Ok(included) => stack.push((resolved, included)),
                    Err(e) => log::debug!("Skipping unreadable include {:?}: {}", resolved, e),
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str, including_dir: Option<&Path>) -> Option<PathBuf> {
        including_dir
            .into_iter()
            .chain(self.include_paths.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .map(|found| normalize(&found))
    }
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::ShaderOption;
    use tempfile::TempDir;

    fn options(names: &[&str]) -> OptionSet {
        OptionSet::new(
            names
                .iter()
                .map(|n| ShaderOption::parse(&format!("{n}={{0,1}}")).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_finds_macros_in_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("main.hlsl");
        fs::write(&source, "#if USE_BLOOM\nfloat4 main() : SV_Target { return 0; }\n#endif\n")
            .unwrap();

        let mut set = options(&["USE_BLOOM", "USE_FOG"]);
        let report = UsageScanner::default().scan(&source, &mut set).unwrap();
        assert!(set.options()[0].found_in_shader);
        assert!(!set.options()[1].found_in_shader);
        assert_eq!(report.files_scanned, 1);
        assert!(!report.stopped_early);
    }

    #[test]
    fn test_follows_quoted_and_search_path_includes() {
        let dir = TempDir::new().unwrap();
        let shared = dir.path().join("shared");
        fs::create_dir_all(&shared).unwrap();
        fs::write(dir.path().join("local.h"), "#include <common.h>\n").unwrap();
        fs::write(shared.join("common.h"), "#define X USE_FOG\n").unwrap();
        let source = dir.path().join("main.hlsl");
        fs::write(&source, "#include \"local.h\"\n").unwrap();

        let mut set = options(&["USE_FOG"]);
        let scanner = UsageScanner::new(vec![shared.clone()]);
        let report = scanner.scan(&source, &mut set).unwrap();
        assert!(set.options()[0].found_in_shader);
        assert!(report.stopped_early);

        let closure = scanner.include_closure(&source).unwrap();
        assert_eq!(closure.len(), 3);
        assert!(closure.contains(&normalize(&shared.join("common.h"))));
    }

    #[test]
    fn test_angle_include_ignores_local_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("only_local.h"), "USE_FOG\n").unwrap();
        let source = dir.path().join("main.hlsl");
        fs::write(&source, "#include <only_local.h>\n").unwrap();

        let mut set = options(&["USE_FOG"]);
        UsageScanner::default().scan(&source, &mut set).unwrap();
        assert!(!set.options()[0].found_in_shader);
    }

    #[test]
    fn test_include_cycles_terminate() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.h"), "#include \"b.h\"\n").unwrap();
        fs::write(dir.path().join("b.h"), "#include \"a.h\"\n").unwrap();
        let source = dir.path().join("main.hlsl");
        fs::write(&source, "#include \"a.h\"\n").unwrap();

        let closure = UsageScanner::default().include_closure(&source).unwrap();
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn test_missing_include_is_skipped() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("main.hlsl");
        fs::write(&source, "#include \"missing.h\"\nUSE_FOG\n").unwrap();

        let mut set = options(&["USE_FOG"]);
        UsageScanner::default().scan(&source, &mut set).unwrap();
        assert!(set.options()[0].found_in_shader);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut set = options(&["A"]);
        let err = UsageScanner::default()
            .scan(&dir.path().join("nope.hlsl"), &mut set)
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_comment_mention_counts_as_found() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("main.hlsl");
        fs::write(&source, "// USE_FOG is not wired up yet\n").unwrap();

        let mut set = options(&["USE_FOG"]);
        UsageScanner::default().scan(&source, &mut set).unwrap();
        assert!(set.options()[0].found_in_shader);
    }
}
