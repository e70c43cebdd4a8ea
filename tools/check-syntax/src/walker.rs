use crate::config::Configuration;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Roots and filters for a full scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub roots: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub ignore_patterns: BTreeSet<String>,
}

impl ScanRequest {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            roots: config.run_on().to_vec(),
            extensions: config.extensions().to_vec(),
            ignore_patterns: config.ignore_patterns().clone(),
        }
    }

    /// Extension and ignore filtering, shared with file-context providers.
    ///
    /// `path` is already in `./<relative>` form (see [`relative_form`]).
    pub fn is_selected(&self, path: &Path) -> bool {
        has_extension(path, &self.extensions)
            && !is_ignored(&normalize(path), &self.ignore_patterns)
    }

    /// Filtering for a file found under `root`. The root's own path never
    /// takes part in ignore matching.
    fn is_selected_under(&self, root: &Path, path: &Path) -> bool {
        has_extension(path, &self.extensions)
            && !is_ignored(&relative_form(root, path), &self.ignore_patterns)
    }
}

/// Render a path with `/` separators.
pub fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// `path` relative to `root`, rendered as `./<relative>`: the form ignore
/// patterns match against, so `/vendor/` also catches a top-level `vendor`.
pub fn relative_form(root: &Path, path: &Path) -> String {
    let relative = normalize(path.strip_prefix(root).unwrap_or(path));
    if relative.is_empty() {
        ".".to_string()
    } else {
        format!("./{relative}")
    }
}

/// True when any ignore fragment occurs anywhere in the normalized path.
pub fn is_ignored<'a, I>(normalized: &str, patterns: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    patterns
        .into_iter()
        .any(|pattern| normalized.contains(pattern.as_str()))
}

/// Case-sensitive suffix match of the file name against `.{ext}`.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    extensions.iter().any(|ext| {
        name.len() > ext.len() + 1
            && name.ends_with(ext.as_str())
            && name[..name.len() - ext.len()].ends_with('.')
    })
}

/// Collect every selected regular file under each root of the request.
///
/// The result is sorted and free of duplicates from overlapping roots. A
/// missing or unreadable root fails the whole scan.
pub fn collect_files(request: &ScanRequest) -> Result<Vec<PathBuf>> {
    let mut files: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for root in &request.roots {
        if !root.exists() {
            return Err(Error::MissingRoot { root: root.clone() });
        }

        let walk = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                // Every descendant of an ignored directory is ignored too.
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let dir = format!("{}/", relative_form(root, entry.path()));
                !is_ignored(&dir, &request.ignore_patterns)
            });

        for entry in walk {
            let entry = entry.map_err(|source| Error::Traversal {
                root: root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if request.is_selected_under(root, path) {
                files
                    .entry(dedupe_key(path))
                    .or_insert_with(|| path.to_path_buf());
            }
        }
    }

    tracing::debug!(count = files.len(), "full scan selected files");
    Ok(files.into_values().collect())
}

fn dedupe_key(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use std::fs;

    fn request(root: &Path, extensions: &[&str], ignore: &[&str]) -> ScanRequest {
        let config = Configuration::from_raw(RawConfig {
            run_on: Some(vec![root.to_string_lossy().to_string()]),
            extensions: Some(extensions.iter().map(|s| s.to_string()).collect()),
            ignore_patterns: Some(ignore.iter().map(|s| s.to_string()).collect()),
            ..RawConfig::default()
        })
        .unwrap();
        ScanRequest::from_config(&config)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<?php\n").unwrap();
    }

    // --- has_extension ---

    #[test]
    fn extension_requires_dot_boundary() {
        let exts = vec!["php".to_string()];
        assert!(has_extension(Path::new("a.php"), &exts));
        assert!(!has_extension(Path::new("aphp"), &exts));
        assert!(!has_extension(Path::new("a.xphp.txt"), &exts));
        assert!(!has_extension(Path::new(".php"), &exts));
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let exts = vec!["php".to_string()];
        assert!(!has_extension(Path::new("a.PHP"), &exts));
        assert!(!has_extension(Path::new("a.txt"), &exts));
    }

    #[test]
    fn multi_part_names_match_last_suffix() {
        let exts = vec!["install".to_string(), "module".to_string()];
        assert!(has_extension(Path::new("foo.install"), &exts));
        assert!(has_extension(Path::new("foo.bar.module"), &exts));
    }

    // --- is_ignored ---

    #[test]
    fn ignore_is_substring_match() {
        let patterns = vec!["/vendor/".to_string(), "modules/contrib".to_string()];
        assert!(is_ignored("./vendor/a.php", &patterns));
        assert!(is_ignored("web/modules/contrib/x/x.module", &patterns));
        assert!(!is_ignored("vendor.php", &patterns));
        assert!(!is_ignored("src/a.php", &patterns));
    }

    // --- collect_files ---

    #[test]
    fn scan_filters_extension_and_ignore() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("good.php"));
        touch(&root.join("notes.txt"));
        touch(&root.join("sub/lib.inc"));
        touch(&root.join("vendor/pkg/dep.php"));

        let files = collect_files(&request(root, &["php", "inc"], &["/vendor/"])).unwrap();
        assert_eq!(files, vec![root.join("good.php"), root.join("sub/lib.inc")]);
    }

    #[test]
    fn scan_output_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["c.php", "a.php", "b/z.php", "b/a.php"] {
            touch(&root.join(name));
        }
        let files = collect_files(&request(root, &["php"], &[])).unwrap();
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn duplicate_ignore_pattern_does_not_change_selection() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("good.php"));
        touch(&root.join("bad.php"));

        let once = collect_files(&request(root, &["php"], &["bad.php"])).unwrap();
        let twice = collect_files(&request(root, &["php"], &["bad.php", "bad.php"])).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, vec![root.join("good.php")]);
    }

    #[test]
    fn overlapping_roots_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("src/a.php"));

        let config = Configuration::from_raw(RawConfig {
            run_on: Some(vec![
                root.to_string_lossy().to_string(),
                root.join("src").to_string_lossy().to_string(),
            ]),
            extensions: Some(vec!["php".into()]),
            ignore_patterns: Some(vec![]),
            ..RawConfig::default()
        })
        .unwrap();
        assert_eq!(
            collect_files(&ScanRequest::from_config(&config)).unwrap(),
            vec![root.join("src/a.php")]
        );
    }

    #[test]
    fn root_path_does_not_take_part_in_ignore_matching() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("srv/core/app");
        touch(&root.join("src/bad.php"));
        touch(&root.join("vendor/pkg/dep.php"));

        let config = Configuration::from_raw(RawConfig {
            run_on: Some(vec![root.to_string_lossy().to_string()]),
            extensions: Some(vec!["php".into()]),
            ..RawConfig::default()
        })
        .unwrap();
        let files = collect_files(&ScanRequest::from_config(&config)).unwrap();
        assert_eq!(files, vec![root.join("src/bad.php")]);
    }

    #[test]
    fn relative_form_is_anchored_at_root() {
        let root = Path::new("/srv/core/app");
        assert_eq!(relative_form(root, Path::new("/srv/core/app/src/a.php")), "./src/a.php");
        assert_eq!(relative_form(root, root), ".");
        assert_eq!(relative_form(Path::new("."), Path::new("./vendor/x.php")), "./vendor/x.php");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = collect_files(&request(&missing, &["php"], &[])).unwrap_err();
        assert!(matches!(err, Error::MissingRoot { .. }));
    }
}
