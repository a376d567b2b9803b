//! Ordered search roots for tile and grid files.
//!
//! A file name is resolved against each root in turn and the first root that
//! holds an openable copy wins. A root may also hold the tile zipped as
//! `<stem>.zip`; the archive is then extracted next to it on first use.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{GeodemError, Result};

/// Ordered list of directories searched for data files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    roots: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            roots: roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }

    /// Parse a platform path list (`:`-separated on Unix, `;` on Windows).
    /// Empty entries are skipped.
    pub fn from_env_value(value: &OsStr) -> Self {
        Self {
            roots: std::env::split_paths(value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
        }
    }

    /// Read the search path from the environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns [`GeodemError::InvalidConfig`] if the variable is unset or
    /// lists no directory.
    pub fn from_env(var: &str) -> Result<Self> {
        let value = std::env::var_os(var)
            .ok_or_else(|| GeodemError::InvalidConfig(format!("{var} environment variable not set")))?;
        let path = Self::from_env_value(&value);
        if path.roots.is_empty() {
            return Err(GeodemError::InvalidConfig(format!("{var} lists no directory")));
        }
        Ok(path)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Append a root searched after the existing ones.
    pub fn push<P: AsRef<Path>>(&mut self, root: P) {
        self.roots.push(root.as_ref().to_path_buf());
    }

    /// Path of the first openable copy of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GeodemError::FileNotFound`] listing every root searched when
    /// no root holds the file (plain or zipped).
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        for root in &self.roots {
            let candidate = root.join(name);
            if File::open(&candidate).is_ok_and(|f| f.metadata().is_ok_and(|m| m.is_file())) {
                debug!(path = %candidate.display(), "resolved file");
                return Ok(candidate);
            }

            let zip_path = root.join(zip_name(name));
            if zip_path.is_file() {
                match extract_from_zip(&zip_path, name, root) {
                    Ok(path) => return Ok(path),
                    Err(e) => warn!(archive = %zip_path.display(), error = %e, "skipping archive"),
                }
            }
        }

        Err(GeodemError::FileNotFound {
            name: name.to_string(),
            searched: self.roots.clone(),
        })
    }

    /// Lazily list the files in every root whose names match `pattern`.
    ///
    /// Zipped tiles are reported under the name of the file they contain.
    /// A name found in several roots is reported once, from the first root.
    pub fn matching(&self, pattern: &str) -> MatchingFiles {
        MatchingFiles {
            roots: self.roots.clone(),
            next_root: 0,
            entries: None,
            pattern: pattern.to_string(),
            extension: Path::new(pattern)
                .extension()
                .map(|e| e.to_string_lossy().into_owned()),
            seen: HashSet::new(),
        }
    }

    /// All matching files, sorted by name.
    pub fn list_matching(&self, pattern: &str) -> Vec<(String, PathBuf)> {
        let mut files: Vec<_> = self.matching(pattern).collect();
        files.sort();
        files
    }
}

/// Name of the archive a zipped copy of `name` is stored in.
fn zip_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{stem}.zip")
}

/// Extract the entry called `name` from `zip_path` into `out_dir`.
fn extract_from_zip(zip_path: &Path, name: &str, out_dir: &Path) -> Result<PathBuf> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| GeodemError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| GeodemError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let entry_name = Path::new(entry.name())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if entry_name.eq_ignore_ascii_case(name) {
            let out_path = out_dir.join(name);
            let mut out_file = File::create(&out_path)?;
            io::copy(&mut entry, &mut out_file)?;
            debug!(archive = %zip_path.display(), path = %out_path.display(), "extracted tile");
            return Ok(out_path);
        }
    }

    Err(GeodemError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no {} in {}", name, zip_path.display()),
    )))
}

/// Iterator returned by [`SearchPath::matching`].
///
/// Directories are read one at a time as the iterator advances; roots that
/// cannot be read are skipped.
#[derive(Debug)]
pub struct MatchingFiles {
    roots: Vec<PathBuf>,
    next_root: usize,
    entries: Option<fs::ReadDir>,
    pattern: String,
    extension: Option<String>,
    seen: HashSet<String>,
}

impl MatchingFiles {
    /// Canonical file name for a directory entry, if it matches.
    fn canonical_name(&self, file_name: &str) -> Option<String> {
        if wildcard_match(&self.pattern, file_name) {
            return Some(file_name.to_string());
        }
        let stem = file_name.strip_suffix(".zip")?;
        let name = match &self.extension {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        };
        wildcard_match(&self.pattern, &name).then_some(name)
    }
}

impl Iterator for MatchingFiles {
    type Item = (String, PathBuf);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(entries) = self.entries.as_mut() else {
                let root = self.roots.get(self.next_root)?;
                self.next_root += 1;
                self.entries = fs::read_dir(root).ok();
                continue;
            };

            let Some(entry) = entries.next() else {
                self.entries = None;
                continue;
            };
            let Ok(entry) = entry else { continue };
            let file_name = entry.file_name();
            let Some(name) = self.canonical_name(&file_name.to_string_lossy()) else {
                continue;
            };
            if self.seen.insert(name.clone()) {
                return Some((name, entry.path()));
            }
        }
    }
}

/// Shell-style match of `name` against `pattern` (`*` and `?` wildcards,
/// ASCII case-insensitive).
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let n: Vec<char> = name.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut pi, mut ni) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ni));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ni = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
