// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Path Matcher
//!
//! Applies one file input's globs, depth limit, and blacklists. A
//! configured path is one of three forms:
//!
//! - **Plain**: `/var/log/*.log`: a literal directory plus a file
//!   pattern; subdirectories are searched to `max_dir_search_depth`
//! - **Wildcard**: `/srv/*/app/log/*.log`: the static prefix before the
//!   first wildcard component is computed; directories under it match the
//!   directory pattern, exploration bounded by the pattern depth plus the
//!   configured extra depth
//! - **Recursive**: `/srv/**/log/*.log`: full sub-tree match
//!
//! A file is excluded iff any of the three independent blacklists matches:
//! absolute directory paths, wildcarded directory paths, file-name
//! patterns.

use glob::Pattern;
use std::path::{Component, Path, PathBuf};

use logship_domain::entities::FileInputConfig;
use logship_domain::AgentError;

#[derive(Debug)]
enum PathForm {
    Plain {
        dir: PathBuf,
        file: Pattern,
    },
    Wildcard {
        prefix: PathBuf,
        dir_pattern: Pattern,
        dir_depth: usize,
        file: Pattern,
    },
    Recursive {
        prefix: PathBuf,
        full_pattern: Pattern,
    },
}

/// Matcher for one file input.
#[derive(Debug)]
pub struct PathMatcher {
    forms: Vec<PathForm>,
    exclude_dirs: Vec<PathBuf>,
    exclude_dir_patterns: Vec<Pattern>,
    exclude_file_patterns: Vec<Pattern>,
    max_depth: usize,
}

fn match_opts() -> glob::MatchOptions {
    glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

fn has_wildcard(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

/// Number of path components below `base`.
fn depth_below(base: &Path, path: &Path) -> Option<usize> {
    path.strip_prefix(base).ok().map(|rel| rel.components().count())
}

impl PathMatcher {
    /// Builds a matcher from a file input config, possibly rebased onto a
    /// container rootfs origin.
    pub fn from_config(config: &FileInputConfig, rebase: Option<&Path>) -> Result<Self, AgentError> {
        let mut forms = Vec::new();
        for raw in &config.file_paths {
            let raw = match rebase {
                Some(root) => format!("{}{raw}", root.display()),
                None => raw.clone(),
            };
            forms.push(Self::classify(&raw)?);
        }

        let compile = |patterns: &[String]| -> Result<Vec<Pattern>, AgentError> {
            patterns
                .iter()
                .map(|p| {
                    Pattern::new(p)
                        .map_err(|e| AgentError::invalid_config(format!("bad exclude pattern '{p}': {e}")))
                })
                .collect()
        };

        Ok(Self {
            forms,
            exclude_dirs: config.exclude_dirs.iter().map(PathBuf::from).collect(),
            exclude_dir_patterns: compile(&config.exclude_dir_patterns)?,
            exclude_file_patterns: compile(&config.exclude_file_patterns)?,
            max_depth: config.max_dir_search_depth,
        })
    }

    fn classify(raw: &str) -> Result<PathForm, AgentError> {
        let path = Path::new(raw);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AgentError::invalid_config(format!("path '{raw}' has no file component")))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("/"));
        let dir_str = dir.to_string_lossy();

        if dir_str.contains("**") {
            let prefix = static_prefix(dir);
            let full_pattern = Pattern::new(raw)
                .map_err(|e| AgentError::invalid_config(format!("bad path pattern '{raw}': {e}")))?;
            return Ok(PathForm::Recursive { prefix, full_pattern });
        }

        let dir_has_wildcard = dir
            .components()
            .any(|c| matches!(c, Component::Normal(n) if has_wildcard(&n.to_string_lossy())));
        let file = Pattern::new(file_name)
            .map_err(|e| AgentError::invalid_config(format!("bad file pattern '{file_name}': {e}")))?;

        if dir_has_wildcard {
            let prefix = static_prefix(dir);
            let dir_depth = dir.components().count();
            let dir_pattern = Pattern::new(&dir_str)
                .map_err(|e| AgentError::invalid_config(format!("bad dir pattern '{dir_str}': {e}")))?;
            Ok(PathForm::Wildcard {
                prefix,
                dir_pattern,
                dir_depth,
                file,
            })
        } else {
            Ok(PathForm::Plain {
                dir: dir.to_path_buf(),
                file,
            })
        }
    }

    /// The static search origins of this matcher (watch/scan roots).
    pub fn search_origins(&self) -> Vec<PathBuf> {
        self.forms
            .iter()
            .map(|form| match form {
                PathForm::Plain { dir, .. } => dir.clone(),
                PathForm::Wildcard { prefix, .. } => prefix.clone(),
                PathForm::Recursive { prefix, .. } => prefix.clone(),
            })
            .collect()
    }

    /// Whether `dir` is worth watching/descending into for this matcher.
    pub fn dir_in_scope(&self, dir: &Path) -> bool {
        if self.is_dir_excluded(dir) {
            return false;
        }
        self.forms.iter().any(|form| match form {
            PathForm::Plain { dir: base, .. } => match depth_below(base, dir) {
                Some(depth) => depth <= self.max_depth,
                None => false,
            },
            PathForm::Wildcard {
                prefix, dir_depth, ..
            } => match depth_below(prefix, dir) {
                Some(_) => dir.components().count() <= dir_depth + self.max_depth,
                None => false,
            },
            PathForm::Recursive { prefix, .. } => dir.starts_with(prefix),
        })
    }

    /// Whether `path` (a file) is collected by this matcher.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.is_dir_excluded(parent) || self.is_file_excluded(name) {
            return false;
        }

        self.forms.iter().any(|form| match form {
            PathForm::Plain { dir, file } => {
                depth_below(dir, parent).is_some_and(|d| d <= self.max_depth) && file.matches(name)
            }
            PathForm::Wildcard {
                prefix,
                dir_pattern,
                dir_depth,
                file,
            } => {
                parent.starts_with(prefix)
                    && parent.components().count() <= dir_depth + self.max_depth
                    && dir_pattern.matches_path_with(parent, match_opts())
                    && file.matches(name)
            }
            PathForm::Recursive { prefix, full_pattern } => {
                path.starts_with(prefix) && full_pattern.matches_path_with(path, match_opts())
            }
        })
    }

    fn is_dir_excluded(&self, dir: &Path) -> bool {
        self.exclude_dirs.iter().any(|ex| dir.starts_with(ex))
            || self
                .exclude_dir_patterns
                .iter()
                .any(|p| p.matches_path_with(dir, match_opts()))
    }

    fn is_file_excluded(&self, name: &str) -> bool {
        self.exclude_file_patterns.iter().any(|p| p.matches(name))
    }
}

/// Longest leading run of literal components.
fn static_prefix(dir: &Path) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in dir.components() {
        match component {
            Component::Normal(n) if has_wildcard(&n.to_string_lossy()) => break,
            other => prefix.push(other.as_os_str()),
        }
    }
    if prefix.as_os_str().is_empty() {
        PathBuf::from("/")
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config(paths: &[&str]) -> FileInputConfig {
        FileInputConfig {
            file_paths: paths.iter().map(|s| s.to_string()).collect(),
            max_dir_search_depth: 0,
            exclude_dirs: vec![],
            exclude_dir_patterns: vec![],
            exclude_file_patterns: vec![],
            allow_root_collection: false,
            allow_multi_config: false,
            encoding: Default::default(),
            multiline: Default::default(),
            close_unused_reader_interval_sec: 3600,
            enable_log_position_meta: false,
            adhoc: false,
            enable_container_discovery: false,
            external_k8s_label_tag: BTreeMap::new(),
            external_env_tag: BTreeMap::new(),
            tick_interval_ms: 1000,
        }
    }

    #[test]
    fn test_plain_form_matches_only_within_depth() {
        let mut cfg = config(&["/var/log/*.log"]);
        cfg.max_dir_search_depth = 1;
        let matcher = PathMatcher::from_config(&cfg, None).unwrap();

        assert!(matcher.matches(Path::new("/var/log/app.log")));
        assert!(matcher.matches(Path::new("/var/log/nginx/access.log")));
        assert!(!matcher.matches(Path::new("/var/log/a/b/deep.log")));
        assert!(!matcher.matches(Path::new("/var/log/app.txt")));
        assert_eq!(matcher.search_origins(), vec![PathBuf::from("/var/log")]);
    }

    #[test]
    fn test_wildcard_form_computes_static_prefix() {
        let matcher = PathMatcher::from_config(&config(&["/srv/*/app/log/*.log"]), None).unwrap();
        assert_eq!(matcher.search_origins(), vec![PathBuf::from("/srv")]);
        assert!(matcher.matches(Path::new("/srv/tenant1/app/log/a.log")));
        assert!(!matcher.matches(Path::new("/srv/tenant1/other/log/a.log")));
        assert!(!matcher.matches(Path::new("/opt/tenant1/app/log/a.log")));
    }

    #[test]
    fn test_recursive_form_matches_subtree() {
        let matcher = PathMatcher::from_config(&config(&["/data/**/*.log"]), None).unwrap();
        assert!(matcher.matches(Path::new("/data/a.log")));
        assert!(matcher.matches(Path::new("/data/x/y/z/b.log")));
        assert!(!matcher.matches(Path::new("/data/x/b.txt")));
    }

    #[test]
    fn test_blacklists_are_independent() {
        let mut cfg = config(&["/var/log/**/*.log"]);
        cfg.exclude_dirs = vec!["/var/log/private".into()];
        cfg.exclude_dir_patterns = vec!["/var/log/*/tmp".into()];
        cfg.exclude_file_patterns = vec!["*.gz.log".into()];
        let matcher = PathMatcher::from_config(&cfg, None).unwrap();

        assert!(matcher.matches(Path::new("/var/log/app/a.log")));
        assert!(!matcher.matches(Path::new("/var/log/private/a.log")));
        assert!(!matcher.matches(Path::new("/var/log/app/tmp/a.log")));
        assert!(!matcher.matches(Path::new("/var/log/app/old.gz.log")));
    }

    #[test]
    fn test_rebase_onto_container_root() {
        let matcher =
            PathMatcher::from_config(&config(&["/var/log/*.log"]), Some(Path::new("/containers/abc")))
                .unwrap();
        assert!(matcher.matches(Path::new("/containers/abc/var/log/app.log")));
        assert!(!matcher.matches(Path::new("/var/log/app.log")));
    }

    #[test]
    fn test_dir_in_scope() {
        let mut cfg = config(&["/var/log/*.log"]);
        cfg.max_dir_search_depth = 1;
        let matcher = PathMatcher::from_config(&cfg, None).unwrap();
        assert!(matcher.dir_in_scope(Path::new("/var/log")));
        assert!(matcher.dir_in_scope(Path::new("/var/log/nginx")));
        assert!(!matcher.dir_in_scope(Path::new("/var/log/nginx/deep")));
        assert!(!matcher.dir_in_scope(Path::new("/etc")));
    }
}
