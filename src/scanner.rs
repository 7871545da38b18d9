//! Reference scanning: narrows the asset list down to assets nothing mentions.
//!
//! Matching is a plain substring test of the asset path against the text of
//! each content source, so references nested anywhere in a document count.
//! A path contained in a longer one (`a.jpg` in `banana.jpg`) also counts as
//! referenced and the asset is kept.

use crate::content::{ContentSource, EntryStore};
use crate::errors::SweepError;
use crate::store::Asset;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Assets that are kept regardless of references
#[derive(Debug, Clone, Default)]
pub struct ProtectionRules {
    /// Disk whose assets are always in use (icon sets)
    pub icon_disk: Option<String>,
    /// Prefix joined to the asset path before comparing with `urls`
    pub prefix: String,
    /// Public URLs of protected assets, e.g. a configured logo or favicon
    pub urls: Vec<String>,
}

impl ProtectionRules {
    pub fn is_protected(&self, asset: &Asset) -> bool {
        if self.icon_disk.as_deref() == Some(asset.disk.as_str()) {
            return true;
        }
        if self.urls.is_empty() {
            return false;
        }
        let url = format!("{}{}", self.prefix, asset.path);
        self.urls.iter().any(|u| *u == url)
    }
}

/// What to do with the candidates when a content source cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFailurePolicy {
    /// Treat every remaining candidate as used
    #[default]
    KeepAll,
    /// Leave remaining candidates in the unused set
    Ignore,
}

/// A content source that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// Result of a scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub unused: Vec<Asset>,
    pub failures: Vec<SourceFailure>,
    /// Candidates withheld because of read failures
    pub withheld: usize,
}

pub struct ReferenceScanner<'a> {
    content: &'a dyn ContentSource,
    entries: Option<&'a dyn EntryStore>,
    protection: ProtectionRules,
    policy: ReadFailurePolicy,
    show_progress: bool,
}

/// Drop every candidate whose path occurs in `text`
fn forget_referenced(candidates: &mut Vec<Asset>, text: &str) {
    candidates.retain(|asset| !text.contains(asset.path.as_str()));
}

fn record_failure(failures: &mut Vec<SourceFailure>, err: SweepError) {
    let (source, reason) = match err {
        SweepError::ContentRead {
            source_name,
            reason,
        } => (source_name, reason),
        other => ("<unknown>".to_string(), other.to_string()),
    };
    warn!(
        event = "scan.source_failed",
        source = %source,
        reason = %reason
    );
    failures.push(SourceFailure { source, reason });
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(
        content: &'a dyn ContentSource,
        entries: Option<&'a dyn EntryStore>,
        protection: ProtectionRules,
    ) -> Self {
        Self {
            content,
            entries,
            protection,
            policy: ReadFailurePolicy::default(),
            show_progress: false,
        }
    }

    pub fn with_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Draw a spinner on stderr while scanning
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn spinner(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            progress.set_style(style);
        }
        progress.enable_steady_tick(std::time::Duration::from_millis(100));
        progress
    }

    /// Return the assets no content source references, in input order.
    pub fn filter_unused(&self, assets: Vec<Asset>) -> ScanReport {
        info!(event = "scan.started", assets = assets.len());

        let mut failures = Vec::new();
        let mut candidates: Vec<Asset> = assets
            .into_iter()
            .filter(|asset| {
                let protected = self.protection.is_protected(asset);
                if protected {
                    debug!(event = "scan.asset_protected", path = %asset.path, disk = %asset.disk);
                }
                !protected
            })
            .collect();

        let progress = self.spinner();

        for item in self.content.list_all_files() {
            let file = match item {
                Ok(file) => file,
                Err(err) => {
                    record_failure(&mut failures, err);
                    continue;
                }
            };
            if candidates.is_empty() {
                continue;
            }
            progress.set_message(format!("Scanning {}", file.display()));
            match self.content.read_text(&file) {
                Ok(text) => forget_referenced(&mut candidates, &text),
                Err(err) => record_failure(&mut failures, err),
            }
        }

        if let Some(store) = self.entries {
            for item in store.list_all_entries() {
                let entry = match item {
                    Ok(entry) => entry,
                    Err(err) => {
                        record_failure(&mut failures, err);
                        continue;
                    }
                };
                if candidates.is_empty() {
                    continue;
                }
                progress.set_message(format!("Scanning entry {}", entry.id));
                match store.serialize_data(&entry) {
                    Ok(text) => forget_referenced(&mut candidates, &text),
                    Err(err) => record_failure(&mut failures, err),
                }
            }
        }

        progress.finish_and_clear();

        let mut withheld = 0;
        if !failures.is_empty() && self.policy == ReadFailurePolicy::KeepAll {
            withheld = candidates.len();
            candidates.clear();
        }

        info!(
            event = "scan.completed",
            unused = candidates.len(),
            failures = failures.len(),
            withheld
        );

        ScanReport {
            unused: candidates,
            failures,
            withheld,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Entry;
    use std::path::{Path, PathBuf};

    struct MemoryContent {
        files: Vec<(PathBuf, Option<String>)>,
        listing_errors: Vec<String>,
    }

    impl MemoryContent {
        fn new(texts: &[&str]) -> Self {
            Self {
                files: texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (PathBuf::from(format!("content/{i}.md")), Some(t.to_string())))
                    .collect(),
                listing_errors: Vec::new(),
            }
        }

        fn with_unreadable(mut self, name: &str) -> Self {
            self.files.push((PathBuf::from(name), None));
            self
        }

        /// A directory the listing cannot descend into, reported ahead of the files
        fn with_locked_dir(mut self, name: &str) -> Self {
            self.listing_errors.push(name.to_string());
            self
        }
    }

    fn unreadable(name: &str) -> SweepError {
        SweepError::ContentRead {
            source_name: name.to_string(),
            reason: "unreadable".to_string(),
        }
    }

    impl ContentSource for MemoryContent {
        fn list_all_files(&self) -> Vec<Result<PathBuf, SweepError>> {
            self.listing_errors
                .iter()
                .map(|name| Err(unreadable(name)))
                .chain(self.files.iter().map(|(p, _)| Ok(p.clone())))
                .collect()
        }

        fn read_text(&self, file: &Path) -> Result<String, SweepError> {
            self.files
                .iter()
                .find(|(p, _)| p == file)
                .and_then(|(_, text)| text.clone())
                .ok_or_else(|| unreadable(&file.display().to_string()))
        }
    }

    /// Entries keyed by index; `None` data fails to serialize
    #[derive(Default)]
    struct MemoryEntries {
        data: Vec<Option<String>>,
        listing_fails: bool,
    }

    impl MemoryEntries {
        fn new(data: &[&str]) -> Self {
            Self {
                data: data.iter().map(|d| Some(d.to_string())).collect(),
                listing_fails: false,
            }
        }
    }

    impl EntryStore for MemoryEntries {
        fn list_all_entries(&self) -> Vec<Result<Entry, SweepError>> {
            if self.listing_fails {
                return vec![Err(unreadable("entries"))];
            }
            (0..self.data.len())
                .map(|i| {
                    Ok(Entry {
                        id: i.to_string(),
                        location: PathBuf::from(format!("entries/{i}.json")),
                    })
                })
                .collect()
        }

        fn serialize_data(&self, entry: &Entry) -> Result<String, SweepError> {
            let index: usize = entry.id.parse().unwrap();
            self.data[index]
                .clone()
                .ok_or_else(|| unreadable(&entry.location.display().to_string()))
        }
    }

    fn asset(path: &str, size: u64) -> Asset {
        Asset {
            container: "assets".to_string(),
            disk: "assets".to_string(),
            path: path.to_string(),
            size,
        }
    }

    fn paths(assets: &[Asset]) -> Vec<&str> {
        assets.iter().map(|a| a.path.as_str()).collect()
    }

    // ============ matching tests ============

    #[test]
    fn test_referenced_asset_is_used() {
        let content = MemoryContent::new(&["uses a.jpg here"]);
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default());

        let report = scanner.filter_unused(vec![asset("a.jpg", 1048576), asset("b.jpg", 2097152)]);

        assert_eq!(paths(&report.unused), vec!["b.jpg"]);
        assert_eq!(report.unused[0].size, 2097152);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_unused_preserves_input_order() {
        let content = MemoryContent::new(&["c.jpg"]);
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default());

        let report = scanner.filter_unused(vec![
            asset("d.jpg", 1),
            asset("c.jpg", 1),
            asset("a.jpg", 1),
            asset("b.jpg", 1),
        ]);

        assert_eq!(paths(&report.unused), vec!["d.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_entries_are_scanned() {
        let content = MemoryContent::new(&["nothing here"]);
        let entries = MemoryEntries::new(&[r#"{"hero":{"image":"img/team.jpg"}}"#]);
        let scanner = ReferenceScanner::new(
            &content,
            Some(&entries as &dyn EntryStore),
            ProtectionRules::default(),
        );

        let report = scanner.filter_unused(vec![asset("img/team.jpg", 1), asset("img/old.jpg", 1)]);

        assert_eq!(paths(&report.unused), vec!["img/old.jpg"]);
    }

    #[test]
    fn test_substring_of_longer_path_counts_as_used() {
        let content = MemoryContent::new(&["banana.jpg"]);
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default());

        let report = scanner.filter_unused(vec![asset("a.jpg", 1)]);

        assert!(report.unused.is_empty());
    }

    #[test]
    fn test_no_referenced_path_is_returned() {
        let texts = ["hero: img/x.jpg", "see docs/manual.pdf and img/y.png"];
        let content = MemoryContent::new(&texts);
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default());

        let input = vec![
            asset("img/x.jpg", 1),
            asset("img/y.png", 1),
            asset("docs/manual.pdf", 1),
            asset("img/z.gif", 1),
        ];
        let report = scanner.filter_unused(input);

        for unused in &report.unused {
            assert!(texts.iter().all(|t| !t.contains(unused.path.as_str())));
        }
        assert_eq!(paths(&report.unused), vec!["img/z.gif"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let content = MemoryContent::new(&["a.jpg"]);
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default());
        let input = vec![asset("a.jpg", 1), asset("b.jpg", 2), asset("c.jpg", 3)];

        let first = scanner.filter_unused(input.clone());
        let second = scanner.filter_unused(input);

        assert_eq!(first.unused, second.unused);
    }

    // ============ protection tests ============

    #[test]
    fn test_icon_disk_is_always_used() {
        let content = MemoryContent::new(&[]);
        let rules = ProtectionRules {
            icon_disk: Some("svg_icons".to_string()),
            ..Default::default()
        };
        let scanner = ReferenceScanner::new(&content, None, rules);

        let mut icon = asset("arrow.svg", 1);
        icon.disk = "svg_icons".to_string();
        let report = scanner.filter_unused(vec![icon, asset("photo.jpg", 1)]);

        assert_eq!(paths(&report.unused), vec!["photo.jpg"]);
    }

    #[test]
    fn test_protected_url_is_always_used() {
        let content = MemoryContent::new(&["nothing references the logo"]);
        let rules = ProtectionRules {
            icon_disk: None,
            prefix: "/assets/".to_string(),
            urls: vec!["/assets/brand/logo.svg".to_string()],
        };
        let scanner = ReferenceScanner::new(&content, None, rules);

        let report =
            scanner.filter_unused(vec![asset("brand/logo.svg", 1), asset("brand/old.svg", 1)]);

        assert_eq!(paths(&report.unused), vec!["brand/old.svg"]);
    }

    #[test]
    fn test_protected_url_wins_over_reference() {
        let content = MemoryContent::new(&["<link rel=icon href=/assets/favicon.ico>"]);
        let rules = ProtectionRules {
            icon_disk: None,
            prefix: "/assets/".to_string(),
            urls: vec![
                "/assets/brand/logo.svg".to_string(),
                "/assets/favicon.ico".to_string(),
            ],
        };
        let scanner = ReferenceScanner::new(&content, None, rules);

        let report = scanner.filter_unused(vec![
            asset("favicon.ico", 1),
            asset("brand/logo.svg", 1),
            asset("orphan.png", 1),
        ]);

        assert_eq!(paths(&report.unused), vec!["orphan.png"]);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_protected_url_requires_prefix() {
        let rules = ProtectionRules {
            icon_disk: None,
            prefix: "/assets/".to_string(),
            urls: vec!["brand/logo.svg".to_string()],
        };
        assert!(!rules.is_protected(&asset("brand/logo.svg", 1)));
    }

    // ============ read failure tests ============

    #[test]
    fn test_read_failure_keeps_all_by_default() {
        let content = MemoryContent::new(&["a.jpg"]).with_unreadable("content/locked.md");
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default());

        let report = scanner.filter_unused(vec![asset("a.jpg", 1), asset("b.jpg", 1)]);

        assert!(report.unused.is_empty());
        assert_eq!(report.withheld, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, "content/locked.md");
    }

    #[test]
    fn test_read_failure_ignored_keeps_candidates() {
        let content = MemoryContent::new(&["a.jpg"]).with_unreadable("content/locked.md");
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default())
            .with_policy(ReadFailurePolicy::Ignore);

        let report = scanner.filter_unused(vec![asset("a.jpg", 1), asset("b.jpg", 1)]);

        assert_eq!(paths(&report.unused), vec!["b.jpg"]);
        assert_eq!(report.withheld, 0);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_locked_dir_still_scans_readable_files() {
        let content = MemoryContent::new(&["uses a.jpg here"]).with_locked_dir("content/drafts");
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default())
            .with_policy(ReadFailurePolicy::Ignore);

        let report = scanner.filter_unused(vec![asset("a.jpg", 1), asset("b.jpg", 1)]);

        assert_eq!(paths(&report.unused), vec!["b.jpg"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, "content/drafts");
    }

    #[test]
    fn test_locked_dir_keeps_all_by_default() {
        let content = MemoryContent::new(&["uses a.jpg here"]).with_locked_dir("content/drafts");
        let scanner = ReferenceScanner::new(&content, None, ProtectionRules::default());

        let report = scanner.filter_unused(vec![asset("a.jpg", 1), asset("b.jpg", 1)]);

        assert!(report.unused.is_empty());
        assert_eq!(report.withheld, 1);
    }

    #[test]
    fn test_unreadable_entry_keeps_all_by_default() {
        let content = MemoryContent::new(&[]);
        let mut entries = MemoryEntries::new(&[r#"{"image":"a.jpg"}"#]);
        entries.data.push(None);
        let scanner = ReferenceScanner::new(
            &content,
            Some(&entries as &dyn EntryStore),
            ProtectionRules::default(),
        );

        let report = scanner.filter_unused(vec![asset("a.jpg", 1), asset("b.jpg", 1)]);

        assert!(report.unused.is_empty());
        assert_eq!(report.withheld, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source, "entries/1.json");
    }

    #[test]
    fn test_unreadable_entry_ignored_keeps_candidates() {
        let content = MemoryContent::new(&[]);
        let mut entries = MemoryEntries::new(&[r#"{"image":"a.jpg"}"#]);
        entries.data.push(None);
        let scanner = ReferenceScanner::new(
            &content,
            Some(&entries as &dyn EntryStore),
            ProtectionRules::default(),
        )
        .with_policy(ReadFailurePolicy::Ignore);

        let report = scanner.filter_unused(vec![asset("a.jpg", 1), asset("b.jpg", 1)]);

        assert_eq!(paths(&report.unused), vec!["b.jpg"]);
        assert_eq!(report.withheld, 0);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_entry_listing_failure_under_both_policies() {
        let content = MemoryContent::new(&["a.jpg"]);
        let entries = MemoryEntries {
            listing_fails: true,
            ..Default::default()
        };
        let input = vec![asset("a.jpg", 1), asset("b.jpg", 1)];

        let kept = ReferenceScanner::new(
            &content,
            Some(&entries as &dyn EntryStore),
            ProtectionRules::default(),
        )
        .filter_unused(input.clone());
        assert!(kept.unused.is_empty());
        assert_eq!(kept.withheld, 1);
        assert_eq!(kept.failures[0].source, "entries");

        let ignored = ReferenceScanner::new(
            &content,
            Some(&entries as &dyn EntryStore),
            ProtectionRules::default(),
        )
        .with_policy(ReadFailurePolicy::Ignore)
        .filter_unused(input);
        assert_eq!(paths(&ignored.unused), vec!["b.jpg"]);
        assert_eq!(ignored.failures.len(), 1);
    }
}
