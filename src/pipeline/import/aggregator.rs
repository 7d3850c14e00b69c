//! Multi-file aggregation.
//!
//! A batch is a sequence of input paths. Each file is extracted into its own
//! file-local [`Resolver`], which is then replayed into the batch resolver:
//! surviving identities merge by key, tombstones delete batch-wide. Archives
//! are expanded into a temporary directory that lives only while their
//! members are processed.
//!
//! Per-file failures never abort the batch. They are logged, counted, and
//! reported through [`FileOutcome`]; the batch only fails when inputs were
//! given and none of them could be read and parsed.

use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use super::archive::{ArchiveExpander, ZipExpander};
use super::format::{detect_format, display_name};
use super::source::{FileSource, LocalFiles};
use super::ExtractError;
use crate::config::BatchConfig;
use crate::models::Roster;
use crate::pipeline::extraction::ExtractorRegistry;
use crate::pipeline::resolution::Resolver;

/// What happened to one input path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Processed { identities: usize, deleted: usize },
    Skipped { reason: String },
    Failed { reason: String },
    Archive { members: usize, processed: usize },
}

impl FileOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Batch counters, logged when the batch finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub archives_expanded: usize,
    pub archives_failed: usize,
}

/// Resolve every identity across `paths`.
///
/// An empty list yields an empty roster. Otherwise at least one file must be
/// read and parsed, or the result is [`ExtractError::NoUsableInput`].
pub fn extract_identities(paths: &[PathBuf]) -> Result<Roster, ExtractError> {
    Aggregator::default().run(paths)
}

// ═══════════════════════════════════════════
// Aggregator
// ═══════════════════════════════════════════

/// Holds the capabilities a batch runs with.
pub struct Aggregator {
    registry: ExtractorRegistry,
    config: BatchConfig,
    source: Box<dyn FileSource>,
    expander: Box<dyn ArchiveExpander>,
}

impl Aggregator {
    pub fn new(config: BatchConfig) -> Self {
        let registry = ExtractorRegistry::default();
        let expander = ZipExpander::from_config(&config).only_extensions(registry.extensions());
        Self {
            registry,
            config,
            source: Box::new(LocalFiles),
            expander: Box::new(expander),
        }
    }

    /// Also resets the archive expander to a [`ZipExpander`] that keeps the
    /// new registry's extensions; call [`Aggregator::with_expander`] after
    /// this to override it.
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.expander = Box::new(
            ZipExpander::from_config(&self.config).only_extensions(registry.extensions()),
        );
        self.registry = registry;
        self
    }

    /// Source for standalone export files. Archives are expanded from disk
    /// by the expander, and their members are read back from the working
    /// directory with [`LocalFiles`].
    pub fn with_source(mut self, source: Box<dyn FileSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_expander(mut self, expander: Box<dyn ArchiveExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn begin(&self) -> Batch<'_> {
        Batch {
            aggregator: self,
            id: Uuid::new_v4(),
            resolver: Resolver::new(),
            stats: BatchStats::default(),
            inputs: 0,
        }
    }

    pub fn run(&self, paths: &[PathBuf]) -> Result<Roster, ExtractError> {
        let mut batch = self.begin();
        for path in paths {
            batch.ingest(path);
        }
        batch.finish()
    }

    /// Read and extract one file into a file-local resolver.
    fn extract_file(&self, path: &Path, source: &dyn FileSource) -> Result<Resolver, ExtractError> {
        let extractor = self.registry.for_path(path).ok_or_else(|| {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<none>");
            ExtractError::UnsupportedFormat(extension.to_string())
        })?;

        let size = source.size(path)?;
        if size > self.config.max_file_bytes {
            return Err(ExtractError::too_large(size, self.config.max_file_bytes));
        }

        let bytes = source.read(path)?;
        let sightings = extractor.extract(&bytes)?;

        let mut resolver = Resolver::new();
        resolver.observe_all(sightings);
        Ok(resolver)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

// ═══════════════════════════════════════════
// Batch
// ═══════════════════════════════════════════

/// One run over a set of inputs. Callers that want to stop early simply stop
/// calling [`Batch::ingest`].
pub struct Batch<'a> {
    aggregator: &'a Aggregator,
    id: Uuid,
    resolver: Resolver,
    stats: BatchStats,
    inputs: usize,
}

impl Batch<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn ingest(&mut self, path: &Path) -> FileOutcome {
        self.inputs += 1;
        let name = display_name(path);

        let category = detect_format(path);
        tracing::debug!(batch = %self.id, file = %name, category = category.as_str(), "Ingesting");

        let aggregator = self.aggregator;
        if category.is_archive() {
            self.ingest_archive(path, &name)
        } else {
            self.ingest_file(path, &name, aggregator.source.as_ref())
        }
    }

    /// Current state of the roster; later inputs may still change it.
    pub fn roster(&self) -> Roster {
        self.resolver.snapshot()
    }

    pub fn finish(self) -> Result<Roster, ExtractError> {
        tracing::info!(
            batch = %self.id,
            inputs = self.inputs,
            processed = self.stats.files_processed,
            failed = self.stats.files_failed,
            skipped = self.stats.files_skipped,
            archives = self.stats.archives_expanded,
            identities = self.resolver.len(),
            "Batch finished"
        );

        if self.inputs > 0 && self.stats.files_processed == 0 {
            return Err(ExtractError::NoUsableInput);
        }
        Ok(self.resolver.into_roster())
    }

    fn ingest_file(&mut self, path: &Path, name: &str, source: &dyn FileSource) -> FileOutcome {
        match self.aggregator.extract_file(path, source) {
            Ok(file_resolver) => {
                let identities = file_resolver.len();
                let deleted = file_resolver.tombstones().len();
                file_resolver.replay_into(&mut self.resolver);
                self.stats.files_processed += 1;

                tracing::info!(
                    batch = %self.id,
                    file = %name,
                    identities,
                    deleted,
                    "Export file processed"
                );
                FileOutcome::Processed {
                    identities,
                    deleted,
                }
            }
            Err(ExtractError::UnsupportedFormat(extension)) => {
                self.stats.files_skipped += 1;
                tracing::warn!(batch = %self.id, file = %name, extension = %extension, "Skipping unsupported file");
                FileOutcome::Skipped {
                    reason: format!("unsupported extension: {extension}"),
                }
            }
            Err(e) => {
                self.stats.files_failed += 1;
                tracing::warn!(batch = %self.id, file = %name, error = %e, "Failed to process export file");
                FileOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn ingest_archive(&mut self, path: &Path, name: &str) -> FileOutcome {
        let workdir = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                self.stats.archives_failed += 1;
                tracing::warn!(batch = %self.id, file = %name, error = %e, "Cannot create archive working directory");
                return FileOutcome::Archive {
                    members: 0,
                    processed: 0,
                };
            }
        };

        let members = match self.aggregator.expander.expand(path, workdir.path()) {
            Ok(members) => {
                self.stats.archives_expanded += 1;
                members
            }
            Err(e) => {
                self.stats.archives_failed += 1;
                tracing::warn!(batch = %self.id, file = %name, error = %e, "Archive could not be expanded");
                Vec::new()
            }
        };

        let usable: Vec<PathBuf> = members
            .into_iter()
            .filter(|member| self.aggregator.registry.supports(member))
            .collect();
        if usable.is_empty() {
            tracing::warn!(batch = %self.id, file = %name, "Archive contains no supported export files");
        }

        let mut processed = 0;
        for member in &usable {
            let member_name = format!("{name}:{}", display_name(member));
            if self.ingest_file(member, &member_name, &LocalFiles).is_processed() {
                processed += 1;
            }
        }

        tracing::debug!(
            batch = %self.id,
            file = %name,
            members = usable.len(),
            processed,
            "Archive processed"
        );

        FileOutcome::Archive {
            members: usable.len(),
            processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentityKey;
    use std::collections::HashMap;
    use std::io::Write;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn write_zip(dir: &Path, name: &str, members: &[(&str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (member, contents) in members {
            writer.start_file(*member, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    const JSON_100_200: &str = r#"{"messages": [
        {"id": 1, "date": "2024-01-01T10:00:00", "from": "Ann Lee", "from_id": "user100"},
        {"id": 2, "date": "2024-01-01T10:05:00", "from": "Bob Stone", "from_id": "user200"}
    ]}"#;

    const HTML_BOB_CARA: &str = r#"<html><body>
        <div class="message default" id="message1">
          <div class="date" title="01.01.2024 11:00:00"></div>
          <div class="from_name">Bob Stone</div>
        </div>
        <div class="message default" id="message2">
          <div class="date" title="01.01.2024 11:05:00"></div>
          <div class="from_name">Cara Diaz</div>
        </div>
    </body></html>"#;

    #[test]
    fn empty_input_yields_empty_roster() {
        let roster = extract_identities(&[]).unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn same_id_across_messages_resolves_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "result.json",
            r#"{"messages": [
                {"id": 2, "date": "2024-01-01T10:00:00", "from": {"id": 100, "username": "a"}},
                {"id": 1, "date": "2024-01-01T09:00:00", "from": {"id": 100}}
            ]}"#,
        );

        let roster = extract_identities(&[path]).unwrap();
        assert_eq!(roster.len(), 1);

        let identity = roster.get(&IdentityKey::Authoritative(100)).unwrap();
        assert_eq!(identity.handle.as_deref(), Some("a"));
        assert_eq!(
            identity.first_message.as_ref().unwrap().at.to_string(),
            "2024-01-01 09:00:00"
        );
    }

    #[test]
    fn mixed_formats_do_not_cross_merge() {
        let dir = tempfile::tempdir().unwrap();
        let json = write(dir.path(), "result.json", JSON_100_200);
        let html = write(dir.path(), "messages.html", HTML_BOB_CARA);

        let roster = extract_identities(&[json, html]).unwrap();

        // Bob appears by id in one export and by name in the other.
        assert_eq!(roster.len(), 4);
        assert!(roster.contains(&IdentityKey::Authoritative(100)));
        assert!(roster.contains(&IdentityKey::Authoritative(200)));
        assert!(roster.contains(&IdentityKey::from_name("Bob Stone")));
        assert!(roster.contains(&IdentityKey::from_name("Cara Diaz")));
    }

    #[test]
    fn archive_members_are_processed() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_zip(
            dir.path(),
            "export.zip",
            &[
                ("result.json", JSON_100_200),
                ("chats/chat_01/messages.html", HTML_BOB_CARA),
                ("photos/photo_1.jpg", "not really a jpeg"),
            ],
        );

        let aggregator = Aggregator::default();
        let mut batch = aggregator.begin();
        let outcome = batch.ingest(&archive);

        assert_eq!(
            outcome,
            FileOutcome::Archive {
                members: 2,
                processed: 2
            }
        );
        assert_eq!(batch.stats().archives_expanded, 1);
        assert_eq!(batch.finish().unwrap().len(), 4);
    }

    #[test]
    fn archive_without_exports_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_zip(dir.path(), "media.zip", &[("notes.txt", "hello")]);
        let json = write(dir.path(), "result.json", JSON_100_200);

        let aggregator = Aggregator::default();
        let mut batch = aggregator.begin();
        assert_eq!(
            batch.ingest(&archive),
            FileOutcome::Archive {
                members: 0,
                processed: 0
            }
        );
        assert!(batch.ingest(&json).is_processed());
        assert_eq!(batch.finish().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_archive_degrades_to_warning() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write(dir.path(), "broken.zip", "definitely not a zip");
        let json = write(dir.path(), "result.json", JSON_100_200);

        let aggregator = Aggregator::default();
        let mut batch = aggregator.begin();
        batch.ingest(&archive);
        batch.ingest(&json);
        assert_eq!(batch.stats().archives_failed, 1);
        assert_eq!(batch.finish().unwrap().len(), 2);
    }

    #[test]
    fn deletion_in_one_file_removes_identity_batch_wide() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "a.json", JSON_100_200);
        let second = write(
            dir.path(),
            "b.json",
            r#"{"messages": [{"id": 9, "from": null, "from_id": "user200"}]}"#,
        );

        let roster = extract_identities(&[first, second]).unwrap();
        assert_eq!(roster.len(), 1);
        assert!(!roster.contains(&IdentityKey::Authoritative(200)));
    }

    #[test]
    fn reactor_without_author_field_does_not_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "result.json",
            r#"{"messages": [{
                "id": 1, "date": "2024-01-01T10:00:00", "from": "Ann Lee", "from_id": "user100",
                "reactions": [{"emoji": "👍", "recent": [
                    {"from_id": "user100", "date": "2024-01-01T10:30:00"}
                ]}]
            }]}"#,
        );

        let roster = extract_identities(&[path]).unwrap();
        assert_eq!(roster.len(), 1);
        let identity = roster.get(&IdentityKey::Authoritative(100)).unwrap();
        assert_eq!(identity.first_name.as_deref(), Some("Ann"));
        assert!(identity.first_reaction.is_some());
    }

    #[test]
    fn malformed_file_is_skipped_when_others_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.json", "{ not json");
        let good = write(dir.path(), "result.json", JSON_100_200);

        let aggregator = Aggregator::default();
        let mut batch = aggregator.begin();
        assert!(matches!(batch.ingest(&bad), FileOutcome::Failed { .. }));
        assert!(batch.ingest(&good).is_processed());
        assert_eq!(batch.stats().files_failed, 1);
        assert_eq!(batch.finish().unwrap().len(), 2);
    }

    #[test]
    fn all_inputs_failing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.json", "[]");
        let unsupported = write(dir.path(), "notes.txt", "@alice_w");
        let missing = dir.path().join("missing.json");

        let err = extract_identities(&[bad, unsupported, missing]).unwrap_err();
        assert!(matches!(err, ExtractError::NoUsableInput));
    }

    #[test]
    fn parsed_file_without_identities_is_still_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "result.json", r#"{"messages": []}"#);
        let roster = extract_identities(&[path]).unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn unsupported_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "notes.txt", "hello");

        let aggregator = Aggregator::default();
        let mut batch = aggregator.begin();
        assert!(matches!(batch.ingest(&path), FileOutcome::Skipped { .. }));
        assert_eq!(batch.stats().files_skipped, 1);
    }

    #[test]
    fn oversized_file_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "result.json", JSON_100_200);

        let config = BatchConfig {
            max_file_bytes: 16,
            ..BatchConfig::default()
        };
        let aggregator = Aggregator::new(config);
        let mut batch = aggregator.begin();
        let outcome = batch.ingest(&path);

        let FileOutcome::Failed { reason } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(reason.contains("too large"), "{reason}");
    }

    #[test]
    fn roster_snapshot_tracks_progress() {
        let dir = tempfile::tempdir().unwrap();
        let json = write(dir.path(), "result.json", JSON_100_200);
        let html = write(dir.path(), "messages.html", HTML_BOB_CARA);

        let aggregator = Aggregator::default();
        let mut batch = aggregator.begin();
        batch.ingest(&json);
        assert_eq!(batch.roster().len(), 2);
        batch.ingest(&html);
        assert_eq!(batch.roster().len(), 4);
    }

    #[test]
    fn custom_registry_applies_to_archive_members() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_zip(dir.path(), "export.zip", &[("dump.txt", JSON_100_200)]);

        let mut registry = ExtractorRegistry::default();
        registry.register("txt", Box::new(crate::pipeline::extraction::StructuredExtractor));
        let aggregator = Aggregator::default().with_registry(registry);

        let roster = aggregator.run(&[archive]).unwrap();
        assert_eq!(roster.len(), 2);
    }

    /// In-memory source for exercising the capability seam.
    struct MemorySource(HashMap<PathBuf, Vec<u8>>);

    impl FileSource for MemorySource {
        fn size(&self, path: &Path) -> std::io::Result<u64> {
            self.read(path).map(|bytes| bytes.len() as u64)
        }

        fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
        }
    }

    #[test]
    fn custom_file_source_is_used() {
        let path = PathBuf::from("virtual/result.json");
        let source = MemorySource(HashMap::from([(
            path.clone(),
            JSON_100_200.as_bytes().to_vec(),
        )]));

        let aggregator = Aggregator::default().with_source(Box::new(source));
        let roster = aggregator.run(&[path]).unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn archive_members_bypass_custom_source() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_zip(dir.path(), "export.zip", &[("result.json", JSON_100_200)]);

        let aggregator = Aggregator::default().with_source(Box::new(MemorySource(HashMap::new())));
        let mut batch = aggregator.begin();
        assert_eq!(
            batch.ingest(&archive),
            FileOutcome::Archive {
                members: 1,
                processed: 1
            }
        );
        assert_eq!(batch.finish().unwrap().len(), 2);
    }
}
