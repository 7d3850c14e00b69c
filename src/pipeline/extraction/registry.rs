use std::collections::HashMap;
use std::path::Path;

use super::{ExportExtractor, MarkupExtractor, StructuredExtractor};

/// Extractors keyed by lowercase file extension.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn ExportExtractor>>,
}

impl ExtractorRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register (or replace) the extractor for `extension`.
    pub fn register(&mut self, extension: &str, extractor: Box<dyn ExportExtractor>) {
        self.extractors
            .insert(normalize_extension(extension), extractor);
    }

    pub fn for_extension(&self, extension: &str) -> Option<&dyn ExportExtractor> {
        self.extractors
            .get(&normalize_extension(extension))
            .map(|e| e.as_ref())
    }

    pub fn for_path(&self, path: &Path) -> Option<&dyn ExportExtractor> {
        let extension = path.extension().and_then(|e| e.to_str())?;
        self.for_extension(extension)
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

impl Default for ExtractorRegistry {
    /// `json` → structured records, `html`/`htm` → markup.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("json", Box::new(StructuredExtractor));
        registry.register("html", Box::new(MarkupExtractor));
        registry.register("htm", Box::new(MarkupExtractor));
        registry
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sighting;
    use crate::pipeline::extraction::FormatError;

    struct Nothing;

    impl ExportExtractor for Nothing {
        fn extract(&self, _bytes: &[u8]) -> Result<Vec<Sighting>, FormatError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn default_registry_covers_json_and_html() {
        let registry = ExtractorRegistry::default();
        assert_eq!(registry.extensions(), vec!["htm", "html", "json"]);
        assert!(registry.supports(Path::new("result.json")));
        assert!(registry.supports(Path::new("messages.html")));
        assert!(!registry.supports(Path::new("notes.txt")));
        assert!(!registry.supports(Path::new("no_extension")));
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        let registry = ExtractorRegistry::default();
        assert!(registry.supports(Path::new("EXPORT.JSON")));
        assert!(registry.for_extension(".Html").is_some());
    }

    #[test]
    fn register_adds_new_extension() {
        let mut registry = ExtractorRegistry::empty();
        assert!(registry.for_extension("txt").is_none());
        registry.register("txt", Box::new(Nothing));
        let extractor = registry.for_extension("txt").unwrap();
        assert!(extractor.extract(b"anything").unwrap().is_empty());
    }
}
