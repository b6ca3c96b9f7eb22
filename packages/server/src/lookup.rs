//! Local stand-ins for requirement extraction and media lookup.
//!
//! The extractor accepts prompts that already carry a JSON requirements
//! object and otherwise falls back to a keyword split. The lookup reads a
//! manifest of the form `{"dance_videos": {"apt hiphop": "dances/apt.mp4"}}`.

use std::collections::HashMap;
use std::path::Path;

use actors::{MediaLookup, PlanError, RequirementExtractor, parse_requirements};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use motion_core::Requirements;

/// Reads requirements from JSON prompts, or from `subject dancing dance[, style]`.
#[derive(Debug, Default, Clone)]
pub struct JsonExtractor;

impl JsonExtractor {
    fn from_text(prompt: &str) -> Result<Requirements, PlanError> {
        if prompt.trim_start().starts_with('{') || prompt.contains("```") {
            return parse_requirements(prompt);
        }

        let lowered = prompt.to_lowercase();
        let Some((subject, rest)) = lowered.split_once(" dancing ") else {
            return Err(PlanError::Extraction(format!(
                "expected \"<subject> dancing <dance>\", got {prompt:?}"
            )));
        };
        let subject = subject
            .trim()
            .rsplit(' ')
            .next()
            .unwrap_or_default()
            .to_string();
        let (dance, style) = match rest.split_once(',') {
            Some((dance, style)) => (dance.trim(), Some(style.trim().to_string())),
            None => (rest.trim(), None),
        };

        Ok(Requirements {
            subject: (!subject.is_empty()).then_some(subject),
            dance_name: (!dance.is_empty()).then(|| dance.to_string()),
            style: style.filter(|s| !s.is_empty()),
        })
    }
}

impl RequirementExtractor for JsonExtractor {
    fn extract<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<Requirements, PlanError>> {
        async move { Self::from_text(prompt) }.boxed()
    }
}

/// Exact-match lookup over a JSON manifest, keyed by normalized query.
#[derive(Debug, Default, Clone)]
pub struct ManifestLookup {
    collections: HashMap<String, HashMap<String, String>>,
}

impl ManifestLookup {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn load(path: &Path) -> Result<Self, PlanError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PlanError::Lookup(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, PlanError> {
        let parsed: HashMap<String, HashMap<String, String>> =
            serde_json::from_str(raw).map_err(|e| PlanError::Lookup(e.to_string()))?;
        let collections = parsed
            .into_iter()
            .map(|(collection, entries)| {
                let entries = entries
                    .into_iter()
                    .map(|(query, path)| (normalize(&query), path))
                    .collect();
                (collection, entries)
            })
            .collect();
        Ok(Self { collections })
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaLookup for ManifestLookup {
    fn lookup<'a>(
        &'a self,
        collection: &'a str,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, PlanError>> {
        let found = self
            .collections
            .get(collection)
            .and_then(|entries| entries.get(&normalize(query)))
            .cloned();
        async move { Ok(found) }.boxed()
    }
}

fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
