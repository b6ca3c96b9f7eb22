//! Turning a request into the inputs of a generation job.
//!
//! A [`RequestPlanner`] runs before submission. The stock implementation,
//! [`MediaPlanner`], extracts structured [`Requirements`] from the prompt and
//! resolves them to a reference image and a reference dance video.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use motion_core::{GenerationRequest, Requirements};

/// Collection holding reference dance videos.
pub const DANCE_COLLECTION: &str = "dance_videos";

/// Collection holding subject images.
pub const IMAGE_COLLECTION: &str = "token_images";

/// Result type for planners: the job's ordered input references.
pub type PlanResult = Result<Vec<String>, PlanError>;

/// Future type for async planners.
pub type PlanFuture = Pin<Box<dyn Future<Output = PlanResult> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("could not understand the request: {0}")]
    Extraction(String),

    #[error("request does not name a {0}")]
    MissingField(&'static str),

    #[error("nothing in {collection} matches {query:?}")]
    NotFound { collection: String, query: String },

    #[error("reference lookup failed: {0}")]
    Lookup(String),
}

/// Produces the input references for a request.
pub trait RequestPlanner: Send + Sync + 'static {
    fn plan(&self, request: &GenerationRequest) -> PlanFuture;
}

/// A simple function-based planner.
pub struct FnPlanner<F>
where
    F: Fn(&GenerationRequest) -> PlanFuture + Send + Sync + 'static,
{
    planner: F,
}

impl<F> FnPlanner<F>
where
    F: Fn(&GenerationRequest) -> PlanFuture + Send + Sync + 'static,
{
    pub fn new(planner: F) -> Self {
        Self { planner }
    }
}

impl<F> RequestPlanner for FnPlanner<F>
where
    F: Fn(&GenerationRequest) -> PlanFuture + Send + Sync + 'static,
{
    fn plan(&self, request: &GenerationRequest) -> PlanFuture {
        (self.planner)(request)
    }
}

/// Extracts structured requirements from free text.
pub trait RequirementExtractor: Send + Sync + 'static {
    fn extract<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<Requirements, PlanError>>;
}

/// Resolves a query to a file path within a media collection.
pub trait MediaLookup: Send + Sync + 'static {
    fn lookup<'a>(
        &'a self,
        collection: &'a str,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, PlanError>>;
}

/// Extractor followed by two lookups: `[image_path, video_path]`.
#[derive(Clone)]
pub struct MediaPlanner {
    extractor: Arc<dyn RequirementExtractor>,
    lookup: Arc<dyn MediaLookup>,
}

impl MediaPlanner {
    pub fn new(extractor: Arc<dyn RequirementExtractor>, lookup: Arc<dyn MediaLookup>) -> Self {
        Self { extractor, lookup }
    }

    async fn resolve(&self, prompt: &str) -> PlanResult {
        let requirements = self.extractor.extract(prompt).await?;
        tracing::debug!(?requirements, "Extracted requirements");

        let dance_query = requirements
            .dance_query()
            .ok_or(PlanError::MissingField("dance or style"))?;
        let subject_query = requirements
            .subject_query()
            .ok_or(PlanError::MissingField("subject"))?;

        let video_path = self.find(DANCE_COLLECTION, &dance_query).await?;
        let image_path = self.find(IMAGE_COLLECTION, &subject_query).await?;

        Ok(vec![image_path, video_path])
    }

    async fn find(&self, collection: &str, query: &str) -> Result<String, PlanError> {
        let found = self.lookup.lookup(collection, query).await?;
        tracing::debug!(collection, query, found = ?found, "Reference lookup");
        found.ok_or_else(|| PlanError::NotFound {
            collection: collection.to_string(),
            query: query.to_string(),
        })
    }
}

impl RequestPlanner for MediaPlanner {
    fn plan(&self, request: &GenerationRequest) -> PlanFuture {
        let planner = self.clone();
        let prompt = request.prompt.clone();
        Box::pin(async move { planner.resolve(&prompt).await })
    }
}

/// Parse requirements from model-style output: a JSON object, optionally
/// wrapped in a ```` ```json ```` fence.
pub fn parse_requirements(raw: &str) -> Result<Requirements, PlanError> {
    let body = raw.replace("```json", "").replace("```", "");
    serde_json::from_str(body.trim()).map_err(|e| PlanError::Extraction(e.to_string()))
}
