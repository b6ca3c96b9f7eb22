//! SurrealDB-backed channels.
//!
//! Each channel is a table; record ids are monotonic ULIDs so `ORDER BY id`
//! yields push order.

use std::sync::Mutex;

use futures_util::FutureExt;
use motion_core::{GenerationJob, GenerationResult};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use surrealdb::sql::Thing;
use ulid::{Generator, Ulid};

use crate::{ChannelEntry, ChannelError, ChannelFuture, WorkChannel};

/// SurrealDB channel configuration.
#[derive(Debug, Clone)]
pub struct SurrealConfig {
    /// Connection mode: "mem://", "file://path", "ws://host:port"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
    /// Table holding submitted jobs
    pub task_table: String,
    /// Table the generation worker appends results to
    pub result_table: String,
}

impl Default for SurrealConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "motion".to_string(),
            database: "main".to_string(),
            credentials: None,
            task_table: "generation_task".to_string(),
            result_table: "generation_result".to_string(),
        }
    }
}

impl SurrealConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for file-based persistence.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("file://{}", path.into()),
            ..Default::default()
        }
    }

    /// A URL-style endpoint is used as given; a bare path means a local file.
    pub fn from_endpoint(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if endpoint.contains("://") {
            Self::remote(endpoint)
        } else {
            Self::file(endpoint)
        }
    }

    /// Whether the endpoint needs the on-disk storage engine.
    pub fn is_file(&self) -> bool {
        self.endpoint.starts_with("file://") || self.endpoint.starts_with("rocksdb://")
    }

    /// Create a config for a remote SurrealDB server.
    pub fn remote(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

#[derive(Debug, Deserialize)]
struct Record<T> {
    id: Option<Thing>,
    #[serde(flatten)]
    body: T,
}

/// Channels stored as SurrealDB tables.
pub struct SurrealChannel {
    db: Surreal<Any>,
    task_table: String,
    result_table: String,
    ids: Mutex<Generator>,
}

impl std::fmt::Debug for SurrealChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealChannel")
            .field("task_table", &self.task_table)
            .field("result_table", &self.result_table)
            .finish()
    }
}

impl SurrealChannel {
    /// Connect and define the channel tables.
    pub async fn connect(config: SurrealConfig) -> Result<Self, ChannelError> {
        tracing::info!("Connecting to SurrealDB channel: {}", config.endpoint);

        if config.is_file() && !cfg!(feature = "rocksdb") {
            return Err(ChannelError::InvalidConfig(format!(
                "{} needs the `rocksdb` feature",
                config.endpoint
            )));
        }

        let db = connect(&config.endpoint).await?;

        if let Some((username, password)) = &config.credentials {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(&config.namespace).use_db(&config.database).await?;

        db.query(channel_schema(&config.task_table, &config.result_table)?)
            .await?
            .check()?;

        tracing::info!(
            "Connected to SurrealDB channel: {}/{}",
            config.namespace,
            config.database
        );

        Ok(Self {
            db,
            task_table: config.task_table,
            result_table: config.result_table,
            ids: Mutex::new(Generator::new()),
        })
    }

    /// Direct database access, e.g. for acting as the generation worker.
    pub fn database(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Worker side: append a result record.
    pub async fn push_result(&self, result: GenerationResult) -> Result<(), ChannelError> {
        self.insert(&self.result_table, result).await
    }

    fn next_id(&self) -> String {
        let mut ids = self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.generate().unwrap_or_else(|_| Ulid::new()).to_string()
    }

    async fn insert<T>(&self, table: &str, body: T) -> Result<(), ChannelError>
    where
        T: serde::Serialize + DeserializeOwned + 'static,
    {
        let id = self.next_id();
        let created: Option<Record<T>> = self.db.create((table, id)).content(body).await?;
        if created.is_none() {
            return Err(ChannelError::Unavailable(format!(
                "SurrealDB did not return the record created in {table}"
            )));
        }
        Ok(())
    }

    async fn select_ordered<T>(&self, table: &str) -> Result<Vec<ChannelEntry<T>>, ChannelError>
    where
        T: DeserializeOwned,
    {
        let mut response = self
            .db
            .query("SELECT * FROM type::table($table) ORDER BY id ASC")
            .bind(("table", table.to_string()))
            .await?;
        let records: Vec<Record<T>> = response.take(0)?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let key = record.id?.id.to_raw();
                Some(ChannelEntry {
                    key,
                    record: record.body,
                })
            })
            .collect())
    }
}

impl WorkChannel for SurrealChannel {
    fn backend(&self) -> &'static str {
        "surrealdb"
    }

    fn tasks(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationJob>>> {
        async move { self.select_ordered(&self.task_table).await }.boxed()
    }

    fn push_task(&self, job: GenerationJob) -> ChannelFuture<'_, ()> {
        async move { self.insert(&self.task_table, job).await }.boxed()
    }

    fn results(&self) -> ChannelFuture<'_, Vec<ChannelEntry<GenerationResult>>> {
        async move { self.select_ordered(&self.result_table).await }.boxed()
    }

    fn remove_result<'a>(&'a self, key: &'a str) -> ChannelFuture<'a, bool> {
        async move {
            let removed: Option<Record<GenerationResult>> = self
                .db
                .delete((self.result_table.as_str(), key.to_string()))
                .await?;
            Ok(removed.is_some())
        }
        .boxed()
    }
}

/// Channel table definitions. Records are written by two processes, so the
/// tables stay schemaless; results are indexed by the correlation id.
fn channel_schema(task_table: &str, result_table: &str) -> Result<String, ChannelError> {
    for table in [task_table, result_table] {
        let valid = !table.is_empty()
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ChannelError::InvalidConfig(format!(
                "invalid table name: {table:?}"
            )));
        }
    }

    Ok(format!(
        r#"
DEFINE TABLE IF NOT EXISTS {task_table} SCHEMALESS;
DEFINE TABLE IF NOT EXISTS {result_table} SCHEMALESS;
DEFINE INDEX IF NOT EXISTS {result_table}_job ON {result_table} FIELDS job_id;
"#
    ))
}
