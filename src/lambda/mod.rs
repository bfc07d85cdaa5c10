// src/lambda/mod.rs

//! AWS Lambda handler for the directory.
//!
//! Each invocation carries one action. The `Directory` is built once per
//! Lambda instance and shared across invocations, so the slug index and
//! refresh timestamps live as long as the instance does.

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::{Config, DraftRecord, FilterCriteria, RecordId};
use crate::services::Directory;

/// Lambda invocation payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DirectoryRequest {
    List,
    Get { id: RecordId },
    GetBySlug { slug: String },
    Filter {
        #[serde(flatten)]
        criteria: FilterCriteria,
    },
    Create { draft: DraftRecord },
    SlugEntries,
    Status,
    Refresh,
    SetEnabled { enabled: bool },
}

impl DirectoryRequest {
    fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get { .. } => "get",
            Self::GetBySlug { .. } => "get_by_slug",
            Self::Filter { .. } => "filter",
            Self::Create { .. } => "create",
            Self::SlugEntries => "slug_entries",
            Self::Status => "status",
            Self::Refresh => "refresh",
            Self::SetEnabled { .. } => "set_enabled",
        }
    }
}

/// Lambda response payload.
#[derive(Debug, Serialize, Default)]
pub struct DirectoryResponse {
    pub success: bool,

    /// Action result; `null` for a missing record
    pub data: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub execution_time_ms: u64,
}

/// Build the per-instance directory from defaults plus environment.
pub async fn init_directory() -> Result<Arc<Directory>> {
    let mut config = Config::default();
    config.apply_env();
    config.validate()?;

    let directory = Directory::from_config(&config)?;
    if let Err(e) = directory.warm_up().await {
        error!("Warm-up failed, index will build lazily: {}", e);
    }
    Ok(Arc::new(directory))
}

/// Main Lambda handler function.
#[instrument(skip(directory, event))]
pub async fn handler(
    directory: Arc<Directory>,
    event: LambdaEvent<DirectoryRequest>,
) -> std::result::Result<DirectoryResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();
    let action = request.name();
    info!("Handling action: {}", action);

    let elapsed = || u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    match dispatch(&directory, request).await {
        Ok(data) => Ok(DirectoryResponse {
            success: true,
            data,
            error: None,
            execution_time_ms: elapsed(),
        }),
        Err(e) => {
            error!("Action {} failed: {}", action, e);
            Ok(DirectoryResponse {
                success: false,
                error: Some(e.to_string()),
                execution_time_ms: elapsed(),
                ..Default::default()
            })
        }
    }
}

async fn dispatch(directory: &Directory, request: DirectoryRequest) -> Result<Value> {
    let data = match request {
        DirectoryRequest::List => serde_json::to_value(directory.list().await)?,
        DirectoryRequest::Get { id } => serde_json::to_value(directory.get_by_id(id).await)?,
        DirectoryRequest::GetBySlug { slug } => {
            serde_json::to_value(directory.get_by_slug(&slug).await)?
        }
        DirectoryRequest::Filter { criteria } => {
            serde_json::to_value(directory.filter(&criteria).await)?
        }
        DirectoryRequest::Create { draft } => serde_json::to_value(directory.create(draft).await?)?,
        DirectoryRequest::SlugEntries => serde_json::to_value(directory.slug_entries().await)?,
        DirectoryRequest::Status => serde_json::to_value(directory.status())?,
        DirectoryRequest::Refresh => serde_json::to_value(directory.refresh().await)?,
        DirectoryRequest::SetEnabled { enabled } => {
            directory.set_enabled(enabled);
            serde_json::to_value(directory.status())?
        }
    };
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RefreshConfig;
    use crate::storage::InMemoryStore;

    fn directory() -> Directory {
        Directory::new(Arc::new(InMemoryStore::seeded()), &RefreshConfig::default())
    }

    #[test]
    fn test_request_parsing() {
        let req: DirectoryRequest = serde_json::from_str(r#"{"action": "list"}"#).unwrap();
        assert!(matches!(req, DirectoryRequest::List));

        let req: DirectoryRequest =
            serde_json::from_str(r#"{"action": "get_by_slug", "slug": "fables-books"}"#).unwrap();
        assert!(matches!(req, DirectoryRequest::GetBySlug { ref slug } if slug == "fables-books"));

        let req: DirectoryRequest =
            serde_json::from_str(r#"{"action": "filter", "state": "CA", "feature_ids": [1]}"#)
                .unwrap();
        match req {
            DirectoryRequest::Filter { criteria } => {
                assert_eq!(criteria.state.as_deref(), Some("CA"));
                assert_eq!(criteria.feature_ids, vec![1]);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(serde_json::from_str::<DirectoryRequest>(r#"{"action": "drop_table"}"#).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_get_by_slug() {
        let directory = directory();
        let data = dispatch(
            &directory,
            DirectoryRequest::GetBySlug {
                slug: "fables-books".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(data["name"], "Fables Books");

        let missing = dispatch(
            &directory,
            DirectoryRequest::GetBySlug {
                slug: "unknown-shop".into(),
            },
        )
        .await
        .unwrap();
        assert!(missing.is_null());
    }

    #[tokio::test]
    async fn test_dispatch_set_enabled_reports_status() {
        let directory = directory();
        let data = dispatch(&directory, DirectoryRequest::SetEnabled { enabled: false })
            .await
            .unwrap();
        assert_eq!(data["enabled"], false);
    }

    #[tokio::test]
    async fn test_dispatch_refresh_on_always_current_is_skipped() {
        let directory = directory();
        let data = dispatch(&directory, DirectoryRequest::Refresh).await.unwrap();
        assert_eq!(data["outcome"], "skipped");
        assert_eq!(data["reason"], "always_current");
    }
}
