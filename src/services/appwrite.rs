use async_trait::async_trait;
use crate::models::{Connection, FilterPreferences, NotificationKind, Profile};
use crate::services::store::{ChatSink, NotificationSink, ProfileStore, StoreError};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with Appwrite
#[derive(Debug, Error)]
pub enum AppwriteError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    Conflict(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Appwrite rejects requests carrying more than 100 queries
const MAX_EXCLUSION_QUERIES: usize = 90;

/// Upper bound on candidate pages fetched per queue build
const MAX_CANDIDATE_PAGES: usize = 10;

/// Collection IDs in Appwrite
#[derive(Debug, Clone)]
pub struct AppwriteCollections {
    pub profiles: String,
    pub filter_preferences: String,
    pub blocks: String,
    pub notifications: String,
    pub chat_threads: String,
    pub messages: String,
}

/// Appwrite API client
///
/// Handles all communication with the Appwrite backend including:
/// - Fetching profiles and filter preferences
/// - Listing candidate profiles (minus blocked users)
/// - Writing match notifications
/// - Opening chat threads and forwarding opening messages
pub struct AppwriteClient {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    client: Client,
    collections: AppwriteCollections,
    candidate_fetch_limit: usize,
}

impl AppwriteClient {
    /// Create a new Appwrite client
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collections: AppwriteCollections,
        candidate_fetch_limit: usize,
    ) -> Result<Self, AppwriteError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            client,
            collections,
            candidate_fetch_limit,
        })
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            collection
        )
    }

    /// List documents matching Appwrite query strings
    async fn list_documents(
        &self,
        collection: &str,
        queries: &[String],
    ) -> Result<Vec<Value>, AppwriteError> {
        let params = queries
            .iter()
            .map(|q| format!("queries[]={}", urlencoding::encode(q)))
            .collect::<Vec<_>>()
            .join("&");

        let url = if params.is_empty() {
            self.documents_url(collection)
        } else {
            format!("{}?{}", self.documents_url(collection), params)
        };

        tracing::debug!("Listing documents from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, collection));
        }

        let json: Value = response.json().await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| AppwriteError::InvalidResponse("Missing documents array".into()))?;

        Ok(documents
            .iter()
            .map(|doc| doc.get("data").unwrap_or(doc).clone())
            .collect())
    }

    /// Create a document; `document_id` of `None` lets Appwrite assign one
    async fn create_document(
        &self,
        collection: &str,
        document_id: Option<String>,
        data: Value,
    ) -> Result<(), AppwriteError> {
        let payload = json!({
            "documentId": document_id.unwrap_or_else(|| "unique()".to_string()),
            "data": data,
        });

        let response = self
            .client
            .post(self.documents_url(collection))
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, collection));
        }

        Ok(())
    }

    /// Users the viewer blocked or was blocked by
    async fn blocked_ids(&self, user_id: &str) -> Result<HashSet<String>, AppwriteError> {
        let mut blocked = HashSet::new();

        let by_viewer = self
            .list_documents(&self.collections.blocks, &[equal_query("blockerId", user_id)])
            .await?;
        blocked.extend(by_viewer.iter().filter_map(|doc| string_field(doc, "blockedId")));

        let of_viewer = self
            .list_documents(&self.collections.blocks, &[equal_query("blockedId", user_id)])
            .await?;
        blocked.extend(of_viewer.iter().filter_map(|doc| string_field(doc, "blockerId")));

        Ok(blocked)
    }
}

fn status_error(status: StatusCode, context: &str) -> AppwriteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppwriteError::Unauthorized,
        StatusCode::NOT_FOUND => AppwriteError::NotFound(context.to_string()),
        StatusCode::CONFLICT => AppwriteError::Conflict(context.to_string()),
        other => AppwriteError::ApiError(format!("{} request failed: {}", context, other)),
    }
}

/// Quote a value for an Appwrite query string literal
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn equal_query(attribute: &str, value: &str) -> String {
    format!("equal(\"{}\", [{}])", attribute, quote(value))
}

fn not_equal_query(attribute: &str, value: &str) -> String {
    format!("notEqual(\"{}\", [{}])", attribute, quote(value))
}

fn string_field(doc: &Value, field: &str) -> Option<String> {
    doc.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

#[async_trait]
impl ProfileStore for AppwriteClient {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, StoreError> {
        let documents = self
            .list_documents(
                &self.collections.profiles,
                &[equal_query("userId", user_id), "limit(1)".to_string()],
            )
            .await?;

        let doc = documents
            .into_iter()
            .next()
            .ok_or_else(|| AppwriteError::NotFound(format!("Profile not found for user {}", user_id)))?;

        serde_json::from_value(doc)
            .map_err(|e| AppwriteError::InvalidResponse(format!("Failed to parse profile: {}", e)).into())
    }

    /// Users who never saved filters get permissive preferences
    async fn get_filter_preferences(&self, user_id: &str) -> Result<FilterPreferences, StoreError> {
        let documents = self
            .list_documents(
                &self.collections.filter_preferences,
                &[equal_query("userId", user_id), "limit(1)".to_string()],
            )
            .await?;

        match documents.into_iter().next() {
            Some(doc) => serde_json::from_value(doc).map_err(|e| {
                AppwriteError::InvalidResponse(format!("Failed to parse filter preferences: {}", e)).into()
            }),
            None => {
                tracing::debug!("No filter preferences for {}, using defaults", user_id);
                Ok(FilterPreferences::permissive(user_id))
            }
        }
    }

    async fn list_candidates(
        &self,
        viewer_id: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<Profile>, StoreError> {
        let blocked = self.blocked_ids(viewer_id).await?;

        // Exclusions past the query cap are dropped client-side
        let mut base_queries = vec![
            "equal(\"isActive\", [true])".to_string(),
            not_equal_query("userId", viewer_id),
        ];
        let mut pushed = HashSet::new();
        for id in exclude_ids.iter().chain(blocked.iter()) {
            if pushed.len() >= MAX_EXCLUSION_QUERIES {
                break;
            }
            if id != viewer_id && pushed.insert(id.as_str()) {
                base_queries.push(not_equal_query("userId", id));
            }
        }

        let page_size = self.candidate_fetch_limit;
        let mut profiles: Vec<Profile> = Vec::new();
        let mut total = 0;

        for page in 0..MAX_CANDIDATE_PAGES {
            let mut queries = base_queries.clone();
            queries.push(format!("limit({})", page_size));
            queries.push(format!("offset({})", page * page_size));

            let documents = self.list_documents(&self.collections.profiles, &queries).await?;
            let fetched = documents.len();
            total += fetched;

            profiles.extend(
                documents
                    .into_iter()
                    .filter_map(|doc| match serde_json::from_value::<Profile>(doc) {
                        Ok(profile) => Some(profile),
                        Err(e) => {
                            tracing::warn!("Skipping malformed profile document: {}", e);
                            None
                        }
                    })
                    .filter(|p| {
                        p.user_id != viewer_id
                            && !blocked.contains(&p.user_id)
                            && !exclude_ids.contains(&p.user_id)
                    }),
            );

            if fetched < page_size || profiles.len() >= page_size {
                break;
            }
        }
        profiles.truncate(page_size);

        tracing::debug!(
            "Listed {} candidates for {} ({} fetched, {} blocked)",
            profiles.len(),
            viewer_id,
            total,
            blocked.len()
        );

        Ok(profiles)
    }
}

#[async_trait]
impl NotificationSink for AppwriteClient {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: Value,
    ) -> Result<(), StoreError> {
        let data = json!({
            "userId": user_id,
            "kind": kind.as_str(),
            "payload": payload.to_string(),
            "createdAt": chrono::Utc::now(),
        });

        self.create_document(&self.collections.notifications, None, data).await?;

        tracing::debug!("Queued {} notification for {}", kind.as_str(), user_id);
        Ok(())
    }
}

#[async_trait]
impl ChatSink for AppwriteClient {
    /// The thread document id is the connection id, so a repeated open is a
    /// conflict we can ignore
    async fn open_thread(&self, connection: &Connection) -> Result<(), StoreError> {
        let data = json!({
            "connectionId": connection.id.to_string(),
            "participants": [connection.user_low, connection.user_high],
            "createdAt": connection.created_at,
        });

        match self
            .create_document(&self.collections.chat_threads, Some(connection.id.to_string()), data)
            .await
        {
            Ok(()) | Err(AppwriteError::Conflict(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn forward_message(
        &self,
        connection: &Connection,
        sender_id: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        let data = json!({
            "threadId": connection.id.to_string(),
            "senderId": sender_id,
            "body": body,
            "createdAt": chrono::Utc::now(),
        });

        self.create_document(&self.collections.messages, None, data).await?;
        Ok(())
    }
}
