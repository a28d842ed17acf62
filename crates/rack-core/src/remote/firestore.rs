//! Firestore REST implementation of [`RemoteAdapter`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use super::credentials::{parse_api_error, Credentials};
use super::document::{
    decode_item, decode_last_updated, encode_item, metadata_document, Document,
    ListDocumentsResponse, LAST_UPDATED_FIELD, METADATA_DOCUMENT_ID,
};
use super::{RejectedDocument, RemoteAdapter, RemoteListing};
use crate::config::{SyncScope, SyncSettings};
use crate::error::{Error, Result};
use crate::models::{ClothingId, ClothingItem};
use crate::util::now;

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const CONNECTIVITY_PROBE_URL: &str = "http://www.gstatic.com/generate_204";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const LIST_PAGE_SIZE: &str = "300";
/// First try plus one retry after the credential is refreshed.
const AUTH_ATTEMPTS: usize = 2;

/// Remote adapter speaking the Firestore REST API.
#[derive(Debug)]
pub struct FirestoreRemote {
    documents_url: String,
    client: Client,
    credentials: Credentials,
}

impl FirestoreRemote {
    pub fn new(settings: &SyncSettings) -> Result<Self> {
        let project_id = settings.project_id.trim();
        if project_id.is_empty() {
            return Err(Error::InvalidInput(
                "Project id must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|error| Error::InvalidInput(format!("HTTP client setup failed: {error}")))?;

        Ok(Self {
            documents_url: format!(
                "{FIRESTORE_BASE_URL}/projects/{}/databases/(default)/documents",
                urlencoding::encode(project_id)
            ),
            credentials: Credentials::new(&settings.api_key, client.clone())?,
            client,
        })
    }

    fn collection_url(&self, scope: &SyncScope) -> String {
        format!(
            "{}/users/{}/clothing",
            self.documents_url,
            scope.path_segment()
        )
    }

    fn document_url(&self, scope: &SyncScope, id: ClothingId) -> String {
        format!("{}/{id}", self.collection_url(scope))
    }

    fn metadata_url(&self, scope: &SyncScope) -> String {
        format!("{}/{METADATA_DOCUMENT_ID}", self.collection_url(scope))
    }

    /// Send an authorized request, refreshing the credential once on 401.
    async fn send(&self, build: impl Fn(&Client) -> RequestBuilder + Send + Sync) -> Result<Response> {
        let mut last_error = None;

        for attempt in 1..=AUTH_ATTEMPTS {
            let token = self.credentials.bearer().await?;
            let response = build(&self.client).bearer_auth(token).send().await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let message = parse_api_error(StatusCode::UNAUTHORIZED, &body);
            tracing::debug!("Credential rejected on attempt {attempt}: {message}");
            self.credentials.invalidate().await;
            last_error = Some(Error::Auth(message));
        }

        Err(last_error.unwrap_or_else(|| Error::Auth("credential rejected".to_string())))
    }

    /// Record the write stamp on the metadata document.
    ///
    /// The stamp is only a freshness hint, so failures are logged, not returned.
    async fn touch_metadata(&self, scope: &SyncScope, stamp: DateTime<Utc>) {
        let url = self.metadata_url(scope);
        let body = metadata_document(stamp);
        let result = self
            .send(|client| {
                client
                    .patch(&url)
                    .query(&[("updateMask.fieldPaths", LAST_UPDATED_FIELD)])
                    .json(&body)
            })
            .await
            .and_then(|response| ensure_success(&response).map(|()| response));

        if let Err(error) = result {
            tracing::warn!("Failed to update remote watermark for {scope}: {error}");
        }
    }
}

/// Map a non-success status to the error taxonomy.
fn ensure_success(response: &Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(response.url().path().to_string()));
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return Err(Error::Connectivity(format!("HTTP {}", status.as_u16())));
    }
    Err(Error::RemoteRejected {
        status: status.as_u16(),
        message: status
            .canonical_reason()
            .unwrap_or("request refused")
            .to_string(),
    })
}

/// Like [`ensure_success`], but reads the error body for a better message.
async fn check(response: Response) -> Result<Response> {
    match ensure_success(&response) {
        Ok(()) => Ok(response),
        Err(Error::RemoteRejected { status, .. }) => {
            let code = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::RemoteRejected {
                status,
                message: parse_api_error(code, &body),
            })
        }
        Err(error) => Err(error),
    }
}

#[async_trait]
impl RemoteAdapter for FirestoreRemote {
    async fn is_online(&self) -> bool {
        match self
            .client
            .get(CONNECTIVITY_PROBE_URL)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Connectivity probe failed: {error}");
                false
            }
        }
    }

    async fn fetch_all(&self, scope: &SyncScope) -> Result<RemoteListing> {
        let url = self.collection_url(scope);
        let mut listing = RemoteListing::default();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.clone();
            let response = self
                .send(|client| {
                    let mut request = client.get(&url).query(&[("pageSize", LIST_PAGE_SIZE)]);
                    if let Some(token) = &token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;

            let page = match check(response).await {
                Ok(response) => response.json::<ListDocumentsResponse>().await?,
                // A scope nobody has written to yet lists as empty.
                Err(error) if error.is_not_found() => ListDocumentsResponse::default(),
                Err(error) => return Err(error),
            };

            match collect_page(&mut listing, page) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            "Listed {} remote records ({} rejected) for {scope}",
            listing.records.len(),
            listing.rejected.len()
        );
        Ok(listing)
    }

    async fn get(&self, scope: &SyncScope, id: ClothingId) -> Result<ClothingItem> {
        let url = self.document_url(scope, id);
        let response = self.send(|client| client.get(&url)).await?;
        let document = check(response).await?.json::<Document>().await?;
        decode_item(&document)
    }

    async fn upsert(&self, scope: &SyncScope, item: &ClothingItem) -> Result<()> {
        let url = self.document_url(scope, item.id);
        let body = encode_item(item);
        let response = self.send(|client| client.patch(&url).json(&body)).await?;
        check(response).await?;
        tracing::debug!("Upserted remote record {}", item.id);

        self.touch_metadata(scope, item.edited_at).await;
        Ok(())
    }

    async fn delete(&self, scope: &SyncScope, id: ClothingId) -> Result<bool> {
        let url = self.document_url(scope, id);
        let response = self
            .send(|client| {
                client
                    .delete(&url)
                    .query(&[("currentDocument.exists", "true")])
            })
            .await?;

        match check(response).await {
            Ok(_) => {}
            Err(error) if error.is_not_found() => return Ok(false),
            Err(error) => return Err(error),
        }
        tracing::debug!("Deleted remote record {id}");

        self.touch_metadata(scope, now()).await;
        Ok(true)
    }

    async fn last_updated(&self, scope: &SyncScope) -> Result<Option<DateTime<Utc>>> {
        let url = self.metadata_url(scope);
        let response = self.send(|client| client.get(&url)).await?;
        match check(response).await {
            Ok(response) => decode_last_updated(&response.json::<Document>().await?),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Fold one listing page into `listing`, returning the next page token.
///
/// The metadata sentinel is dropped. Documents that fail to decode are kept
/// as rejections instead of failing the page.
fn collect_page(listing: &mut RemoteListing, page: ListDocumentsResponse) -> Option<String> {
    for document in page.documents {
        if document.is_metadata() {
            continue;
        }
        match decode_item(&document) {
            Ok(item) => listing.records.push(item),
            Err(error) => {
                tracing::warn!("Skipping undecodable remote document: {error}");
                listing.rejected.push(RejectedDocument {
                    id: document.id().to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }

    page.next_page_token.filter(|token| !token.is_empty())
}
