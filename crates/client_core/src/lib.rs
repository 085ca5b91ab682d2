use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use reqwest::Client;
use shared::{
    domain::{UserId, UserRecord},
    error::OperationError,
    protocol::{CreateUserRequest, ErrorBody, UpdateUserRequest, UserSummary},
};
use tracing::{info, warn};
use url::Url;

pub mod confirm;
pub mod record_store;
pub mod session;
pub mod table_model;

pub use confirm::{ConfirmTarget, ConfirmationFlow};
pub use record_store::RecordStore;
pub use session::{
    logout, require_no_session, require_session, resolve, FileSessionStore, MemorySessionStore,
    Route, RouteDecision, SessionStore, SESSION_TOKEN_KEY,
};
pub use table_model::{
    project, Column, Projection, SelectionSet, SortDirection, TableModel, ViewParams,
};

/// Remote user-management surface. One production implementation talks
/// HTTP; tests substitute doubles at this seam.
#[async_trait]
pub trait UserApi: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserSummary>, OperationError>;
    async fn create_user(&self, request: &CreateUserRequest)
        -> Result<UserRecord, OperationError>;
    async fn update_user(
        &self,
        id: UserId,
        request: &UpdateUserRequest,
    ) -> Result<UserRecord, OperationError>;
    async fn delete_user(&self, id: UserId) -> Result<(), OperationError>;
}

#[async_trait]
impl<T: UserApi + ?Sized> UserApi for std::sync::Arc<T> {
    async fn list_users(&self) -> Result<Vec<UserSummary>, OperationError> {
        (**self).list_users().await
    }

    async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<UserRecord, OperationError> {
        (**self).create_user(request).await
    }

    async fn update_user(
        &self,
        id: UserId,
        request: &UpdateUserRequest,
    ) -> Result<UserRecord, OperationError> {
        (**self).update_user(id, request).await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), OperationError> {
        (**self).delete_user(id).await
    }
}

/// JSON-over-HTTP implementation of [`UserApi`].
#[derive(Debug, Clone)]
pub struct HttpUserApi {
    http: Client,
    base_url: String,
}

impl HttpUserApi {
    pub fn new(base_url: impl AsRef<str>) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url.as_ref()).context("invalid API base URL")?;
        Ok(Self {
            http: Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/api/users/", self.base_url)
    }

    fn item_url(&self, id: UserId) -> String {
        format!("{}/api/users/{}", self.base_url, id.0)
    }

    /// Turn a non-success response into `RemoteRejected`, preferring
    /// the server's `detail` body when one decodes.
    async fn decode_rejection(response: reqwest::Response) -> OperationError {
        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => match serde_json::from_slice::<ErrorBody>(&bytes) {
                Ok(body) => OperationError::rejected(status, body.detail.combined_message()),
                Err(_) => {
                    OperationError::rejected(status, format!("request failed with status {status}"))
                }
            },
            Err(err) => OperationError::transport(err.to_string()),
        }
    }
}

fn transport(err: reqwest::Error) -> OperationError {
    OperationError::transport(err.to_string())
}

#[async_trait]
impl UserApi for HttpUserApi {
    async fn list_users(&self) -> Result<Vec<UserSummary>, OperationError> {
        let response = self
            .http
            .get(self.collection_url())
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::decode_rejection(response).await);
        }
        response.json().await.map_err(transport)
    }

    async fn create_user(
        &self,
        request: &CreateUserRequest,
    ) -> Result<UserRecord, OperationError> {
        let response = self
            .http
            .post(self.collection_url())
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::decode_rejection(response).await);
        }
        response.json().await.map_err(transport)
    }

    async fn update_user(
        &self,
        id: UserId,
        request: &UpdateUserRequest,
    ) -> Result<UserRecord, OperationError> {
        let response = self
            .http
            .put(self.item_url(id))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::decode_rejection(response).await);
        }
        response.json().await.map_err(transport)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), OperationError> {
        let response = self
            .http
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::decode_rejection(response).await);
        }
        // The service may answer 204 with no body; any success status
        // counts.
        Ok(())
    }
}

/// Shape check equivalent to the usual `local@domain.tld` email
/// pattern: no whitespace, exactly one `@`, dotted non-empty domain.
pub fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((head, tld)) => !head.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// New-account form. Validated locally before any request is sent.
#[derive(Debug, Clone, Default)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl UserDraft {
    fn validate(&self) -> Result<CreateUserRequest, OperationError> {
        if self.name.chars().count() < 3 {
            return Err(OperationError::validation(
                "name must be at least 3 characters",
            ));
        }
        if self.email.is_empty() {
            return Err(OperationError::validation("email address is required"));
        }
        if !is_plausible_email(&self.email) {
            return Err(OperationError::validation("enter a valid email address"));
        }
        if self.password.is_empty() {
            return Err(OperationError::validation("password is required"));
        }
        if self.password.chars().count() < 8 {
            return Err(OperationError::validation(
                "password must be at least 8 characters",
            ));
        }
        if self.password != self.confirm_password {
            return Err(OperationError::validation("passwords do not match"));
        }
        Ok(CreateUserRequest {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }
}

/// Edit form, pre-filled from the record being edited. Password fields
/// stay empty unless the operator is changing the password.
#[derive(Debug, Clone, Default)]
pub struct EditForm {
    pub name: String,
    pub email: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl EditForm {
    pub fn for_record(record: &UserRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            ..Default::default()
        }
    }

    /// Minimal delta against the known current record. Only changed
    /// fields are included; a requested password change must carry the
    /// current password and a confirmed new one before anything is
    /// sent.
    fn delta(&self, current: &UserRecord) -> Result<UpdateUserRequest, OperationError> {
        if !self.name.is_empty() && self.name.chars().count() < 3 {
            return Err(OperationError::validation(
                "name must be at least 3 characters",
            ));
        }
        if !self.email.is_empty() && !is_plausible_email(&self.email) {
            return Err(OperationError::validation("enter a valid email address"));
        }

        let mut request = UpdateUserRequest::default();
        if self.name != current.name {
            request.name = Some(self.name.clone());
        }
        if self.email != current.email {
            request.email = Some(self.email.clone());
        }

        if !self.new_password.is_empty() {
            if self.new_password.chars().count() < 8 {
                return Err(OperationError::validation(
                    "new password must be at least 8 characters",
                ));
            }
            if self.current_password.is_empty() {
                return Err(OperationError::validation("current password is required"));
            }
            if self.new_password != self.confirm_password {
                return Err(OperationError::validation("new passwords do not match"));
            }
            request.current_password = Some(self.current_password.clone());
            request.new_password = Some(self.new_password.clone());
        }

        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Updated(UserRecord),
    /// Nothing differed from the current record; no request was sent.
    NoChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Edit,
    Delete,
    BulkDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Transient descriptor of one in-flight mutation. Created when an
/// operation starts, consumed via [`OperationCoordinator::take_ticket`]
/// once its outcome has been displayed.
#[derive(Debug, Clone)]
pub struct OperationTicket {
    pub kind: OperationKind,
    pub target_ids: HashSet<UserId>,
    pub status: TicketStatus,
    pub error_detail: Option<OperationError>,
}

/// Executes the four mutating operations against the remote service
/// and reconciles the record store with their outcomes. Errors never
/// mutate the store; nothing here retries on its own.
pub struct OperationCoordinator<A: UserApi> {
    api: A,
    ticket: Option<OperationTicket>,
}

impl<A: UserApi> OperationCoordinator<A> {
    pub fn new(api: A) -> Self {
        Self { api, ticket: None }
    }

    pub fn ticket(&self) -> Option<&OperationTicket> {
        self.ticket.as_ref()
    }

    /// Hand the settled ticket to the UI and forget it.
    pub fn take_ticket(&mut self) -> Option<OperationTicket> {
        self.ticket.take()
    }

    fn begin(&mut self, kind: OperationKind, target_ids: HashSet<UserId>) {
        self.ticket = Some(OperationTicket {
            kind,
            target_ids,
            status: TicketStatus::Pending,
            error_detail: None,
        });
    }

    fn settle(&mut self, error: Option<OperationError>) {
        if let Some(ticket) = self.ticket.as_mut() {
            ticket.status = match error {
                Some(_) => TicketStatus::Failed,
                None => TicketStatus::Succeeded,
            };
            ticket.error_detail = error;
        }
    }

    /// Fetch the full record set and replace the store with it. The
    /// list endpoint omits timestamps, so records are decorated with
    /// local defaults.
    pub async fn load_all(&mut self, store: &mut RecordStore) -> Result<usize, OperationError> {
        let summaries = self.api.list_users().await?;
        let now = Utc::now();
        let records: Vec<UserRecord> = summaries
            .into_iter()
            .map(|summary| UserRecord {
                id: summary.id,
                name: summary.name,
                email: summary.email,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
            .collect();
        let count = records.len();
        store.replace_all(records);
        info!(count, "loaded user records");
        Ok(count)
    }

    /// Create a new account. Validation failures and remote rejections
    /// leave the store untouched; a create is never partially applied.
    pub async fn create(
        &mut self,
        store: &mut RecordStore,
        draft: &UserDraft,
    ) -> Result<UserRecord, OperationError> {
        self.begin(OperationKind::Create, HashSet::new());
        let outcome = match draft.validate() {
            Ok(request) => self.api.create_user(&request).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(record) => {
                store.upsert(record.clone());
                self.settle(None);
                info!(user_id = record.id.0, "created user");
                Ok(record)
            }
            Err(err) => {
                warn!(error = %err, "create failed");
                self.settle(Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Update an account with the minimal field delta. The server's
    /// returned record is authoritative for the final field values.
    pub async fn edit(
        &mut self,
        store: &mut RecordStore,
        id: UserId,
        form: &EditForm,
    ) -> Result<EditOutcome, OperationError> {
        self.begin(OperationKind::Edit, HashSet::from([id]));
        let Some(current) = store.get(id).cloned() else {
            let err = OperationError::validation(format!("user {} is no longer listed", id.0));
            self.settle(Some(err.clone()));
            return Err(err);
        };
        let outcome = match form.delta(&current) {
            Ok(request) if request.is_empty() => {
                self.settle(None);
                return Ok(EditOutcome::NoChanges);
            }
            Ok(request) => self.api.update_user(id, &request).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(record) => {
                store.upsert(record.clone());
                self.settle(None);
                info!(user_id = id.0, "updated user");
                Ok(EditOutcome::Updated(record))
            }
            Err(err) => {
                warn!(user_id = id.0, error = %err, "edit failed");
                self.settle(Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Delete a single account. On failure the store keeps the record.
    pub async fn delete_one(
        &mut self,
        store: &mut RecordStore,
        id: UserId,
    ) -> Result<(), OperationError> {
        self.begin(OperationKind::Delete, HashSet::from([id]));
        match self.api.delete_user(id).await {
            Ok(()) => {
                store.remove_many(&[id]);
                self.settle(None);
                info!(user_id = id.0, "deleted user");
                Ok(())
            }
            Err(err) => {
                warn!(user_id = id.0, error = %err, "delete failed");
                self.settle(Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Delete several accounts: one call per id, issued concurrently,
    /// joined before deciding. The store is only touched when every
    /// call succeeded; a partial failure removes nothing, so the cache
    /// cannot silently diverge from the server.
    pub async fn delete_many(
        &mut self,
        store: &mut RecordStore,
        selection: &mut SelectionSet,
        ids: &[UserId],
    ) -> Result<usize, OperationError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.begin(OperationKind::BulkDelete, ids.iter().copied().collect());

        let api = &self.api;
        let results = join_all(
            ids.iter()
                .map(|id| async move { (*id, api.delete_user(*id).await) }),
        )
        .await;

        let mut failed_ids = Vec::new();
        let mut first_error = None;
        for (id, result) in results {
            if let Err(err) = result {
                if first_error.is_none() {
                    first_error = Some(err);
                }
                failed_ids.push(id);
            }
        }

        match first_error {
            None => {
                store.remove_many(ids);
                selection.clear();
                self.settle(None);
                info!(count = ids.len(), "bulk delete succeeded");
                Ok(ids.len())
            }
            Some(err) => {
                warn!(
                    failed = failed_ids.len(),
                    total = ids.len(),
                    error = %err,
                    "bulk delete failed, cache left untouched"
                );
                let listed = failed_ids
                    .iter()
                    .map(|id| id.0.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let prefix = format!(
                    "failed to delete {} of {} selected users (ids {listed})",
                    failed_ids.len(),
                    ids.len()
                );
                let aggregate = match err {
                    OperationError::RemoteRejected { status, message } => {
                        OperationError::rejected(status, format!("{prefix}: {message}"))
                    }
                    OperationError::Transport(message) => {
                        OperationError::transport(format!("{prefix}: {message}"))
                    }
                    OperationError::Validation(message) => {
                        OperationError::validation(format!("{prefix}: {message}"))
                    }
                };
                self.settle(Some(aggregate.clone()));
                Err(aggregate)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
