//! Persistence for OAuth 2.0 authorizations and authorization consents.
//!
//! Both stores sit on top of the generic table/row [`Store`](crate::store::Store)
//! backend. Authorizations are keyed by their record id; consents are keyed
//! by `registered_client_id:principal_name`.

use crate::oauth::authorization::{Authorization, TokenKind};
use crate::oauth::record::AuthorizationRecord;
use crate::store::{Store, StoreBackend, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

const AUTHORIZATION_TABLE: &str = "oauth2:authorization";
const CONSENT_TABLE: &str = "oauth2:authorization:consent";

/// Authorization persistence with one-active-grant-per-subject semantics.
#[derive(Clone)]
pub struct AuthorizationStore {
    store: Arc<Store>,
}

impl AuthorizationStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persist an authorization, superseding any existing authorizations for
    /// the same principal and client.
    ///
    /// Supersede is scan-then-delete-then-insert and is not atomic: two
    /// concurrent saves for the same subject can interleave and leave both
    /// records behind until the next save cleans up.
    pub async fn save(&self, authorization: &Authorization) -> Result<(), StoreError> {
        let existing: Vec<AuthorizationRecord> = self.store.rows(AUTHORIZATION_TABLE).await?;
        for record in existing {
            if record.id != authorization.id
                && record.principal_name == authorization.principal_name
                && record.registered_client_id == authorization.registered_client_id
            {
                log::debug!(
                    "Superseding authorization {} for {}:{}",
                    record.id,
                    record.registered_client_id,
                    record.principal_name
                );
                self.store.delete(AUTHORIZATION_TABLE, &record.id).await?;
            }
        }

        let record = AuthorizationRecord::from_authorization(authorization);
        self.store
            .put(AUTHORIZATION_TABLE, &record.id, &record)
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Authorization>, StoreError> {
        let record: Option<AuthorizationRecord> =
            self.store.get(AUTHORIZATION_TABLE, id).await?;
        Ok(record.map(AuthorizationRecord::into_authorization))
    }

    /// Look up an authorization holding `value` under the given token kind.
    ///
    /// With `kind` set, only that token field is compared; with `None`, every
    /// token-bearing field is searched. The scan is over the full table.
    pub async fn find_by_token(
        &self,
        value: &str,
        kind: Option<TokenKind>,
    ) -> Result<Option<Authorization>, StoreError> {
        let records: Vec<AuthorizationRecord> = self.store.rows(AUTHORIZATION_TABLE).await?;
        Ok(records
            .into_iter()
            .find(|record| record.has_token(value, kind))
            .map(AuthorizationRecord::into_authorization))
    }

    pub async fn remove(&self, authorization: &Authorization) -> Result<(), StoreError> {
        self.store.delete(AUTHORIZATION_TABLE, &authorization.id).await
    }
}

/// Scopes a principal has granted to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentRecord {
    pub registered_client_id: String,
    pub principal_name: String,
    pub scopes: BTreeSet<String>,
}

impl ConsentRecord {
    pub fn new(registered_client_id: &str, principal_name: &str, scopes: BTreeSet<String>) -> Self {
        Self {
            registered_client_id: registered_client_id.to_string(),
            principal_name: principal_name.to_string(),
            scopes,
        }
    }

    fn row_key(&self) -> String {
        consent_key(&self.registered_client_id, &self.principal_name)
    }
}

fn consent_key(registered_client_id: &str, principal_name: &str) -> String {
    format!("{registered_client_id}:{principal_name}")
}

#[derive(Clone)]
pub struct ConsentStore {
    store: Arc<Store>,
}

impl ConsentStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Persist a consent, replacing the prior consent for the same
    /// client/principal pair. Scope merging is the caller's job.
    pub async fn save(&self, consent: &ConsentRecord) -> Result<(), StoreError> {
        self.store
            .put(CONSENT_TABLE, &consent.row_key(), consent)
            .await
    }

    pub async fn find(
        &self,
        registered_client_id: &str,
        principal_name: &str,
    ) -> Result<Option<ConsentRecord>, StoreError> {
        self.store
            .get(CONSENT_TABLE, &consent_key(registered_client_id, principal_name))
            .await
    }

    pub async fn remove(&self, consent: &ConsentRecord) -> Result<(), StoreError> {
        self.store.delete(CONSENT_TABLE, &consent.row_key()).await
    }
}
