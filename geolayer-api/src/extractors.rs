//! Request credential extraction.
//!
//! `apikey` and `authkey` are read from the query string, or from an
//! `application/x-www-form-urlencoded` body. Query values win when both are
//! present. Empty values count as absent.

use axum::{
    async_trait,
    extract::{FromRequest, Query, Request},
    http::{header::CONTENT_TYPE, Uri},
    Form,
};
use serde::Deserialize;

use crate::auth::SuperuserKey;
use crate::error::{ApiError, ApiResult};

/// Raw credential parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialParams {
    pub apikey: Option<String>,
    pub authkey: Option<String>,
}

impl CredentialParams {
    fn normalized(self) -> Self {
        Self {
            apikey: self.apikey.filter(|s| !s.is_empty()),
            authkey: self.authkey.filter(|s| !s.is_empty()),
        }
    }

    fn or(self, other: CredentialParams) -> Self {
        Self {
            apikey: self.apikey.or(other.apikey),
            authkey: self.authkey.or(other.authkey),
        }
    }
}

/// Credentials presented with a request.
#[derive(Debug, Clone, Default)]
pub struct Credentials(pub CredentialParams);

impl Credentials {
    /// Credentials from the query string only. A query that does not
    /// deserialize is a 400 with the usual JSON error body.
    pub fn from_uri(uri: &Uri) -> ApiResult<Self> {
        let Query(query) = Query::<CredentialParams>::try_from_uri(uri)
            .map_err(|e| ApiError::invalid_input(e.body_text()))?;
        Ok(Self(query.normalized()))
    }

    /// The presented API key, or 401.
    pub fn apikey(&self) -> ApiResult<&str> {
        self.0
            .apikey
            .as_deref()
            .ok_or_else(|| ApiError::unauthorized("apikey required"))
    }

    pub fn authkey(&self) -> Option<&str> {
        self.0.authkey.as_deref()
    }

    /// Reject unless the superuser key was presented.
    pub fn require_superuser(&self, key: &SuperuserKey) -> ApiResult<()> {
        key.require(self.authkey())
    }
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

#[async_trait]
impl<S> FromRequest<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Self(mut params) = Self::from_uri(req.uri())?;

        if is_form(&req) {
            let Form(form) = Form::<CredentialParams>::from_request(req, state)
                .await
                .map_err(|e| ApiError::invalid_input(e.body_text()))?;
            params = params.or(form.normalized());
        }

        Ok(Self(params))
    }
}
