//! Session-backed request identity.
//!
//! The authentication subsystem (outside this service's scope) persists the
//! user id, email and role into the session cookie at login; this extractor
//! reads them back so handlers never touch the session directly.

use actix_session::Session;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::domain::Error;

pub(crate) const USER_ID_KEY: &str = "user_id";
pub(crate) const USER_EMAIL_KEY: &str = "user_email";
pub(crate) const USER_ROLE_KEY: &str = "user_role";

const ADMIN_ROLES: [&str; 2] = ["admin", "super_admin"];

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier.
    pub user_id: Uuid,
    /// Email payment and tickets go to.
    pub email: String,
    /// Whether the caller holds an admin role.
    pub is_admin: bool,
}

impl Identity {
    /// Read the identity out of a session, if a complete one is present.
    pub fn from_session(session: &Session) -> Result<Option<Self>, Error> {
        let read = |key: &str| {
            session
                .get::<String>(key)
                .map_err(|error| Error::internal(format!("failed to read session: {error}")))
        };

        let Some(raw_id) = read(USER_ID_KEY)? else {
            return Ok(None);
        };
        let Ok(user_id) = Uuid::parse_str(&raw_id) else {
            tracing::warn!("invalid user id in session cookie");
            return Ok(None);
        };
        let Some(email) = read(USER_EMAIL_KEY)? else {
            return Ok(None);
        };
        let role = read(USER_ROLE_KEY)?.unwrap_or_default();
        Ok(Some(Self {
            user_id,
            email,
            is_admin: ADMIN_ROLES.contains(&role.as_str()),
        }))
    }

    /// Require an admin caller or fail with `403 Forbidden`.
    pub fn require_admin(&self) -> Result<(), Error> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::forbidden("Admin role required"))
        }
    }
}

impl FromRequest for Identity {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move {
            let session = fut.await?;
            let identity = Identity::from_session(&session)?
                .ok_or_else(|| Error::unauthorized("login required"))?;
            Ok(identity)
        })
    }
}
