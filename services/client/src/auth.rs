//! services/client/src/auth.rs
//!
//! Sign-in against the auth endpoint. Sign-out lives on the session it ends.

use gradebook_core::ports::{PortResult, Transport};
use gradebook_core::{endpoints, Api, Identity};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

/// Exchanges credentials for the identity and token of the signed-in user.
pub async fn sign_in(transport: Arc<dyn Transport>, login: &str, password: &str) -> PortResult<Identity> {
    let identity: Identity = Api::new(transport)
        .post(endpoints::login(), &LoginRequest { login, password })
        .await?;
    info!(
        "Signed in as {} ({:?})",
        identity.full_name, identity.role
    );
    Ok(identity)
}
