//! Per-request identity resolution. Three mechanisms are tried in
//! order: Bearer JWT, the X-WebService header pair used by travel
//! agencies, and the legacy X-User-Id header. A malformed JWT falls
//! through to the next mechanism; bad WebService credentials are fatal
//! so an agency never silently degrades to an anonymous customer.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aerovia_core::{password, CoreError, Principal, Role, UserAccount};

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

pub const WS_EMAIL_HEADER: &str = "X-WebService-Email";
pub const WS_PASSWORD_HEADER: &str = "X-WebService-Password";
pub const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: usize,
}

/// Signs a token for an account, mirroring what the login front door
/// issues. Used by operational tooling and the HTTP tests.
pub fn issue_token(
    auth: &AuthConfig,
    account: &UserAccount,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: account.id.to_string(),
        email: account.email.clone(),
        role: match account.role {
            Role::Customer => "CUSTOMER".to_string(),
            Role::TravelAgency => "TRAVEL_AGENCY".to_string(),
            Role::Admin => "ADMIN".to_string(),
        },
        name: Some(account.full_name()),
        exp: (chrono::Utc::now().timestamp() as usize) + auth.expiration as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.secret.as_bytes()),
    )
}

pub async fn resolve_principal(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = identify(&state, req.headers()).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

async fn identify(state: &AppState, headers: &HeaderMap) -> Result<Principal, AppError> {
    let mut attempted: Vec<&str> = Vec::new();

    // 1. Bearer JWT. Decode failures fall through so stale tokens do not
    // block the header mechanisms.
    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        attempted.push("Bearer JWT");
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            match decode::<Claims>(
                token,
                &DecodingKey::from_secret(state.auth.secret.as_bytes()),
                &Validation::default(),
            ) {
                Ok(data) => {
                    if let Ok(subject_id) = Uuid::parse_str(&data.claims.sub) {
                        let email = data.claims.email;
                        return Ok(Principal {
                            subject_id,
                            role: Role::from_claim(&data.claims.role),
                            display_name: data.claims.name.unwrap_or_else(|| email.clone()),
                            email,
                        });
                    }
                    tracing::debug!("sub del token no es un UUID, se prueba el siguiente mecanismo");
                }
                Err(err) => {
                    tracing::debug!(error = %err, "token JWT rechazado, se prueba el siguiente mecanismo");
                }
            }
        }
    }

    // 2. WebService header pair. Fatal on any failure.
    let ws_email = headers.get(WS_EMAIL_HEADER).and_then(|h| h.to_str().ok());
    let ws_password = headers
        .get(WS_PASSWORD_HEADER)
        .and_then(|h| h.to_str().ok());
    if ws_email.is_some() || ws_password.is_some() {
        let (Some(email), Some(pass)) = (ws_email, ws_password) else {
            return Err(CoreError::Unauthenticated(
                "Credenciales WebService requeridas: X-WebService-Email y X-WebService-Password"
                    .to_string(),
            )
            .into());
        };
        let account = state
            .accounts
            .find_by_email(email)
            .await?
            .filter(|a| password::verify(pass, &a.password_hash))
            .ok_or_else(|| {
                CoreError::Unauthenticated("Credenciales WebService inválidas".to_string())
            })?;
        if !account.enabled {
            return Err(
                CoreError::Unauthenticated("Usuario WebService deshabilitado".to_string()).into(),
            );
        }
        if account.role != Role::TravelAgency {
            return Err(
                CoreError::Unauthenticated("Usuario no es de tipo WebService".to_string()).into(),
            );
        }
        return Ok(Principal {
            subject_id: account.id,
            role: Role::TravelAgency,
            display_name: account.full_name(),
            email: account.email,
        });
    }

    // 3. Legacy X-User-Id. Never yields an agency principal.
    if let Some(raw) = headers.get(USER_ID_HEADER).and_then(|h| h.to_str().ok()) {
        attempted.push(USER_ID_HEADER);
        if let Ok(id) = Uuid::parse_str(raw) {
            if let Some(account) = state.accounts.find_by_id(id).await? {
                if account.enabled {
                    let role = match account.role {
                        Role::TravelAgency => Role::Customer,
                        other => other,
                    };
                    return Ok(Principal {
                        subject_id: account.id,
                        role,
                        display_name: account.full_name(),
                        email: account.email,
                    });
                }
            }
        }
    }

    let tried = if attempted.is_empty() {
        "ninguno".to_string()
    } else {
        attempted.join(", ")
    };
    Err(CoreError::Unauthenticated(format!(
        "No autenticado (mecanismos probados: {tried})"
    ))
    .into())
}
