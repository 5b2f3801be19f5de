//! HTTP request handlers

use super::types::{
    ContactListResponse, ContactResponse, ErrorResponse, EventAccepted, MessagesResponse,
    SendMessageRequest, SetTokensRequest, SuccessResponse, TokensResponse,
};
use super::AppState;
use crate::db::ProfileUpdate;
use crate::error::{BotError, ErrorKind};
use crate::runtime::{Dispatched, MessageStore, Storage, TokenStore};
use crate::transport::{identity_from_address, ChatTransport, InboundEvent, Media};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::ffi::OsStr;

/// Create the API router
pub fn create_router<S, T>(state: AppState<S, T>) -> Router
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    Router::new()
        // Inbound webhook from the chat bridge
        .route("/api/events", post(receive_event::<S, T>))
        // Contacts
        .route("/api/contacts", get(list_contacts::<S, T>))
        .route(
            "/api/contacts/:identity",
            get(get_contact::<S, T>).patch(update_contact::<S, T>),
        )
        .route(
            "/api/contacts/:identity/tokens",
            get(get_tokens::<S, T>).put(set_tokens::<S, T>),
        )
        .route("/api/contacts/:identity/messages", get(list_messages::<S, T>))
        // Operator sends
        .route("/api/messages", post(send_message::<S, T>))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Inbound Events
// ============================================================

async fn receive_event<S, T>(
    State(state): State<AppState<S, T>>,
    Json(event): Json<InboundEvent>,
) -> Result<(StatusCode, Json<EventAccepted>), AppError>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    let from = event.from.clone();

    // The flow runs on the sender's lane; the bridge is not kept waiting
    let queued = match state.dispatcher.dispatch(event).await {
        Dispatched::Queued(_) => true,
        Dispatched::Ignored | Dispatched::Closed => false,
        Dispatched::Invalid => {
            return Err(AppError::BadRequest(format!("No sender identity in {from:?}")));
        }
    };
    Ok((StatusCode::ACCEPTED, Json(EventAccepted { queued })))
}

// ============================================================
// Contacts
// ============================================================

async fn list_contacts<S, T>(State(state): State<AppState<S, T>>) -> Json<ContactListResponse>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    Json(ContactListResponse {
        contacts: state.dispatcher.registry().list().await,
    })
}

async fn get_contact<S, T>(
    State(state): State<AppState<S, T>>,
    Path(identity): Path<String>,
) -> Result<Json<ContactResponse>, AppError>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    let identity = identity_from_address(&identity);
    let contact = state
        .dispatcher
        .registry()
        .resolve(identity)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Contact not found: {identity}")))?;

    let tokens = match state.dispatcher.ledger().get(identity).await {
        Ok(count) => Some(count),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(ContactResponse { contact, tokens }))
}

async fn update_contact<S, T>(
    State(state): State<AppState<S, T>>,
    Path(identity): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ContactResponse>, AppError>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    let identity = identity_from_address(&identity);
    let contact = state.dispatcher.registry().update(identity, &update).await?;
    let tokens = state.dispatcher.storage().balance(identity).await?;
    Ok(Json(ContactResponse { contact, tokens }))
}

// ============================================================
// Tokens
// ============================================================

async fn get_tokens<S, T>(
    State(state): State<AppState<S, T>>,
    Path(identity): Path<String>,
) -> Result<Json<TokensResponse>, AppError>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    let identity = identity_from_address(&identity);
    let tokens = state.dispatcher.ledger().get(identity).await?;
    Ok(Json(TokensResponse {
        identity: identity.to_string(),
        tokens,
    }))
}

async fn set_tokens<S, T>(
    State(state): State<AppState<S, T>>,
    Path(identity): Path<String>,
    Json(req): Json<SetTokensRequest>,
) -> Result<Json<TokensResponse>, AppError>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    if req.count < 0 {
        return Err(AppError::BadRequest(
            "Token count cannot be negative".to_string(),
        ));
    }

    let identity = identity_from_address(&identity);
    if state.dispatcher.registry().resolve(identity).await?.is_none() {
        return Err(AppError::NotFound(format!("Contact not found: {identity}")));
    }

    state.dispatcher.ledger().set(identity, req.count).await?;
    Ok(Json(TokensResponse {
        identity: identity.to_string(),
        tokens: req.count,
    }))
}

// ============================================================
// Message Log
// ============================================================

async fn list_messages<S, T>(
    State(state): State<AppState<S, T>>,
    Path(identity): Path<String>,
) -> Result<Json<MessagesResponse>, AppError>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    let identity = identity_from_address(&identity);
    let messages = state.dispatcher.storage().messages_for(identity).await?;
    Ok(Json(MessagesResponse { messages }))
}

// ============================================================
// Operator Sends
// ============================================================

async fn send_message<S, T>(
    State(state): State<AppState<S, T>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SuccessResponse>, AppError>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    let identity = identity_from_address(req.phone.trim());
    if identity.is_empty() {
        return Err(AppError::BadRequest("Phone is required".to_string()));
    }

    let media = match req.media.as_deref() {
        Some(name) => Some(load_attachment(&state.files_dir, name).await?),
        None => None,
    };

    state
        .dispatcher
        .send_direct(identity, &req.message, media.as_ref())
        .await?;

    tracing::info!(contact = %identity, with_media = media.is_some(), "Operator message sent");
    Ok(Json(SuccessResponse { success: true }))
}

/// Read a file from the attachments directory. Only bare file names are
/// accepted.
async fn load_attachment(dir: &std::path::Path, name: &str) -> Result<Media, AppError> {
    let is_bare = std::path::Path::new(name).file_name() == Some(OsStr::new(name));
    if !is_bare {
        return Err(AppError::BadRequest(format!("Invalid media name: {name}")));
    }

    let path = dir.join(name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Media not found: {name}")));
        }
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };

    Ok(Media {
        mimetype: mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
        data: STANDARD.encode(bytes),
        filename: Some(name.to_string()),
    })
}

async fn get_version() -> &'static str {
    concat!("stickerbot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Unavailable(String),
    Internal(String),
}

impl From<BotError> for AppError {
    fn from(e: BotError) -> Self {
        match e.kind {
            ErrorKind::NotFound => AppError::NotFound(e.message),
            ErrorKind::TransportFailure => AppError::BadGateway(e.message),
            ErrorKind::StoreUnavailable => AppError::Unavailable(e.message),
            ErrorKind::InsufficientTokens | ErrorKind::InvalidInput => {
                AppError::BadRequest(e.message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
