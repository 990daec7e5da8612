//! WebSocket upgrade handler for the realtime gateway.
//!
//! Route: `GET /ws`
//!
//! Checks run in this order, each failing with a JSON error before any
//! connection state is allocated:
//!
//! 1. Method must be `GET` (405)
//! 2. A user must have been resolved by `auth_middleware` (401)
//! 3. The `Origin` header must pass the origin policy (403)
//! 4. The request must be a valid upgrade (400)
//!
//! After the upgrade, [`run_connection`] owns the socket until it closes.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{
            close_code, rejection::WebSocketUpgradeRejection, CloseFrame, Message, WebSocket,
            WebSocketUpgrade,
        },
        State,
    },
    http::{
        header::{HOST, ORIGIN},
        HeaderMap, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use thiserror::Error;

use crate::adapters::http::middleware::OptionalAuth;
use crate::domain::foundation::AuthenticatedUser;
use crate::domain::realtime::OriginPolicy;
use crate::ports::{BrokerSubscription, MessageBroker};

use super::connection::{Connection, ConnectionSettings};
use super::registry::ConnectionRegistry;
use super::tasks::{keepalive_loop, read_loop, write_loop};

/// Shared state for the gateway route.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<ConnectionRegistry>,
    pub broker: Arc<dyn MessageBroker>,
    pub origin_policy: Arc<OriginPolicy>,
    pub settings: ConnectionSettings,
}

impl GatewayState {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broker: Arc<dyn MessageBroker>,
        origin_policy: OriginPolicy,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            registry,
            broker,
            origin_policy: Arc::new(origin_policy),
            settings,
        }
    }
}

/// Upgrade-time failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Origin not allowed")]
    OriginRejected,

    #[error("Not a valid WebSocket upgrade request")]
    UpgradeRequired(#[from] WebSocketUpgradeRejection),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::OriginRejected => StatusCode::FORBIDDEN,
            Self::UpgradeRequired(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::OriginRejected => "ORIGIN_REJECTED",
            Self::UpgradeRequired(_) => "UPGRADE_REQUIRED",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({
                "error": self.to_string(),
                "code": self.code()
            })),
        )
            .into_response()
    }
}

/// Handle WebSocket upgrade requests.
pub async fn ws_handler(
    State(state): State<GatewayState>,
    method: Method,
    headers: HeaderMap,
    OptionalAuth(user): OptionalAuth,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, GatewayError> {
    if method != Method::GET {
        return Err(GatewayError::MethodNotAllowed);
    }

    let user = user.ok_or(GatewayError::Unauthenticated)?;

    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    if !state.origin_policy.check(origin, host) {
        tracing::info!(
            user_id = %user.id,
            origin = origin.unwrap_or("<none>"),
            "Rejected WebSocket upgrade from disallowed origin"
        );
        return Err(GatewayError::OriginRejected);
    }

    let max_bytes = state.settings.max_message_bytes;
    let response = upgrade?
        .max_message_size(max_bytes)
        .max_frame_size(max_bytes)
        .on_upgrade(move |socket| run_connection(state, user, socket));

    Ok(response)
}

/// Own an upgraded socket until it closes.
///
/// Opens the private broker subscription, registers the connection
/// (superseding any previous one for the user), seeds the fixed topics,
/// then runs the read loop here while the write and keepalive loops run as
/// separate tasks. Every exit path unregisters the connection.
pub async fn run_connection(state: GatewayState, user: AuthenticatedUser, socket: WebSocket) {
    let (mut outbound, inbound) = socket.split();

    let BrokerSubscription { control, messages } = match state.broker.open_subscription().await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Broker subscription unavailable");
            let frame = Message::Close(Some(CloseFrame {
                code: close_code::ERROR,
                reason: Cow::Borrowed("broker unavailable"),
            }));
            let closed = tokio::time::timeout(state.settings.write_timeout, async {
                outbound.send(frame).await?;
                outbound.close().await
            })
            .await;
            match closed {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(user_id = %user.id, error = %e, "Failed to send close frame")
                }
                Err(_) => tracing::debug!(user_id = %user.id, "Close frame write timed out"),
            }
            return;
        }
    };

    let conn = Arc::new(Connection::new(
        user.id,
        Box::pin(outbound),
        control,
        state.settings,
    ));
    state.registry.register(Arc::clone(&conn)).await;

    if let Err(e) = conn.seed_fixed_topics().await {
        tracing::warn!(
            user_id = %conn.user(),
            connection_id = %conn.id(),
            error = %e,
            "Failed to subscribe fixed topics"
        );
        state.registry.unregister(&conn).await;
        return;
    }

    let writer = tokio::spawn(write_loop(Arc::clone(&conn), messages));
    let keepalive = tokio::spawn(keepalive_loop(Arc::clone(&conn)));

    read_loop(Arc::clone(&conn), inbound).await;

    state.registry.unregister(&conn).await;
    let _ = tokio::join!(writer, keepalive);
}

/// Create the axum router for the gateway endpoint.
///
/// The route accepts any method so non-GET requests get the gateway's
/// JSON 405 instead of an empty one.
pub fn websocket_router() -> Router<GatewayState> {
    Router::new().route("/ws", any(ws_handler))
}
