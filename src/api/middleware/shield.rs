use crate::api::handlers::AppState;
use crate::auth::middleware::{optional_session, AuthUser};
use crate::core::config::ShieldMode;
use crate::core::error::WardenError;
use crate::shield::{RequestProfile, Tier};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};

/// Security gate middleware
///
/// Runs ahead of every business route:
/// - Builds a [`RequestProfile`] from the connection, headers and any valid session
/// - Asks the configured oracle for a verdict
/// - Rejects with 403 (plus `Retry-After` for rate limits) when denied
/// - Fails closed with 503 when the oracle cannot decide, or denies without
///   saying why
///
/// In dry-run mode denials are logged and the request continues.
pub async fn shield_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = optional_session(request.headers(), &state.codec);
    let profile = build_profile(
        &request,
        session.as_ref(),
        state.config.shield.trust_forwarded_headers,
    );

    let decision = match state.oracle.classify(&profile).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(
                error = %e,
                client_ip = %profile.client_ip,
                path = %profile.path_and_query,
                "Security oracle failed, rejecting request"
            );
            return WardenError::GateUnavailable(e.to_string()).into_response();
        }
    };

    if !decision.allowed {
        let Some(reason) = decision.reason else {
            tracing::error!(
                client_ip = %profile.client_ip,
                path = %profile.path_and_query,
                "Security oracle denied without a reason, rejecting request"
            );
            return WardenError::GateUnavailable("denial without a reason".to_string())
                .into_response();
        };

        let identity = profile.identity.as_deref().unwrap_or("anonymous");
        let dry_run = state.config.shield.mode == ShieldMode::DryRun;

        tracing::warn!(
            reason = %reason,
            identity = %identity,
            role = %profile.tier,
            client_ip = %profile.client_ip,
            method = %profile.method,
            path = %profile.path_and_query,
            dry_run,
            "Request denied by security gate"
        );

        if !dry_run {
            return WardenError::Forbidden {
                reason,
                retry_after: decision.retry_after,
            }
            .into_response();
        }
    }

    if let Some(user) = session {
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

fn build_profile(
    request: &Request,
    session: Option<&AuthUser>,
    trust_forwarded: bool,
) -> RequestProfile {
    let headers = request.headers();

    RequestProfile {
        client_ip: client_ip(request, trust_forwarded),
        identity: session.map(|user| user.id.clone()),
        tier: Tier::from(session.map(|user| user.role)),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        method: request.method().to_string(),
        path_and_query: request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string()),
    }
}

/// Extract client IP address from request
///
/// Forwarding headers are only honoured behind a trusted proxy:
/// 1. X-Forwarded-For (first entry is the client)
/// 2. X-Real-IP
/// 3. The peer address of the connection
///
/// Requests served without connection info (tests, in-process calls) fall
/// back to loopback.
fn client_ip(request: &Request, trust_forwarded: bool) -> IpAddr {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return ip;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_forwarded_for = headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    from_forwarded_for.or_else(|| {
        headers
            .get("X-Real-IP")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    })
}
