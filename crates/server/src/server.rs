use std::{sync::Arc, time::Instant};

use axum::{
    Extension, Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};

use crate::{checkins, users};
use engine::{Engine, User};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"accelerator\"")],
    )
        .into_response()
}

/// Basic auth against the users table; the user becomes a request extension.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(auth_header)) = auth_header else {
        return unauthorized();
    };

    let user = match state
        .engine
        .authenticate(auth_header.username(), auth_header.password())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return unauthorized(),
        Err(err) => {
            tracing::error!("authentication failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Log every authenticated action with its outcome.
async fn record_user_action(
    Extension(user): Extension<User>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        user_id = user.id,
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "user_action"
    );
    response
}

/// The full router. Exposed so tests can drive it without a socket.
pub fn app(state: ServerState) -> Router {
    let recorded = Router::new()
        .route("/users", get(users::index))
        .route(
            "/users/me/account_type",
            get(users::account_type).post(users::update_account_type),
        )
        .route("/users/me/chat", get(users::chat))
        .route("/users/me/welcome", get(users::welcome).post(users::complete_welcome))
        .route("/users/me/notifications", get(users::notifications))
        .route("/users/{id}", get(users::show).post(users::update))
        .route("/users/{id}/edit", get(users::edit))
        .route("/users/{id}/complete_account", get(users::complete_account))
        .route("/checkins", post(checkins::create))
        .route("/checkins/next", get(checkins::next))
        .route("/checkins/current", get(checkins::current))
        .route("/checkins/{id}", get(checkins::show).post(checkins::update))
        .route("/checkins/{id}/comments", post(checkins::comment))
        .route("/startups/{id}/checkins", get(checkins::for_startup))
        .route_layer(middleware::from_fn(record_user_action));

    // Chat resets are not recorded.
    let unrecorded = Router::new().route("/users/me/chat/reset", post(users::reset_chat));

    recorded
        .merge(unrecorded)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(engine: Engine, bind: &str) {
    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {bind}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, app(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
