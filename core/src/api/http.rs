//! HTTP route handlers (§6's "HTTP surface" collaborator contracts).
//!
//! Handlers are thin: configuration mutations clone the active snapshot, mutate,
//! validate, and atomically swap it in, then broadcast a `*_changed` event so clients
//! refetch; DMX-affecting commands are pushed onto the engine's queue exactly as the
//! WebSocket handler does. A rejected mutation (failed validation) never swaps in the
//! new snapshot and never broadcasts (§7).

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::api::response::{api_error, api_ok, api_success};
use crate::api::ws::ws_handler;
use crate::api::{resolve_profile, AppState};
use crate::auth::{check_permission, GatedAction};
use crate::command::Command;
use crate::config::ConfigSnapshot;
use crate::error::{DmxxError, DmxxResult};
use crate::events::ServerEvent;
use crate::model::fixture::Fixture;
use crate::model::group::{Grid, Group};
use crate::model::mapping::MappingTable;
use crate::model::patch::Patch;
use crate::model::profile::AccessProfile;
use crate::model::scene::{Scene, TransitionType};
use crate::model::universe::Universe;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/auth/login", post(login))
        .route("/api/auth/status", get(auth_status))
        .route("/api/universes", get(list_universes).post(upsert_universe))
        .route("/api/universes/{id}", axum::routing::delete(delete_universe))
        .route("/api/scenes", get(list_scenes).post(upsert_scene))
        .route("/api/scenes/{id}", axum::routing::delete(delete_scene))
        .route("/api/scenes/{id}/recall", post(recall_scene))
        .route("/api/groups", get(list_groups).post(upsert_group))
        .route("/api/groups/{id}", axum::routing::delete(delete_group))
        .route("/api/groups/{id}/master", post(set_group_master))
        .route("/api/grids", get(list_grids).post(upsert_grid))
        .route("/api/patch", get(list_patches).post(upsert_patch))
        .route("/api/patch/{id}", axum::routing::delete(delete_patch))
        .route("/api/fixtures", get(list_fixtures).post(upsert_fixture))
        .route("/api/fixtures/{id}", axum::routing::delete(delete_fixture))
        .route("/api/io", get(list_io))
        .route("/api/io/bypass", post(set_input_bypass))
        .route("/api/mapping", get(list_mapping).post(upsert_mapping))
        .route("/api/mapping/{name}", axum::routing::delete(delete_mapping))
        .route("/api/profiles", get(list_profiles).post(upsert_profile))
        .route("/api/settings", get(get_settings))
        .route("/api/dmx/park", post(park_channel))
        .route("/api/dmx/unpark", post(unpark_channel))
        .route("/api/dmx/highlight", post(set_highlight))
        .route("/api/dmx/blackout", post(set_blackout))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    api_success(json!({ "status": "ok" }))
}

/// Ready once at least one universe is configured; an empty snapshot means the HTTP
/// collaborator hasn't finished loading persisted configuration yet.
async fn readiness_check(State(state): State<AppState>) -> Response {
    let snapshot = state.snapshot.load_full();
    if snapshot.universes.is_empty() {
        return api_error(StatusCode::SERVICE_UNAVAILABLE, "not_ready", "no universes configured").into_response();
    }
    api_success(json!({ "status": "ready", "universes": snapshot.universes.len() })).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginRequest {
    password: String,
    #[serde(default)]
    client_fingerprint: String,
}

async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> DmxxResult<impl IntoResponse> {
    let grant = crate::auth::login(
        &state.config,
        &payload.password,
        &payload.client_fingerprint,
        AccessProfile::admin(),
    )?;
    log::info!("[http] login success from {}", addr.ip());
    Ok(api_success(json!({
        "access_token": grant.token,
        "profile_name": grant.profile.name,
        "allowed_pages": grant.profile.allowed_pages,
        "allowed_grids": grant.profile.allowed_grids,
        "allowed_scenes": grant.profile.allowed_scenes,
        "is_admin": grant.profile.is_admin,
        "can_park": grant.profile.can_park,
        "can_highlight": grant.profile.can_highlight,
        "can_bypass": grant.profile.can_bypass,
    })))
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

async fn auth_status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::extract::Query(query): axum::extract::Query<TokenQuery>,
) -> impl IntoResponse {
    match resolve_profile(&state, addr, query.token) {
        Some(profile) => api_success(json!({
            "authenticated": true,
            "ip": addr.ip().to_string(),
            "profile_name": profile.name,
            "is_admin": profile.is_admin,
            "allowed_pages": profile.allowed_pages,
            "allowed_grids": profile.allowed_grids,
            "allowed_scenes": profile.allowed_scenes,
            "can_park": profile.can_park,
            "can_highlight": profile.can_highlight,
            "can_bypass": profile.can_bypass,
        })),
        None => api_success(json!({ "authenticated": false, "ip": addr.ip().to_string() })),
    }
}

/// Resolves the caller's profile from a `token` query parameter, rejecting with 401 if
/// no profile could be resolved. CRUD handlers that require admin-equivalent access use
/// this directly rather than threading an extractor through every route.
fn require_profile(state: &AppState, addr: SocketAddr, token: Option<String>) -> Result<AccessProfile, DmxxError> {
    resolve_profile(state, addr, token).ok_or_else(|| DmxxError::AuthFailed("no token or whitelist match".to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Generic snapshot mutation helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Inserts or replaces the item in `items` whose `id_of` matches `item`'s, matching
/// §9's "atomic replacement, no in-place mutation" snapshot-swap contract one level
/// down: each CRUD handler builds the whole new `items` vector before the snapshot
/// itself is swapped.
fn upsert<T, I: PartialEq>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> I) {
    let key = id_of(&item);
    match items.iter().position(|existing| id_of(existing) == key) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

/// Clones the active snapshot, applies `mutate`, validates, and only on success
/// atomically swaps it in and notifies the engine and connected clients. A validation
/// failure leaves the previous snapshot untouched and emits no event (§7).
async fn mutate_snapshot(
    state: &AppState,
    mutate: impl FnOnce(&mut ConfigSnapshot),
    changed_event: ServerEvent,
) -> DmxxResult<()> {
    let mut snapshot = (*state.snapshot.load_full()).clone();
    mutate(&mut snapshot);
    snapshot.validate()?;
    state.snapshot.store(std::sync::Arc::new(snapshot));
    let _ = state.commands.send(Command::ConfigSnapshotChanged).await;
    state.event_bridge_emit(changed_event);
    Ok(())
}

impl AppState {
    /// Discards the send error: a broadcast with zero subscribers is not a failure.
    fn event_bridge_emit(&self, event: ServerEvent) {
        use crate::events::EventEmitter;
        self.event_bridge.emit(event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Universes / IO
// ─────────────────────────────────────────────────────────────────────────────

async fn list_universes(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().universes.clone())
}

async fn upsert_universe(State(state): State<AppState>, Json(universe): Json<Universe>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.universes, universe, |u| u.id),
        ServerEvent::IoChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn delete_universe(State(state): State<AppState>, Path(id): Path<u32>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| snapshot.universes.retain(|u| u.id != id),
        ServerEvent::IoChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn list_io(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot.load_full();
    let io: Vec<_> = snapshot
        .universes
        .iter()
        .map(|u| json!({ "universe_id": u.id, "input": u.input, "output": u.output, "passthrough_mode": u.passthrough_mode }))
        .collect();
    api_success(io)
}

#[derive(Deserialize)]
struct InputBypassRequest {
    universe_id: u32,
    active: bool,
}

async fn set_input_bypass(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::extract::Query(query): axum::extract::Query<TokenQuery>,
    Json(payload): Json<InputBypassRequest>,
) -> DmxxResult<impl IntoResponse> {
    let profile = require_profile(&state, addr, query.token)?;
    check_permission(&profile, GatedAction::InputBypass)?;
    state
        .commands
        .send(Command::SetInputBypass { universe_id: payload.universe_id, active: payload.active, client_id: 0 })
        .await
        .map_err(|_| DmxxError::Internal("engine is not accepting commands".to_string()))?;
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenes
// ─────────────────────────────────────────────────────────────────────────────

async fn list_scenes(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().scenes.clone())
}

async fn upsert_scene(State(state): State<AppState>, Json(scene): Json<Scene>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.scenes, scene, |s| s.id),
        ServerEvent::ScenesChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn delete_scene(State(state): State<AppState>, Path(id): Path<u64>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| snapshot.scenes.retain(|s| s.id != id),
        ServerEvent::ScenesChanged,
    )
    .await?;
    Ok(api_ok())
}

#[derive(Deserialize, Default)]
struct RecallSceneRequest {
    transition_override: Option<TransitionType>,
}

async fn recall_scene(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    body: Option<Json<RecallSceneRequest>>,
) -> DmxxResult<impl IntoResponse> {
    let snapshot = state.snapshot.load_full();
    if snapshot.scene(id).is_none() {
        return Err(DmxxError::SceneNotFound(id.to_string()));
    }
    let transition_override = body.map(|Json(b)| b.transition_override).unwrap_or(None);
    state
        .commands
        .send(Command::RecallScene { scene_id: id, transition_override, client_id: 0 })
        .await
        .map_err(|_| DmxxError::Internal("engine is not accepting commands".to_string()))?;
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Groups / Grids
// ─────────────────────────────────────────────────────────────────────────────

async fn list_groups(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().groups.clone())
}

async fn upsert_group(State(state): State<AppState>, Json(group): Json<Group>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.groups, group, |g| g.id),
        ServerEvent::GroupsChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn delete_group(State(state): State<AppState>, Path(id): Path<u64>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| snapshot.groups.retain(|g| g.id != id),
        ServerEvent::GroupsChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn list_grids(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().grids.clone())
}

async fn upsert_grid(State(state): State<AppState>, Json(grid): Json<Grid>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.grids, grid, |g| g.id),
        ServerEvent::GroupsChanged,
    )
    .await?;
    Ok(api_ok())
}

#[derive(Deserialize)]
struct GroupMasterRequest {
    value: u8,
}

async fn set_group_master(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(payload): Json<GroupMasterRequest>,
) -> DmxxResult<impl IntoResponse> {
    let snapshot = state.snapshot.load_full();
    if snapshot.group(id).is_none() {
        return Err(DmxxError::GroupNotFound(id.to_string()));
    }
    state
        .commands
        .send(Command::SetGroupMaster { group_id: id, value: payload.value, client_id: 0 })
        .await
        .map_err(|_| DmxxError::Internal("engine is not accepting commands".to_string()))?;
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Patch / Fixtures
// ─────────────────────────────────────────────────────────────────────────────

async fn list_patches(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().patches.clone())
}

async fn upsert_patch(State(state): State<AppState>, Json(patch): Json<Patch>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.patches, patch, |p| p.id),
        ServerEvent::PatchesChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn delete_patch(State(state): State<AppState>, Path(id): Path<u64>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| snapshot.patches.retain(|p| p.id != id),
        ServerEvent::PatchesChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn list_fixtures(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().fixtures.clone())
}

async fn upsert_fixture(State(state): State<AppState>, Json(fixture): Json<Fixture>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.fixtures, fixture, |f| f.id),
        ServerEvent::FixturesChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn delete_fixture(State(state): State<AppState>, Path(id): Path<u64>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| snapshot.fixtures.retain(|f| f.id != id),
        ServerEvent::FixturesChanged,
    )
    .await?;
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Mapping / Profiles / Settings
// ─────────────────────────────────────────────────────────────────────────────

async fn list_mapping(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().mapping_tables.clone())
}

async fn upsert_mapping(State(state): State<AppState>, Json(table): Json<MappingTable>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.mapping_tables, table, |t| t.name.clone()),
        ServerEvent::MappingChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn delete_mapping(State(state): State<AppState>, Path(name): Path<String>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| snapshot.mapping_tables.retain(|t| t.name != name),
        ServerEvent::MappingChanged,
    )
    .await?;
    Ok(api_ok())
}

async fn list_profiles(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.snapshot.load_full().profiles.clone())
}

async fn upsert_profile(State(state): State<AppState>, Json(profile): Json<AccessProfile>) -> DmxxResult<impl IntoResponse> {
    mutate_snapshot(
        &state,
        |snapshot| upsert(&mut snapshot.profiles, profile, |p| p.name.clone()),
        ServerEvent::IoChanged,
    )
    .await?;
    Ok(api_ok())
}

/// Settings (host/port/credentials/whitelist) are read-only from the core's own
/// perspective (§6: "the core treats the file as an input"); this endpoint exposes the
/// currently-loaded values for display without an associated broadcast event, since no
/// `*_changed` event name in §4.J corresponds to server settings.
async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "host": state.config.host,
        "port": state.config.port,
        "output_rate_hz": state.config.output_rate_hz,
        "ip_whitelist": state.config.ip_whitelist,
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// DMX modifiers (park/highlight/blackout)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ParkRequest {
    universe_id: u32,
    channel: u16,
    value: u8,
}

async fn park_channel(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::extract::Query(query): axum::extract::Query<TokenQuery>,
    Json(payload): Json<ParkRequest>,
) -> DmxxResult<impl IntoResponse> {
    let profile = require_profile(&state, addr, query.token)?;
    check_permission(&profile, GatedAction::Park)?;
    state
        .commands
        .send(Command::Park { universe_id: payload.universe_id, channel: payload.channel, value: payload.value, client_id: 0 })
        .await
        .map_err(|_| DmxxError::Internal("engine is not accepting commands".to_string()))?;
    Ok(api_ok())
}

#[derive(Deserialize)]
struct UnparkRequest {
    universe_id: u32,
    channel: u16,
}

async fn unpark_channel(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::extract::Query(query): axum::extract::Query<TokenQuery>,
    Json(payload): Json<UnparkRequest>,
) -> DmxxResult<impl IntoResponse> {
    let profile = require_profile(&state, addr, query.token)?;
    check_permission(&profile, GatedAction::Park)?;
    state
        .commands
        .send(Command::Unpark { universe_id: payload.universe_id, channel: payload.channel, client_id: 0 })
        .await
        .map_err(|_| DmxxError::Internal("engine is not accepting commands".to_string()))?;
    Ok(api_ok())
}

#[derive(Deserialize)]
struct HighlightRequest {
    active: bool,
    #[serde(default)]
    dim_level: u8,
    #[serde(default)]
    channels: Vec<(u32, u16)>,
}

async fn set_highlight(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    axum::extract::Query(query): axum::extract::Query<TokenQuery>,
    Json(payload): Json<HighlightRequest>,
) -> DmxxResult<impl IntoResponse> {
    let profile = require_profile(&state, addr, query.token)?;
    check_permission(&profile, GatedAction::Highlight)?;
    state
        .commands
        .send(Command::SetHighlight {
            active: payload.active,
            dim_level: payload.dim_level,
            channels: payload.channels,
            client_id: 0,
        })
        .await
        .map_err(|_| DmxxError::Internal("engine is not accepting commands".to_string()))?;
    Ok(api_ok())
}

#[derive(Deserialize)]
struct BlackoutRequest {
    active: bool,
}

async fn set_blackout(State(state): State<AppState>, Json(payload): Json<BlackoutRequest>) -> DmxxResult<impl IntoResponse> {
    state
        .commands
        .send(Command::SetBlackout { active: payload.active, client_id: 0 })
        .await
        .map_err(|_| DmxxError::Internal("engine is not accepting commands".to_string()))?;
    Ok(api_ok())
}
