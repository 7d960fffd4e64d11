//! # API Endpoint Handlers
//!
//! Thin adapters between JSON and the engine. Every handler takes the ledger
//! lock once; writes hold the write guard for their whole check-then-act
//! sequence.

use super::{
    AppState,
    auth::{CurrentUser, session_token},
    error::ApiResult,
    types::{
        AdminRequest, AwardRequestBody, AwardResponse, BalanceResponse, CreateReasonRequest,
        CreateRewardRequest, CreateUserRequest, CreatedResponse, HealthResponse, ImportQuery,
        LangQuery, LoginRequest, LoginResponse, PasswordRequest, RedeemRequest, RedeemResponse,
        RedemptionsQuery, SettingRequest, StarsQuery, TranslationRequest, UpdateRewardRequest,
        ValueChangeRequest,
    },
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use starjar_core::{
    AwardEntry, AwardRequest, ExportDocument, ImportReport, LeaderboardEntry, LedgerError,
    ReasonId, ReasonSummary, RedemptionEntry, RedemptionId, RewardId, RewardSummary, StarId,
    TranslationOwner, UserId,
    primitives::DEFAULT_AWARD_STARS,
};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// SESSIONS
// =============================================================================

/// Check a password and open a session.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let actor = state
        .ledger
        .read()
        .await
        .authenticate(&body.username, &body.password)?;
    let token = state.sessions.issue(actor.id).await;
    tracing::info!(user = %actor.username, "session opened");
    Ok(Json(LoginResponse {
        token,
        username: actor.username,
        is_admin: actor.is_admin,
    }))
}

/// Close the session of the request's token.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let token = session_token(&headers)
        .ok_or_else(|| LedgerError::Unauthenticated("login required".into()))?;
    state.sessions.revoke(token).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// USERS
// =============================================================================

/// Create an account. Admin only.
pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    let user = ledger.create_user(&body.username, &body.password, body.is_admin)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::user(user.id, user.username)),
    ))
}

/// Delete an account with its ledgers and sessions. Admin only.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    let id = ledger.actor(&username)?.id;
    ledger.delete_user(id)?;
    state.sessions.revoke_user(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Change a password. Users may change their own; admins anyone's.
///
/// Every session of the account is closed afterwards.
pub async fn set_password_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
    Json(body): Json<PasswordRequest>,
) -> ApiResult<StatusCode> {
    let own = current.actor().is_some_and(|a| a.username == username);
    if !own {
        current.require_admin()?;
    }
    let mut ledger = state.ledger.write().await;
    let id = ledger.actor(&username)?.id;
    ledger.set_password(id, &body.password)?;
    state.sessions.revoke_user(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Grant or revoke the admin flag. Admin only.
pub async fn set_admin_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(username): Path<String>,
    Json(body): Json<AdminRequest>,
) -> ApiResult<StatusCode> {
    let actor = current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    let id = ledger.actor(&username)?.id;
    ledger.set_admin(id, body.is_admin)?;
    tracing::info!(
        by = %actor.username,
        user = %username,
        is_admin = body.is_admin,
        "admin flag set"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Every user with total awarded and current balance.
pub async fn leaderboard_handler(
    State(state): State<AppState>,
    Query(query): Query<LangQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let lang = state.lang(query.lang.as_deref());
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.leaderboard(&lang)?))
}

pub async fn balance_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let ledger = state.ledger.read().await;
    let balance = ledger.balance_of(&username)?;
    Ok(Json(BalanceResponse { username, balance }))
}

/// Award counts per username per reason id.
pub async fn reason_counts_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, BTreeMap<u64, usize>>>> {
    let ledger = state.ledger.read().await;
    let names: BTreeMap<UserId, String> = ledger
        .users()?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();
    let counts = ledger
        .reason_counts()?
        .into_iter()
        .filter_map(|(user, reasons)| {
            let name = names.get(&user)?.clone();
            Some((name, reasons.into_iter().map(|(r, n)| (r.0, n)).collect()))
        })
        .collect();
    Ok(Json(counts))
}

// =============================================================================
// AWARDS
// =============================================================================

pub async fn list_stars_handler(
    State(state): State<AppState>,
    Query(query): Query<StarsQuery>,
) -> ApiResult<Json<Vec<AwardEntry>>> {
    let lang = state.lang(query.lang.as_deref());
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.list_awards(query.user.as_deref(), &lang)?))
}

/// Award stars. The logged-in user is recorded as the awarder and may not
/// be the beneficiary.
pub async fn award_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<AwardRequestBody>,
) -> ApiResult<(StatusCode, Json<AwardResponse>)> {
    let actor = current.require()?;
    if actor.username == body.username {
        return Err(LedgerError::InvalidInput("cannot award stars to yourself".into()).into());
    }

    let request = AwardRequest {
        username: body.username,
        reason_id: body.reason_id.map(ReasonId),
        reason_text: body.reason,
        stars: body.stars,
        awarded_by: Some(actor.id),
    };
    let mut ledger = state.ledger.write().await;
    let star = ledger.record_award(request)?;
    let balance = ledger.balance(star.user)?;
    Ok((
        StatusCode::CREATED,
        Json(AwardResponse {
            star_id: star.id.0,
            reason_id: star.reason.map(|r| r.0),
            stars: star.stars,
            balance,
        }),
    ))
}

pub async fn delete_star_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.delete_star(StarId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// REDEMPTIONS
// =============================================================================

/// Most recent redemptions. An unknown `user` yields an empty list.
pub async fn list_redemptions_handler(
    State(state): State<AppState>,
    Query(query): Query<RedemptionsQuery>,
) -> ApiResult<Json<Vec<RedemptionEntry>>> {
    let lang = state.lang(query.lang.as_deref());
    let ledger = state.ledger.read().await;
    let user = match query.user.as_deref() {
        Some(name) => match ledger.user_by_name(name)? {
            Some(user) => Some(user.id),
            None => return Ok(Json(Vec::new())),
        },
        None => None,
    };
    Ok(Json(ledger.list_redemptions(query.limit, user, &lang)?))
}

/// Checked redemption: fails with 400 and the current balance when short.
///
/// Users redeem from their own balance; admins may redeem for anyone.
pub async fn redeem_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<RedeemRequest>,
) -> ApiResult<(StatusCode, Json<RedeemResponse>)> {
    let actor = current.require()?;
    if !actor.is_admin && actor.username != body.username {
        return Err(LedgerError::Forbidden("can only redeem for yourself".into()).into());
    }
    let mut ledger = state.ledger.write().await;
    let redemption = ledger.redeem(&body.username, RewardId(body.reward_id))?;
    let balance = ledger.balance(redemption.user)?;
    tracing::info!(
        user = %body.username,
        reward = body.reward_id,
        by = %actor.username,
        "reward redeemed"
    );
    Ok((
        StatusCode::CREATED,
        Json(RedeemResponse {
            redemption_id: redemption.id.0,
            cost: redemption.cost.unwrap_or_default(),
            balance,
        }),
    ))
}

pub async fn delete_redemption_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.delete_redemption(RedemptionId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// REASONS
// =============================================================================

pub async fn list_reasons_handler(
    State(state): State<AppState>,
    Query(query): Query<LangQuery>,
) -> ApiResult<Json<Vec<ReasonSummary>>> {
    let lang = state.lang(query.lang.as_deref());
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.reasons(&lang)?))
}

pub async fn create_reason_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<CreateReasonRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    let reason = ledger.create_reason(&body.text, body.stars.unwrap_or(DEFAULT_AWARD_STARS))?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::reason(reason.id, reason.key)),
    ))
}

pub async fn set_reason_stars_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
    Json(body): Json<ValueChangeRequest>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.set_reason_stars(ReasonId(id), body.value, body.retroactive)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_reason_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.delete_reason(ReasonId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// REWARDS
// =============================================================================

pub async fn list_rewards_handler(
    State(state): State<AppState>,
    Query(query): Query<LangQuery>,
) -> ApiResult<Json<Vec<RewardSummary>>> {
    let lang = state.lang(query.lang.as_deref());
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.rewards(&lang)?))
}

pub async fn create_reward_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<CreateRewardRequest>,
) -> ApiResult<(StatusCode, Json<CreatedResponse>)> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    let reward = ledger.create_reward(&body.name, body.cost, &body.icon, body.adult_only)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse::reward(reward.id, reward.key)),
    ))
}

pub async fn update_reward_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
    Json(body): Json<UpdateRewardRequest>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.update_reward(RewardId(id), &body.name, &body.icon)?;
    if let Some(adult_only) = body.adult_only {
        ledger.set_reward_adult_only(RewardId(id), adult_only)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_reward_cost_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
    Json(body): Json<ValueChangeRequest>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.set_reward_cost(RewardId(id), body.value, body.retroactive)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_reward_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.delete_reward(RewardId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// TRANSLATIONS
// =============================================================================

/// Parse `user|reason|reward` and an id into an owner.
fn translation_owner(kind: &str, id: u64) -> Result<TranslationOwner, LedgerError> {
    match kind {
        "user" => Ok(TranslationOwner::User(UserId(id))),
        "reason" => Ok(TranslationOwner::Reason(ReasonId(id))),
        "reward" => Ok(TranslationOwner::Reward(RewardId(id))),
        other => Err(LedgerError::InvalidInput(format!(
            "unknown translation kind '{}'",
            other
        ))),
    }
}

pub async fn get_translations_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, u64)>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let owner = translation_owner(&kind, id)?;
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.translations(owner)?))
}

/// Upsert one translation. Admins may edit anything; a user may edit their
/// own display name.
pub async fn set_translation_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((kind, id, lang)): Path<(String, u64, String)>,
    Json(body): Json<TranslationRequest>,
) -> ApiResult<StatusCode> {
    let owner = translation_owner(&kind, id)?;
    let own_name = matches!(
        (owner, current.actor()),
        (TranslationOwner::User(user), Some(actor)) if actor.id == user
    );
    if !own_name {
        current.require_admin()?;
    }
    let mut ledger = state.ledger.write().await;
    ledger.set_translation(owner, &lang, &body.text)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// SETTINGS
// =============================================================================

pub async fn settings_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.settings()?))
}

pub async fn set_setting_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(key): Path<String>,
    Json(body): Json<SettingRequest>,
) -> ApiResult<StatusCode> {
    current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    ledger.set_setting(&key, &body.value)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export the whole store as a JSON document.
pub async fn export_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<ExportDocument>> {
    current.require_admin()?;
    let ledger = state.ledger.read().await;
    Ok(Json(ledger.export_document()?))
}

/// Replace catalog and ledgers from a JSON document.
///
/// The body is taken as raw text so a best-effort import can skip malformed
/// records instead of rejecting the request.
pub async fn import_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> ApiResult<Json<ImportReport>> {
    let actor = current.require_admin()?;
    let mut ledger = state.ledger.write().await;
    let report = ledger.import_json(&body, query.mode)?;
    tracing::info!(
        by = %actor.username,
        mode = ?query.mode,
        skipped = report.skipped.len(),
        "import requested"
    );
    Ok(Json(report))
}
