use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware};
use fizzbuzz_domain::buzzes::{Buzz, BuzzDraft, BuzzService};
use fizzbuzz_domain::conversations::{
    ConversationService, ConversationSummary, Message, Thread, ThreadHandle,
};
use fizzbuzz_domain::engagement::{CommentView, EngagementService};
use fizzbuzz_domain::error::DomainError;
use fizzbuzz_domain::feed::{BuzzView, FeedPage, FeedService, SortMode, display_like_count};
use fizzbuzz_domain::follows::FollowService;
use fizzbuzz_domain::identity::Viewer;
use fizzbuzz_domain::ports::db::DbAdapter;
use fizzbuzz_domain::users::{User, UserService, UserSummary};
use fizzbuzz_domain::util::now_ms;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::AuthContext;
use crate::{error::ApiError, middleware as app_middleware, observability, state::AppState};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/users/sync", post(sync_profile))
        .route("/v1/users/:username/follow", post(toggle_follow))
        .route("/v1/buzzes", post(create_buzz))
        .route("/v1/buzzes/:buzz_id", delete(delete_buzz))
        .route("/v1/buzzes/:buzz_id/like", post(toggle_like))
        .route("/v1/buzzes/:buzz_id/comments", post(submit_comment))
        .route("/v1/comments/:comment_id", delete(delete_comment))
        .route(
            "/v1/conversations",
            get(list_conversations).post(resolve_conversation),
        )
        .route(
            "/v1/conversations/:username/messages",
            get(load_thread).post(send_message),
        )
        .route("/v1/media/buzz-images", post(upload_buzz_image))
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/v1/feed", get(load_feed_page))
        .route("/v1/users/:username", get(user_profile))
        .route("/v1/users/:username/followers", get(list_followers))
        .route("/v1/users/:username/following", get(list_following))
        .route("/v1/search/users", get(search_users))
        .route("/v1/search/buzzes", get(search_buzzes))
        .merge(protected)
        .layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(
            app_middleware::correlation_id_middleware,
        ));

    if !state.config.app_env.eq_ignore_ascii_case("test") {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.user_repo.clone(), state.follow_repo.clone())
}

fn feed_service(state: &AppState) -> FeedService {
    FeedService::with_page_size(state.buzz_repo.clone(), state.config.feed_page_size)
}

fn engagement_service(state: &AppState) -> EngagementService {
    EngagementService::new(state.engagement_repo.clone(), state.buzz_repo.clone())
}

fn conversation_service(state: &AppState) -> ConversationService {
    ConversationService::new(state.message_repo.clone(), state.user_repo.clone())
}

fn follow_service(state: &AppState) -> FollowService {
    FollowService::new(state.follow_repo.clone())
}

fn buzz_service(state: &AppState) -> BuzzService {
    BuzzService::new(state.buzz_repo.clone())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
    })
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    backend: String,
}

async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    if let Some(adapter) = &state.db_adapter {
        adapter.health_check().await.map_err(|err| {
            tracing::error!(error = %err, "gateway readiness probe failed");
            ApiError::Internal
        })?;
    }
    Ok(Json(ReadyResponse {
        status: "ok",
        backend: state.config.data_backend.clone(),
    }))
}

async fn metrics() -> Response {
    match observability::render_metrics() {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => ApiError::Internal.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    mode: Option<SortMode>,
    page: Option<usize>,
}

async fn load_feed_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>, ApiError> {
    let viewer = optional_viewer(&auth);
    let mode = query.mode.unwrap_or(SortMode::Trending);
    let page = feed_service(&state)
        .load_page(viewer.as_ref(), mode, query.page.unwrap_or(0))
        .await
        .map_err(map_domain_error)?;
    observability::register_feed_page_load(match mode {
        SortMode::Trending => "trending",
        SortMode::Recent => "recent",
    });
    Ok(Json(page))
}

async fn sync_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<User>, ApiError> {
    let viewer = viewer_identity(&auth)?;
    let user = user_service(&state)
        .sync_profile(&viewer)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(user))
}

#[derive(Serialize)]
struct UserProfileResponse {
    user: User,
    follower_count: u64,
    following_count: u64,
    viewer_follows: bool,
    buzzes: Vec<BuzzView>,
}

async fn user_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let viewer = optional_viewer(&auth);
    let user = user_service(&state)
        .get_by_username(&username)
        .await
        .map_err(map_domain_error)?;

    let follows = follow_service(&state);
    let counts = follows.counts(&user.user_id).await.map_err(map_domain_error)?;
    let viewer_follows = match &viewer {
        Some(viewer) => follows
            .is_following(&viewer.user_id, &user.user_id)
            .await
            .map_err(map_domain_error)?,
        None => false,
    };

    let buzzes = feed_service(&state)
        .author_buzzes(viewer.as_ref(), &user.user_id)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(UserProfileResponse {
        user,
        follower_count: counts.followers,
        following_count: counts.following,
        viewer_follows,
        buzzes,
    }))
}

async fn list_followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let user = user_service(&state)
        .get_by_username(&username)
        .await
        .map_err(map_domain_error)?;
    let followers = follow_service(&state)
        .list_followers(&user.user_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(followers))
}

async fn list_following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let user = user_service(&state)
        .get_by_username(&username)
        .await
        .map_err(map_domain_error)?;
    let following = follow_service(&state)
        .list_following(&user.user_id)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(following))
}

#[derive(Debug, Deserialize)]
struct ToggleFollowRequest {
    currently_following: Option<bool>,
}

#[derive(Serialize)]
struct ToggleFollowResponse {
    following: bool,
    follower_count: u64,
}

async fn toggle_follow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<ToggleFollowRequest>,
) -> Result<Json<ToggleFollowResponse>, ApiError> {
    let viewer = viewer_identity(&auth)?;
    let target = user_service(&state)
        .get_by_username(&username)
        .await
        .map_err(map_domain_error)?;

    let follows = follow_service(&state);
    let currently_following = match payload.currently_following {
        Some(value) => value,
        None => follows
            .is_following(&viewer.user_id, &target.user_id)
            .await
            .map_err(map_domain_error)?,
    };

    let outcome = follows
        .toggle(&viewer, &target.user_id, currently_following)
        .await
        .map_err(map_domain_error)?;
    let counts = follows
        .counts(&target.user_id)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(ToggleFollowResponse {
        following: outcome.following,
        follower_count: counts.followers,
    }))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let q = query.q.unwrap_or_default();
    let users = user_service(&state)
        .search(&q)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(users))
}

async fn search_buzzes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<BuzzView>>, ApiError> {
    let q = query.q.unwrap_or_default();
    if q.trim().is_empty() {
        return Err(ApiError::Validation("search query is required".into()));
    }
    let viewer = optional_viewer(&auth);
    let buzzes = feed_service(&state)
        .search_buzzes(viewer.as_ref(), q.trim())
        .await
        .map_err(map_domain_error)?;
    Ok(Json(buzzes))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateBuzzRequest {
    #[validate(length(min = 1, max = 1_000))]
    content: String,
    #[serde(default)]
    tags: Vec<String>,
    image_url: Option<String>,
}

async fn create_buzz(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateBuzzRequest>,
) -> Result<(StatusCode, Json<Buzz>), ApiError> {
    crate::validation::validate(&payload)?;
    let viewer = viewer_identity(&auth)?;
    let draft = BuzzDraft {
        content: payload.content,
        tags: payload.tags,
        image_url: payload.image_url,
    };
    let buzz = buzz_service(&state)
        .compose(&viewer, draft)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(buzz)))
}

async fn delete_buzz(
    State(state): State<AppState>,
    Path(buzz_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, ApiError> {
    let viewer = viewer_identity(&auth)?;
    engagement_service(&state)
        .delete_buzz(&viewer, &buzz_id)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct ToggleLikeRequest {
    currently_liked: Option<bool>,
}

#[derive(Serialize)]
struct ToggleLikeResponse {
    liked: bool,
    like_count: i64,
}

async fn toggle_like(
    State(state): State<AppState>,
    Path(buzz_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
    payload: Option<Json<ToggleLikeRequest>>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
    let viewer = viewer_identity(&auth)?;
    let record = buzz_service(&state)
        .get(&buzz_id)
        .await
        .map_err(map_domain_error)?;

    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let currently_liked = payload.currently_liked.unwrap_or_else(|| {
        record
            .likes
            .iter()
            .any(|like| like.user_id == viewer.user_id)
    });

    let outcome = engagement_service(&state)
        .toggle_like(&viewer, &buzz_id, currently_liked)
        .await
        .map_err(map_domain_error)?;
    observability::register_like_toggle(outcome.liked);

    // The count the caller should display: its local value moved by exactly
    // one. Derived from the pre-toggle record, not a reload.
    let like_count = display_like_count(&record) + if outcome.liked { 1 } else { -1 };
    Ok(Json(ToggleLikeResponse {
        liked: outcome.liked,
        like_count,
    }))
}

#[derive(Debug, Deserialize, Validate)]
struct SubmitCommentRequest {
    #[validate(length(max = 500))]
    content: String,
}

async fn submit_comment(
    State(state): State<AppState>,
    Path(buzz_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<SubmitCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    crate::validation::validate(&payload)?;
    let viewer = viewer_identity(&auth)?;
    buzz_service(&state)
        .get(&buzz_id)
        .await
        .map_err(map_domain_error)?;
    let comment = engagement_service(&state)
        .submit_comment(&viewer, &buzz_id, &payload.content)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, ApiError> {
    let viewer = viewer_identity(&auth)?;
    engagement_service(&state)
        .delete_comment(&viewer, &comment_id)
        .await
        .map_err(map_domain_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let viewer = viewer_identity(&auth)?;
    let summaries = conversation_service(&state)
        .list_conversations(&viewer)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(summaries))
}

#[derive(Debug, Deserialize, Validate)]
struct ResolveConversationRequest {
    #[validate(length(min = 1, max = 64))]
    target_username: String,
}

async fn resolve_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<ResolveConversationRequest>,
) -> Result<Json<ThreadHandle>, ApiError> {
    crate::validation::validate(&payload)?;
    let viewer = viewer_identity(&auth)?;
    let handle = conversation_service(&state)
        .resolve_or_create(&viewer, &payload.target_username)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(handle))
}

async fn load_thread(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Thread>, ApiError> {
    let viewer = viewer_identity(&auth)?;
    let thread = conversation_service(&state)
        .load_thread(&viewer, &username)
        .await
        .map_err(map_domain_error)?;
    Ok(Json(thread))
}

#[derive(Debug, Deserialize, Validate)]
struct SendMessageRequest {
    #[validate(length(max = 2_000))]
    content: String,
}

async fn send_message(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    crate::validation::validate(&payload)?;
    let viewer = viewer_identity(&auth)?;
    let receiver = user_service(&state)
        .get_by_username(&username)
        .await
        .map_err(map_domain_error)?;
    let message = conversation_service(&state)
        .send_message(&viewer, &receiver.user_id, &payload.content)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

async fn upload_buzz_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(auth): Extension<AuthContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let viewer = viewer_identity(&auth)?;
    if body.is_empty() {
        return Err(ApiError::Validation("image body is required".into()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let extension = content_type
        .strip_prefix("image/")
        .map(|subtype| subtype.split('+').next().unwrap_or(subtype))
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| ApiError::Validation("an image content-type is required".into()))?;

    let key = format!("{}/{}.{}", viewer.user_id, now_ms(), extension);
    let url = state
        .object_store
        .put_object(&key, body.to_vec(), &content_type)
        .await
        .map_err(map_domain_error)?;
    Ok((StatusCode::CREATED, Json(UploadResponse { url })))
}

fn viewer_identity(auth: &AuthContext) -> Result<Viewer, ApiError> {
    let user_id = auth
        .user_id
        .as_ref()
        .filter(|user_id| !user_id.trim().is_empty())
        .ok_or(ApiError::AuthRequired)?;
    Ok(Viewer {
        user_id: user_id.to_string(),
        username: auth
            .username
            .clone()
            .unwrap_or_else(|| user_id.to_string()),
        avatar_url: auth.avatar_url.clone(),
    })
}

fn optional_viewer(auth: &AuthContext) -> Option<Viewer> {
    if auth.is_authenticated {
        viewer_identity(auth).ok()
    } else {
        None
    }
}

fn map_domain_error(err: DomainError) -> ApiError {
    match err {
        DomainError::Validation(message) => ApiError::Validation(message),
        DomainError::AuthRequired => ApiError::AuthRequired,
        DomainError::Forbidden => ApiError::Forbidden,
        DomainError::NotFound => ApiError::NotFound,
        DomainError::Conflict => ApiError::Conflict,
        DomainError::Gateway(message) => {
            tracing::error!(error = %message, "gateway failure");
            ApiError::Internal
        }
    }
}
