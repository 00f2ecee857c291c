use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    routing::{get, post},
    Form, Router,
};
use axum_macros::debug_handler;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::{
    envelope::Envelope,
    error::{AppError, AppResult},
    models::{AppState, Confirmation, Submission, SuccessQuery},
    views,
};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/submit", post(submit))
        .route("/success", get(success))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[debug_handler]
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let catalog = Arc::clone(&state.catalog);
    let entries = match tokio::task::spawn_blocking(move || catalog.list_entries()).await {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            warn!(error = %e, "Catalog unavailable, rendering empty listing");
            BTreeMap::new()
        }
        Err(e) => {
            warn!(error = %e, "Error in spawn_blocking");
            BTreeMap::new()
        }
    };
    Html(views::index_page(&entries, &state.broker))
}

#[debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Form(submission): Form<Submission>,
) -> AppResult<Redirect> {
    let confirmation = submit_message(&state, submission).await?;
    Ok(Redirect::to(&success_location(&confirmation)))
}

#[debug_handler]
pub async fn success(
    State(state): State<AppState>,
    Query(query): Query<SuccessQuery>,
) -> Html<String> {
    let submitted_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    Html(views::success_page(
        query.id.as_deref().unwrap_or_default(),
        query.file.as_deref().unwrap_or("Unknown"),
        &submitted_at,
        &state.broker,
    ))
}

/// Validates a submission, wraps it in an envelope and publishes it keyed by
/// the envelope id.
///
/// The submitted content is published as-is; it is not re-read from the
/// catalog entry named by `selected_file`.
pub async fn submit_message(state: &AppState, submission: Submission) -> AppResult<Confirmation> {
    if submission.selected_file.is_empty() || submission.content.is_empty() {
        return Err(AppError::Validation);
    }

    let envelope = Envelope::build(submission.content);
    let payload = envelope.to_payload()?;

    let delivery = state
        .publisher
        .publish(&state.topic, &envelope.id, &payload)
        .await
        .map_err(|source| AppError::Publish {
            source,
            broker: state.broker.clone(),
        })?;

    info!(
        message_id = %delivery.message_id,
        file = %submission.selected_file,
        "Submission published"
    );

    Ok(Confirmation {
        id: envelope.id,
        file: submission.selected_file,
    })
}

pub fn success_location(confirmation: &Confirmation) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("id", &confirmation.id)
        .append_pair("file", &confirmation.file)
        .finish();
    format!("/success?{}", query)
}
