//! `POST /` — the single job-dispatch endpoint. Accepts either an indexing
//! job or a pr_review job, tagged by a `type` field, authenticates the
//! caller against a pre-shared secret, and runs the matching pipeline
//! in-request (the orchestrator processes one job per call; there is no
//! background queue).

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use indexing_orchestrator::{IndexingConfig, IndexingKind};
use mr_reviewer::git_providers::ChangeRequestId;
use mr_reviewer::orchestrator::OrchestratorConfig;

use crate::core::app_state::AppState;
use crate::core::http::response_envelope::ApiResponse;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Initial,
    Incremental,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum JobRequest {
    Indexing {
        repo_id: String,
        #[allow(dead_code)]
        user_id: String,
        job_type: JobType,
        repo_url: String,
        #[serde(default)]
        token: Option<String>,
    },
    PrReview {
        repo_id: String,
        #[allow(dead_code)]
        user_id: String,
        pr_number: u64,
        commit_sha: String,
        #[allow(dead_code)]
        base_sha: String,
        installation_id: String,
        owner: String,
        repo: String,
        #[allow(dead_code)]
        pr_title: String,
        #[allow(dead_code)]
        pr_url: String,
        repo_url: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all_fields = "camelCase")]
enum JobResult {
    #[serde(rename = "Success")]
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        files_processed: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        files_deleted: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        commit_sha: Option<String>,
    },
    #[serde(rename = "Failed")]
    Failed {
        error: String,
    },
}

impl IntoResponse for JobResult {
    fn into_response(self) -> Response {
        let status = match &self {
            JobResult::Success { .. } => StatusCode::OK,
            JobResult::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Header carrying the pre-shared trigger secret.
const SECRET_HEADER: &str = "x-trigger-secret";

fn secret_is_valid(headers: &HeaderMap, expected: &str) -> bool {
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        return false;
    }
    provided.ct_eq(expected).into()
}

#[instrument(name = "handle_job", skip(state, headers, body))]
pub async fn handle_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Response {
    if !secret_is_valid(&headers, &state.trigger_secret) {
        warn!("rejected job request: invalid trigger secret");
        return ApiResponse::<()>::error("UNAUTHORIZED", "invalid trigger secret", vec![])
            .into_response_with_status(StatusCode::UNAUTHORIZED);
    }

    let job = match body {
        Ok(Json(job)) => job,
        Err(err) => {
            return ApiResponse::<()>::error("BAD_REQUEST", err.to_string(), vec![])
                .into_response_with_status(StatusCode::BAD_REQUEST);
        }
    };

    match job {
        JobRequest::Indexing { repo_id, job_type, repo_url, token, .. } => {
            run_indexing(&state, repo_id, job_type, repo_url, token).await.into_response()
        }
        JobRequest::PrReview {
            repo_id,
            pr_number,
            commit_sha,
            installation_id,
            owner,
            repo,
            repo_url,
            ..
        } => {
            run_review(&state, repo_id, pr_number, commit_sha, installation_id, owner, repo, repo_url)
                .await
                .into_response()
        }
    }
}

async fn run_indexing(
    state: &AppState,
    repo_id: String,
    job_type: JobType,
    repo_url: String,
    token: Option<String>,
) -> JobResult {
    let kind = match job_type {
        JobType::Initial => IndexingKind::Initial,
        JobType::Incremental => IndexingKind::Incremental,
    };

    let cfg = IndexingConfig {
        repository_id: repo_id.clone(),
        repo_url,
        token: token.or_else(|| Some(state.git.token.clone())),
        ..Default::default()
    };

    info!(repository = %repo_id, kind = ?kind, "dispatching indexing job");
    match indexing_orchestrator::run_indexing(cfg, kind, &state.gateway, &state.embedder).await {
        Ok(outcome) => JobResult::Success {
            files_processed: Some(outcome.files_processed),
            files_deleted: Some(outcome.files_deleted),
            commit_sha: Some(outcome.commit_sha),
        },
        Err(err) => {
            warn!(repository = %repo_id, error = %err, "indexing job failed");
            JobResult::Failed { error: err.to_string() }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_review(
    state: &AppState,
    repo_id: String,
    pr_number: u64,
    commit_sha: String,
    installation_id: String,
    owner: String,
    repo: String,
    repo_url: String,
) -> JobResult {
    info!(
        repository = %repo_id,
        pr_number,
        installation_id = %installation_id,
        "dispatching pr_review job"
    );

    let id = ChangeRequestId {
        project: format!("{owner}/{repo}"),
        iid: pr_number,
    };

    let cfg = OrchestratorConfig {
        repository_id: repo_id.clone(),
        repo_url,
        max_comments_per_file: state.max_comments_per_file,
        ..Default::default()
    };

    let provider_cfg = state.git.clone();

    let result = mr_reviewer::run_pr_review(
        provider_cfg,
        id,
        cfg,
        &state.gateway,
        &state.embedder,
        &state.analyzer,
        &state.idempotency,
    )
    .await;

    match result {
        Ok(outcome) => {
            info!(
                repository = %repo_id,
                pr_number,
                comments = outcome.drafts.len(),
                "pr_review job completed"
            );
            JobResult::Success {
                files_processed: None,
                files_deleted: None,
                commit_sha: Some(commit_sha),
            }
        }
        Err(err) => {
            warn!(repository = %repo_id, pr_number, error = %err, "pr_review job failed");
            JobResult::Failed { error: err.to_string() }
        }
    }
}
