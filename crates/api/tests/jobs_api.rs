//! HTTP-level tests for the progress-query proxy routes.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;

use jobwatch_core::progress::{ActiveJob, JobStatus, JobType, ProgressNode};

use common::{body_json, get, get_auth, token_for, StaticProgressQuery};

fn app_with(query: StaticProgressQuery) -> axum::Router {
    common::build_test_app(common::build_test_state(Arc::new(query)))
}

#[tokio::test]
async fn active_jobs_require_session() {
    let response = get(common::default_app(), "/api/v1/jobs/active").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn active_jobs_are_wrapped_in_data_envelope() {
    let started = Utc::now();
    let query = StaticProgressQuery::default().with_active(ActiveJob {
        id: "job-1".into(),
        job_type: JobType::SourceIngestion,
        start_time: started,
        progress: Some(ProgressNode::new(
            "job-1",
            JobType::SourceIngestion,
            JobStatus::Running,
            started,
        )),
    });

    let response = get_auth(app_with(query), "/api/v1/jobs/active", &token_for("u")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let jobs = json["data"].as_array().expect("data should be an array");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], "job-1");
    assert_eq!(jobs[0]["job_type"], "source_ingestion");
    assert_eq!(jobs[0]["progress"]["status"], "running");
}

#[tokio::test]
async fn single_job_progress_is_returned() {
    let query = StaticProgressQuery::default().with_node(
        ProgressNode::new("job-3", JobType::Translation, JobStatus::Completed, Utc::now())
            .with_message("done"),
    );

    let response = get_auth(app_with(query), "/api/v1/jobs/job-3/progress", &token_for("u")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], "job-3");
    assert_eq!(json["data"]["message"], "done");
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let response = get_auth(
        common::default_app(),
        "/api/v1/jobs/nope/progress",
        &token_for("u"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
