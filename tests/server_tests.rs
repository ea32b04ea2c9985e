mod common;

use std::sync::Arc;

use actix_web::{App, test, web};
use assert_json_diff::{assert_json_eq, assert_json_include};
use serde_json::json;

use common::{ScriptedJudger, run_result};
use judger::error::JudgeError;
use judger::judge::VerdictAggregator;
use judger::routes::{execute_handler, json_error_handler};
use judger::status::Status;

// Helper function to build the app around a scripted judger
macro_rules! init_app {
    ($judger:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(VerdictAggregator::new($judger)))
                .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                .service(execute_handler),
        )
        .await
    };
}

fn request_body() -> serde_json::Value {
    json!({
        "submission_id": "42",
        "language": "python",
        "code": "print(input())",
        "time_limit": 1000,
        "memory_limit": 256,
        "checker_type": "exact",
        "custom_checker_code": null,
        "test_cases": [
            { "id": "a", "input_data": "1", "expected_output": "1" },
            { "id": "b", "input_data": "2", "expected_output": "3" }
        ]
    })
}

#[actix_web::test]
async fn test_execute_returns_verdict() {
    let judger = Arc::new(ScriptedJudger::new(vec![
        Ok(run_result(Status::Accepted, 12, 8)),
        Ok(run_result(Status::WrongAnswer, 20, 6)),
    ]));
    let app = init_app!(judger.clone());

    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(request_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_eq!(
        body,
        json!({
            "submission_id": "42",
            "final_status": "WRONG_ANSWER",
            "max_time_ms": 20,
            "max_memory_mb": 8,
            "error_message": "",
            "test_results": [
                {
                    "id": "a",
                    "status": "ACCEPTED",
                    "is_passed": true,
                    "actual_output": "ACCEPTED output",
                    "execution_time_ms": 12,
                    "memory_used_mb": 8,
                    "details": "ACCEPTED details"
                },
                {
                    "id": "b",
                    "status": "WRONG_ANSWER",
                    "is_passed": false,
                    "actual_output": "WRONG_ANSWER output",
                    "execution_time_ms": 20,
                    "memory_used_mb": 6,
                    "details": "WRONG_ANSWER details"
                }
            ]
        })
    );

    let specs = judger.specs();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[1].stdin, "2");
    assert_eq!(specs[1].expected_output, "3");
}

#[actix_web::test]
async fn test_execute_reports_executor_failure_as_verdict() {
    let judger = Arc::new(ScriptedJudger::new(vec![Err(JudgeError::Executor(
        "task panicked".to_string(),
    ))]));
    let app = init_app!(judger);

    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(request_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_json_include!(
        actual: body,
        expected: json!({
            "submission_id": "42",
            "final_status": "INTERNAL_ERROR",
            "error_message": "executor failed: task panicked",
            "test_results": []
        })
    );
}

#[actix_web::test]
async fn test_execute_rejects_malformed_json() {
    let judger = Arc::new(ScriptedJudger::new(Vec::new()));
    let app = init_app!(judger.clone());

    let req = test::TestRequest::post()
        .uri("/execute")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["reason"], "ERR_INVALID_ARGUMENT");
    assert_eq!(body["code"], 1);
    assert_eq!(judger.calls(), 0);
}

#[actix_web::test]
async fn test_execute_rejects_missing_fields() {
    let judger = Arc::new(ScriptedJudger::new(Vec::new()));
    let app = init_app!(judger.clone());

    let mut body = request_body();
    body.as_object_mut().unwrap().remove("test_cases");
    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 400);
    assert_eq!(judger.calls(), 0);
}

#[actix_web::test]
async fn test_custom_checker_code_is_optional() {
    let judger = Arc::new(ScriptedJudger::with_statuses(&[
        Status::Accepted,
        Status::Accepted,
    ]));
    let app = init_app!(judger);

    let mut body = request_body();
    body.as_object_mut().unwrap().remove("custom_checker_code");
    let req = test::TestRequest::post()
        .uri("/execute")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["final_status"], "ACCEPTED");
}
