use actix_web::{HttpResponse, Responder, post, web};

use crate::judge::{Submission, VerdictAggregator};

/// Judges one submission and answers with its verdict
///
/// Judging failures are reported inside the verdict, never as an HTTP error.
#[post("/execute")]
pub async fn execute_handler(
    aggregator: web::Data<VerdictAggregator>,
    body: web::Json<Submission>,
) -> impl Responder {
    let submission = body.into_inner();
    log::info!(
        "Received submission {} for language {} with {} tests",
        submission.id,
        submission.language,
        submission.test_cases.len()
    );

    let verdict = aggregator.judge(&submission).await.unwrap_or_else(|aborted| {
        log::error!("{aborted}");
        aborted.into_verdict()
    });

    HttpResponse::Ok().json(verdict)
}
