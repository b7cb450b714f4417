//! End-to-end workflow scenarios, driven through the session store with a
//! paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Timing;
use crate::dataset::Dataset;
use crate::errors::RegistryError;
use crate::models::Project;
use crate::workflow::analysis::{Attachment, ImageAnalysis};
use crate::workflow::issuance::CreditIssuance;
use crate::workflow::{RandomMetrics, Sessions, WorkflowState};

fn setup() -> (Dataset, Sessions<ImageAnalysis>, Sessions<CreditIssuance>) {
    let timing = Timing::default();
    let metrics = Arc::new(RandomMetrics::seeded(42));
    let shutdown = CancellationToken::new();
    (
        Dataset::builtin().unwrap(),
        Sessions::new(
            ImageAnalysis::new(&timing).unwrap(),
            metrics.clone(),
            shutdown.clone(),
        ),
        Sessions::new(CreditIssuance::new(&timing, 2100).unwrap(), metrics, shutdown),
    )
}

fn project(dataset: &Dataset, id: &str) -> Project {
    dataset.find_project(id).unwrap().clone()
}

#[tokio::test(start_paused = true)]
async fn test_issuance_of_verified_project() {
    let (dataset, _, issuance) = setup();
    let (_, engine) = issuance.create().await;
    let sundarbans = project(&dataset, "proj-001");
    assert_eq!(sundarbans.credits_available, 1200);

    engine
        .edit(|d| {
            d.project = Some(sundarbans);
            Ok(())
        })
        .unwrap();
    engine.start().unwrap();
    assert_eq!(engine.state(), WorkflowState::Calculating);

    let snap = engine.settled().await;
    assert_eq!(snap.state, WorkflowState::Complete);
    assert_eq!(snap.progress, 100);

    let receipt = snap.result.unwrap();
    assert_eq!(receipt.project_id, "proj-001");
    assert_eq!(receipt.calculation.base_credits, 1200);
    assert_eq!(receipt.calculation.verification_bonus, 0.1);
    assert_eq!(receipt.calculation.total_credits, 950);
    assert_eq!(receipt.calculation.estimated_value, 950 * 2100);
    assert!(receipt.transaction_hash.starts_with("0x"));
}

#[tokio::test(start_paused = true)]
async fn test_analysis_without_attachments_stays_idle() {
    let (dataset, analysis, _) = setup();
    let (_, engine) = analysis.create().await;
    let reef = project(&dataset, "proj-002");

    engine
        .edit(|d| {
            d.project = Some(reef);
            Ok(())
        })
        .unwrap();
    let err = engine.start().unwrap_err();
    assert!(matches!(err, RegistryError::NoAttachments));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snap = engine.snapshot();
    assert_eq!(snap.state, WorkflowState::Idle);
    assert_eq!(snap.progress, 0);
    assert_eq!(snap.run_id, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_after_issuance_clears_everything() {
    let (dataset, _, issuance) = setup();
    let (_, engine) = issuance.create().await;
    let lake = project(&dataset, "proj-009");

    engine
        .edit(|d| {
            d.project = Some(lake);
            d.custom_amount = Some(500);
            Ok(())
        })
        .unwrap();
    engine.start().unwrap();
    let done = engine.settled().await;
    assert_eq!(done.state, WorkflowState::Complete);
    assert_eq!(done.result.unwrap().calculation.base_credits, 500);

    engine.reset();
    let snap = engine.snapshot();
    assert_eq!(snap.state, WorkflowState::Idle);
    assert_eq!(snap.progress, 0);
    assert!(snap.result.is_none());
    assert!(snap.draft.project.is_none());
    assert!(snap.draft.custom_amount.is_none());

    // Resetting an idle workflow changes nothing.
    engine.reset();
    let again = engine.snapshot();
    assert_eq!(again.state, WorkflowState::Idle);
    assert_eq!(again.run_id, snap.run_id);
}

#[tokio::test(start_paused = true)]
async fn test_analysis_progress_is_monotonic_and_ends_at_100() {
    let (dataset, analysis, _) = setup();
    let (_, engine) = analysis.create().await;
    let mangroves = project(&dataset, "proj-001");

    engine
        .edit(|d| {
            d.project = Some(mangroves);
            d.set_attachments(vec![
                Attachment::new("drone-01.jpg", 3_200_000, "image/jpeg"),
                Attachment::new("sentinel-2.tiff", 120_000_000, "image/tiff"),
            ])
        })
        .unwrap();

    let mut rx = engine.subscribe();
    engine.start().unwrap();

    let mut seen = vec![0u8];
    loop {
        rx.changed().await.unwrap();
        let (state, progress) = {
            let m = rx.borrow_and_update();
            (m.state(), m.progress())
        };
        assert!(progress >= *seen.last().unwrap());
        seen.push(progress);
        if state == WorkflowState::Complete {
            break;
        }
    }
    assert_eq!(seen.last(), Some(&100));

    let report = engine.snapshot().result.unwrap();
    assert_eq!(report.images_analysed, 2);
    assert!((0.0..=1.0).contains(&report.ndvi));
    assert!((0.0..=100.0).contains(&report.confidence));
}

#[tokio::test(start_paused = true)]
async fn test_removed_session_never_completes() {
    let (dataset, _, issuance) = setup();
    let (id, engine) = issuance.create().await;
    let project = project(&dataset, "proj-003");

    engine
        .edit(|d| {
            d.project = Some(project);
            Ok(())
        })
        .unwrap();
    engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(engine.state(), WorkflowState::Calculating);

    issuance.remove(id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snap = engine.snapshot();
    assert_ne!(snap.state, WorkflowState::Complete);
    assert!(snap.result.is_none());
}
