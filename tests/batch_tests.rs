//! Batch workflow integration tests

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use batch_scribe::application::{
    BatchCallbacks, BatchOptions, BatchWorkflow, InvalidFile, ValidationRules,
};
use batch_scribe::domain::batch::{BatchFileStatus, BatchProgress, BatchStatistics, FileStatus};
use batch_scribe::domain::job::JobSettings;

use common::{simple_queue, write_files, ScriptedEngine};

fn workflow(engine: Arc<ScriptedEngine>) -> BatchWorkflow {
    let queue = simple_queue(engine, 2, 1);
    queue.start();
    BatchWorkflow::new(queue, ValidationRules::default())
}

#[tokio::test]
async fn invalid_files_are_reported_before_anything_is_enqueued() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(
        dir.path(),
        &[
            ("one.wav", 64),
            ("notes.txt", 64),
            ("two.mp3", 64),
            ("cover.png", 64),
            ("three.flac", 64),
        ],
    );
    let workflow = workflow(ScriptedEngine::new(0, Duration::from_millis(5)));

    let queue = workflow.queue().clone();
    let seen: Arc<Mutex<Vec<(usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let callbacks = BatchCallbacks {
        on_validation_error: Some(Arc::new(move |invalid: &[InvalidFile]| {
            record
                .lock()
                .unwrap()
                .push((invalid.len(), queue.get_stats().total()));
        })),
        ..Default::default()
    };

    let report = workflow
        .start_batch(&paths, JobSettings::default(), BatchOptions::default(), callbacks)
        .await
        .unwrap();

    assert_eq!(report.valid.len(), 3);
    assert_eq!(report.invalid.len(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![(2, 0)]);
    assert_eq!(workflow.queue().get_stats().total(), 3);
    assert_eq!(workflow.file_statuses().len(), 3);
}

#[tokio::test]
async fn completion_leaves_no_file_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(
        dir.path(),
        &[("a.wav", 10), ("corrupt.wav", 10), ("b.ogg", 10), ("c.webm", 10)],
    );
    let workflow = workflow(ScriptedEngine::new(0, Duration::from_millis(5)));

    let snapshot: Arc<Mutex<Option<(Vec<BatchFileStatus>, BatchStatistics)>>> =
        Arc::new(Mutex::new(None));
    let record = Arc::clone(&snapshot);
    let callbacks = BatchCallbacks {
        on_complete: Some(Arc::new(
            move |statuses: &[BatchFileStatus], stats: &BatchStatistics| {
                *record.lock().unwrap() = Some((statuses.to_vec(), stats.clone()));
            },
        )),
        ..Default::default()
    };

    workflow
        .start_batch(&paths, JobSettings::default(), BatchOptions::default(), callbacks)
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), workflow.wait_for_completion())
        .await
        .unwrap()
        .unwrap();

    let (statuses, stats) = snapshot.lock().unwrap().clone().unwrap();
    assert_eq!(stats.completed_files + stats.failed_files, stats.total_files);
    assert_eq!(stats.total_files, 4);
    assert_eq!(stats.failed_files, 1);
    assert!(statuses
        .iter()
        .all(|s| !matches!(s.status, FileStatus::Pending | FileStatus::Processing)));

    let failed = statuses.iter().find(|s| s.status == FileStatus::Error).unwrap();
    assert_eq!(failed.file.name(), "corrupt.wav");
    assert!(failed.error.is_some());
}

#[tokio::test]
async fn progress_only_moves_forward() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(
        dir.path(),
        &[("a.wav", 10), ("b.wav", 10), ("c.wav", 10), ("d.wav", 10)],
    );
    let workflow = workflow(ScriptedEngine::new(0, Duration::from_millis(5)));

    let reports: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&reports);
    let callbacks = BatchCallbacks {
        on_progress: Some(Arc::new(move |progress: &BatchProgress| {
            record.lock().unwrap().push(progress.overall_progress);
        })),
        ..Default::default()
    };

    workflow
        .start_batch(&paths, JobSettings::default(), BatchOptions::default(), callbacks)
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), workflow.wait_for_completion())
        .await
        .unwrap()
        .unwrap();

    let reports = reports.lock().unwrap();
    assert!(!reports.is_empty());
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(reports.last().copied(), Some(100.0));
}

#[tokio::test]
async fn transient_failures_are_retried_within_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(dir.path(), &[("a.wav", 10), ("b.wav", 10)]);
    let workflow = workflow(ScriptedEngine::new(1, Duration::ZERO));

    workflow
        .start_batch(&paths, JobSettings::default(), BatchOptions::default(), BatchCallbacks::default())
        .await
        .unwrap();
    let statuses = tokio::time::timeout(Duration::from_secs(5), workflow.wait_for_completion())
        .await
        .unwrap()
        .unwrap();

    assert!(statuses.iter().all(|s| s.status == FileStatus::Completed));
    assert!(statuses
        .iter()
        .all(|s| s.result.as_ref().map(|r| r.attempts) == Some(2)));
}

#[tokio::test]
async fn cancelled_batch_can_be_retried() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(dir.path(), &[("a.wav", 10), ("b.wav", 10)]);
    let workflow = workflow(ScriptedEngine::new(0, Duration::ZERO));
    workflow.queue().pause();

    workflow
        .start_batch(&paths, JobSettings::default(), BatchOptions::default(), BatchCallbacks::default())
        .await
        .unwrap();
    workflow.cancel_batch().unwrap();
    assert!(workflow.is_complete());

    workflow.queue().resume();
    assert_eq!(workflow.retry_failed_files(JobSettings::default()).unwrap(), 2);
    let statuses = tokio::time::timeout(Duration::from_secs(5), workflow.wait_for_completion())
        .await
        .unwrap()
        .unwrap();
    assert!(statuses.iter().all(|s| s.status == FileStatus::Completed));
}
