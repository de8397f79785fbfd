//! End-to-end session tests
//!
//! Full drill runs over scripted speech ports: configuration validation,
//! scoring, timeout handling, and early termination.

use std::sync::Arc;
use std::time::Duration;

use mathdrill::{
    Difficulty, DrillConfig, Error, Language, Operation, Outcome, SessionController, SessionState,
};

mod common;

use common::{FakeVoice, Listen};
use tokio_test::assert_ok;

fn easy_addition(tasks_count: usize) -> DrillConfig {
    let mut config = DrillConfig::new(vec![Operation::Addition], Difficulty::Easy, Language::En);
    config.tasks_count = tasks_count;
    config.time_limit = Duration::from_secs(20);
    config
}

#[tokio::test(start_paused = true)]
async fn five_correct_answers_score_one_hundred_percent() {
    let fake = Arc::new(FakeVoice::new(vec![]));
    let mut controller = SessionController::new(fake.clone(), fake.clone());

    controller.start(easy_addition(5)).unwrap();
    assert_eq!(controller.state(), SessionState::Running);

    // Answer every generated task correctly
    for task in controller.tasks() {
        fake.push(Listen::Final(task.answer.to_string()));
    }

    let summary = assert_ok!(controller.run().await);

    assert_eq!(summary.total, 5);
    assert_eq!(summary.correct, 5);
    assert_eq!(summary.accuracy_percent, 100);
    assert!(summary.results.iter().all(|r| r.outcome == Outcome::Correct));
    assert!(summary.average_response.is_some());
    assert_eq!(controller.state(), SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn unanswered_question_times_out_and_session_continues() {
    let fake = Arc::new(FakeVoice::new(vec![]));
    let mut controller = SessionController::new(fake.clone(), fake.clone());

    controller.start(easy_addition(5)).unwrap();

    // Answer #3 never arrives
    let tasks: Vec<_> = controller.tasks().to_vec();
    for (index, task) in tasks.iter().enumerate() {
        if index == 2 {
            fake.push(Listen::Silence);
        } else {
            fake.push(Listen::Final(task.answer.to_string()));
        }
    }

    let summary = controller.run().await.unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(summary.correct, 4);
    assert_eq!(summary.accuracy_percent, 80);
    assert_eq!(summary.results[2].outcome, Outcome::Timeout);
    assert_eq!(summary.results[2].answer, None);
    assert_eq!(controller.state(), SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn empty_operation_set_fails_start() {
    let fake = Arc::new(FakeVoice::new(vec![]));
    let mut controller = SessionController::new(fake.clone(), fake.clone());

    let mut config = easy_addition(5);
    config.operations.clear();

    let err = controller.start(config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(controller.state(), SessionState::NotStarted);
    assert!(controller.tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn out_of_range_task_count_fails_start() {
    let fake = Arc::new(FakeVoice::new(vec![]));
    let mut controller = SessionController::new(fake.clone(), fake.clone());

    let err = controller.start(easy_addition(3)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(controller.state(), SessionState::NotStarted);
}

#[tokio::test(start_paused = true)]
async fn ending_early_freezes_accumulated_results() {
    let fake = Arc::new(FakeVoice::new(vec![]));
    let mut controller = SessionController::new(fake.clone(), fake.clone());

    controller.start(easy_addition(5)).unwrap();

    // First task gets a correct answer, the second never resolves
    let first_answer = controller.tasks()[0].answer.to_string();
    fake.push(Listen::Final(first_answer));
    fake.push(Listen::Silence);

    let handle = controller.handle();
    tokio::spawn(async move {
        // Well into question two, before its 20s deadline
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.end();
    });

    let summary = controller.run().await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.accuracy_percent, 100);
    assert_eq!(controller.state(), SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn skipped_task_records_one_result() {
    let fake = Arc::new(FakeVoice::new(vec![]));
    let mut controller = SessionController::new(fake.clone(), fake.clone());

    controller.start(easy_addition(5)).unwrap();

    let tasks: Vec<_> = controller.tasks().to_vec();
    fake.push(Listen::Silence); // task 1 will be skipped mid-listen
    for task in &tasks[1..] {
        fake.push(Listen::Final(task.answer.to_string()));
    }

    let handle = controller.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.skip();
    });

    let summary = controller.run().await.unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(summary.results[0].outcome, Outcome::Skipped);
    assert_eq!(summary.correct, 4);
    assert_eq!(summary.accuracy_percent, 80);
}

#[tokio::test(start_paused = true)]
async fn session_cannot_run_before_start() {
    let fake = Arc::new(FakeVoice::new(vec![]));
    let mut controller = SessionController::new(fake.clone(), fake.clone());

    let err = controller.run().await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(controller.state(), SessionState::NotStarted);
}
