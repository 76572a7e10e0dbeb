//! Tests for the feedback presenter and the submit guard.

mod common;

use common::{Drawn, RecordingSurface};
use distribution_records::config::FeedbackConfig;
use distribution_records::error::Error;
use distribution_records::presenter::{FeedbackPresenter, FeedbackState, SubmitGuard};
use distribution_records::Confirmation;
use std::thread;
use std::time::Duration;

fn presenter(success_ms: u64, error_ms: u64) -> (FeedbackPresenter<RecordingSurface>, RecordingSurface) {
    let surface = RecordingSurface::default();
    let config = FeedbackConfig {
        pending_timeout_ms: 0,
        success_timeout_ms: success_ms,
        error_timeout_ms: error_ms,
    };
    (FeedbackPresenter::new(surface.clone(), config), surface)
}

#[test]
fn only_one_state_is_visible() {
    let (presenter, surface) = presenter(0, 0);
    presenter.pending("Submitting...");
    presenter.success("Record saved");

    assert_eq!(
        presenter.visible(),
        Some((FeedbackState::Success, "Record saved".to_string()))
    );
    assert_eq!(
        surface.log(),
        vec![
            Drawn::Render(FeedbackState::Pending, "Submitting...".into()),
            Drawn::Clear,
            Drawn::Render(FeedbackState::Success, "Record saved".into()),
        ]
    );
}

#[test]
fn zero_timeout_keeps_state_until_replaced() {
    let (presenter, surface) = presenter(0, 0);
    presenter.success("kept");
    thread::sleep(Duration::from_millis(80));
    assert_eq!(surface.showing(), Some(FeedbackState::Success));
}

#[test]
fn state_clears_after_its_timeout() {
    let (presenter, surface) = presenter(40, 0);
    presenter.success("Record saved");
    assert!(presenter.visible().is_some());

    thread::sleep(Duration::from_millis(200));
    assert!(presenter.visible().is_none());
    assert_eq!(surface.showing(), None);
    assert_eq!(surface.log().last(), Some(&Drawn::Clear));
}

#[test]
fn newer_state_cancels_older_auto_clear() {
    let (presenter, surface) = presenter(0, 100);
    presenter.error("network down");
    thread::sleep(Duration::from_millis(30));
    presenter.success("Record saved");

    thread::sleep(Duration::from_millis(200));
    assert_eq!(surface.showing(), Some(FeedbackState::Success));
    assert_eq!(
        surface.log(),
        vec![
            Drawn::Render(FeedbackState::Error, "network down".into()),
            Drawn::Clear,
            Drawn::Render(FeedbackState::Success, "Record saved".into()),
        ]
    );
}

#[test]
fn hide_clears_and_cancels() {
    let (presenter, surface) = presenter(50, 0);
    presenter.success("x");
    presenter.hide();
    presenter.hide();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(surface.log().iter().filter(|d| **d == Drawn::Clear).count(), 1);
}

#[test]
fn present_maps_outcomes() {
    let (presenter, _) = presenter(0, 0);

    presenter.present(&Ok(Confirmation::ok("Record saved")));
    assert_eq!(presenter.visible().unwrap().0, FeedbackState::Success);

    presenter.present(&Ok(Confirmation::failed("missing required fields: id")));
    assert_eq!(
        presenter.visible(),
        Some((FeedbackState::Error, "missing required fields: id".into()))
    );

    presenter.present(&Err(Error::Transport("timed out".into())));
    let (state, message) = presenter.visible().unwrap();
    assert_eq!(state, FeedbackState::Error);
    assert!(message.contains("timed out"));
}

#[test]
fn glyphs_and_names() {
    assert_eq!(FeedbackState::Pending.glyph(), "⏳");
    assert_eq!(FeedbackState::Success.glyph(), "✅");
    assert_eq!(FeedbackState::Error.glyph(), "❌");
    assert_eq!(FeedbackState::Error.to_string(), "error");
}

// ---------------------------------------------------------------------------
// SubmitGuard
// ---------------------------------------------------------------------------

#[test]
fn guard_refuses_reentry_until_token_drops() {
    let guard = SubmitGuard::new();
    let token = guard.try_begin().unwrap();
    assert!(guard.is_busy());
    assert!(guard.try_begin().is_none());
    assert!(guard.clone().try_begin().is_none());

    drop(token);
    assert!(!guard.is_busy());
    assert!(guard.try_begin().is_some());
}

#[test]
fn guard_admits_one_of_many_threads() {
    let guard = SubmitGuard::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = guard.clone();
            thread::spawn(move || {
                guard.try_begin().map(|token| {
                    thread::sleep(Duration::from_millis(50));
                    drop(token);
                })
            })
        })
        .collect();
    let admitted = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .count();
    assert!(admitted >= 1);
    assert!(!guard.is_busy());
}
