//! Feedback presenter: shows the outcome of a submission and clears it later.
//!
//! At most one state is visible at a time. Showing a state first clears the
//! surface, then renders, then arms an auto-clear timer for that state's
//! timeout. A newer `show` invalidates older timers through a generation
//! counter, so a stale timer never hides a fresher message.

use crate::config::FeedbackConfig;
use crate::error::Result;
use crate::models::Confirmation;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackState {
    Pending,
    Success,
    Error,
}

impl FeedbackState {
    pub fn glyph(&self) -> &'static str {
        match self {
            FeedbackState::Pending => "⏳",
            FeedbackState::Success => "✅",
            FeedbackState::Error => "❌",
        }
    }

    fn timeout(&self, config: &FeedbackConfig) -> Option<Duration> {
        let ms = match self {
            FeedbackState::Pending => config.pending_timeout_ms,
            FeedbackState::Success => config.success_timeout_ms,
            FeedbackState::Error => config.error_timeout_ms,
        };
        (ms > 0).then(|| Duration::from_millis(ms))
    }
}

impl fmt::Display for FeedbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeedbackState::Pending => "pending",
            FeedbackState::Success => "success",
            FeedbackState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Where feedback is drawn.
pub trait Surface: Send + 'static {
    fn render(&mut self, state: FeedbackState, message: &str);
    fn clear(&mut self);
}

/// Writes one status line per state to stderr.
#[derive(Debug, Default)]
pub struct TerminalSurface;

impl Surface for TerminalSurface {
    fn render(&mut self, state: FeedbackState, message: &str) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{} {}", state.glyph(), message);
    }

    // A terminal line cannot be taken back.
    fn clear(&mut self) {}
}

// ---------------------------------------------------------------------------
// FeedbackPresenter
// ---------------------------------------------------------------------------

struct Shared<S> {
    surface: S,
    visible: Option<(FeedbackState, String)>,
    generation: u64,
}

pub struct FeedbackPresenter<S: Surface> {
    shared: Arc<Mutex<Shared<S>>>,
    config: FeedbackConfig,
}

impl<S: Surface> Clone for FeedbackPresenter<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            config: self.config.clone(),
        }
    }
}

fn lock<S>(shared: &Mutex<Shared<S>>) -> MutexGuard<'_, Shared<S>> {
    // Rendering holds no invariants worth refusing to draw over.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: Surface> FeedbackPresenter<S> {
    pub fn new(surface: S, config: FeedbackConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                surface,
                visible: None,
                generation: 0,
            })),
            config,
        }
    }

    /// Replace whatever is visible with `state`.
    pub fn show(&self, state: FeedbackState, message: &str) {
        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            if shared.visible.take().is_some() {
                shared.surface.clear();
            }
            shared.surface.render(state, message);
            shared.visible = Some((state, message.to_string()));
            shared.generation
        };
        tracing::debug!(%state, message, "feedback shown");

        if let Some(timeout) = state.timeout(&self.config) {
            let shared = self.shared.clone();
            thread::spawn(move || {
                thread::sleep(timeout);
                let mut shared = lock(&shared);
                if shared.generation == generation && shared.visible.is_some() {
                    shared.visible = None;
                    shared.surface.clear();
                }
            });
        }
    }

    pub fn pending(&self, message: &str) {
        self.show(FeedbackState::Pending, message);
    }

    pub fn success(&self, message: &str) {
        self.show(FeedbackState::Success, message);
    }

    pub fn error(&self, message: &str) {
        self.show(FeedbackState::Error, message);
    }

    /// Show the outcome of a submission.
    pub fn present(&self, outcome: &Result<Confirmation>) {
        match outcome {
            Ok(c) if c.success => self.success(&c.message),
            Ok(c) => self.error(&c.message),
            Err(e) => self.error(&e.user_message()),
        }
    }

    /// Clear the surface now and cancel any pending auto-clear.
    pub fn hide(&self) {
        let mut shared = lock(&self.shared);
        shared.generation += 1;
        if shared.visible.take().is_some() {
            shared.surface.clear();
        }
    }

    /// The state and message currently shown, if any.
    pub fn visible(&self) -> Option<(FeedbackState, String)> {
        lock(&self.shared).visible.clone()
    }

    /// Run `f` against the surface, e.g. to inspect a test double.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&lock(&self.shared).surface)
    }
}

// ---------------------------------------------------------------------------
// SubmitGuard
// ---------------------------------------------------------------------------

/// Advisory "submission in progress" flag for one UI control.
///
/// It only stops re-entry from the same control; other clients still submit
/// concurrently.
#[derive(Debug, Clone, Default)]
pub struct SubmitGuard {
    busy: Arc<AtomicBool>,
}

/// Held while a submission is in flight; releases the guard on drop.
#[derive(Debug)]
pub struct SubmitToken {
    busy: Arc<AtomicBool>,
}

impl SubmitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another submission holds the guard.
    pub fn try_begin(&self) -> Option<SubmitToken> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitToken {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SubmitToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
