use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use sprout::engine::progress::{Progress, ProgressCallback};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SPINNER_TICK_MS: u64 = 80;

struct PhaseLine {
    bar: ProgressBar,
    phase: Option<&'static str>,
    started: Option<Instant>,
    /// Phases finished so far, with their wall time.
    completed: Vec<(&'static str, Duration)>,
}

/// Renders grow phases on one terminal line: a spinner while a phase
/// prepares, a counting bar while its task runs, and a check mark with the
/// elapsed time once it ends.
#[derive(Clone)]
pub struct CliProgressHandler {
    line: Arc<Mutex<PhaseLine>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target).with_style(spinner_style());
        Self {
            line: Arc::new(Mutex::new(PhaseLine {
                bar,
                phase: None,
                started: None,
                completed: Vec::new(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let line = Arc::clone(&self.line);
        Box::new(move |event| match line.lock() {
            Ok(mut line) => line.apply(event),
            Err(_) => warn!("Progress display lock was poisoned; dropping event."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseLine {
    fn apply(&mut self, event: Progress) {
        match event {
            Progress::PhaseStart { name } => {
                self.phase = Some(name);
                self.started = Some(Instant::now());
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_style(spinner_style());
                self.bar.set_message(name);
                self.bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::TaskStart { total_steps } => {
                self.bar.disable_steady_tick();
                self.bar.set_style(bar_style());
                self.bar.set_length(total_steps);
                self.bar.set_position(0);
            }
            Progress::TaskIncrement => self.bar.inc(1),
            Progress::TaskFinish => {
                if let Some(total) = self.bar.length() {
                    self.bar.set_position(total);
                }
            }
            Progress::PhaseFinish => {
                self.bar.disable_steady_tick();
                let Some(name) = self.phase.take() else {
                    return;
                };
                let elapsed = self.started.take().map(|t| t.elapsed()).unwrap_or_default();
                debug!(phase = name, seconds = elapsed.as_secs_f64(), "Phase finished.");
                self.completed.push((name, elapsed));
                self.bar.set_style(spinner_style());
                self.bar
                    .finish_with_message(format!("✓ {name} ({:.1}s)", elapsed.as_secs_f64()));
            }
            Progress::Message(text) => self.bar.println(format!("  {text}")),
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<22} [{bar:40.green/white}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{:.0}s", state.eta().as_secs_f64());
        })
        .progress_chars("=> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn hidden() -> CliProgressHandler {
        CliProgressHandler::with_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn task_events_drive_the_bar() {
        let handler = hidden();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Minimization" });
        callback(Progress::TaskStart { total_steps: 4 });
        callback(Progress::TaskIncrement);
        {
            let line = handler.line.lock().unwrap();
            assert_eq!(line.bar.message(), "Minimization");
            assert_eq!(line.bar.length(), Some(4));
            assert_eq!(line.bar.position(), 1);
        }

        callback(Progress::TaskFinish);
        assert_eq!(handler.line.lock().unwrap().bar.position(), 4);
    }

    #[test]
    fn finished_phases_are_recorded_in_order() {
        let handler = hidden();
        let callback = handler.get_callback();
        for name in ["Attachment", "Ranking"] {
            callback(Progress::PhaseStart { name });
            callback(Progress::PhaseFinish);
        }

        let line = handler.line.lock().unwrap();
        let names: Vec<_> = line.completed.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["Attachment", "Ranking"]);
        assert!(line.bar.is_finished());
        assert!(line.bar.message().starts_with("✓ Ranking ("));
        assert!(line.phase.is_none());
    }

    #[test]
    fn stray_phase_finish_is_ignored() {
        let handler = hidden();
        handler.get_callback()(Progress::PhaseFinish);
        assert!(handler.line.lock().unwrap().completed.is_empty());
    }

    #[test]
    fn events_from_worker_threads_are_applied() {
        let handler = hidden();
        let callback = handler.get_callback();
        callback(Progress::PhaseStart { name: "Clash Filtering" });
        callback(Progress::TaskStart { total_steps: 8 });

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    callback(Progress::TaskIncrement);
                    callback(Progress::TaskIncrement);
                });
            }
        });

        assert_eq!(handler.line.lock().unwrap().bar.position(), 8);
    }
}
