//! Wave progress display driven by scheduler events.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::services::SchedulerEvent;

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Channel capacity for scheduler events.
pub const EVENT_BUFFER: usize = 256;

/// Progress bar over the tasks of one build.
pub struct WaveProgress {
    bar: ProgressBar,
}

impl WaveProgress {
    /// Bar on the terminal; its length arrives with `Started`.
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars(PROGRESS_CHARS));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A progress bar that draws nothing, for JSON mode and tests.
    pub fn hidden() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        Self { bar }
    }

    /// Tasks finished so far.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Total tasks, once known.
    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }

    /// Advance the bar for one scheduler event.
    pub fn handle(&mut self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::Started {
                total_tasks,
                already_completed,
            } => {
                self.bar.set_length(*total_tasks as u64);
                self.bar.set_position(*already_completed as u64);
                self.bar.set_message("starting");
            }
            SchedulerEvent::WaveStarted { wave, task_ids } => {
                self.bar
                    .set_message(format!("wave {wave}: {} task(s)", task_ids.len()));
            }
            SchedulerEvent::TaskStarted { .. } => {}
            SchedulerEvent::TaskCompleted { task_id, outcome } => {
                self.bar.inc(1);
                if !outcome.is_complete() {
                    self.bar.println(format!(
                        "  ! {task_id}: {} placeholder(s), {} missing",
                        outcome.placeholders.len(),
                        outcome.missing.len()
                    ));
                }
            }
            SchedulerEvent::WaveCompleted {
                wave,
                completed_total,
            } => {
                self.bar.set_position(*completed_total as u64);
                self.bar.set_message(format!("wave {wave} done"));
            }
            SchedulerEvent::Finished { waves, .. } => {
                self.bar
                    .finish_with_message(format!("✓ generated in {waves} wave(s)"));
            }
        }
    }

    /// Drain `rx` on a background task until every sender is dropped.
    pub fn spawn(mut self, mut rx: mpsc::Receiver<SchedulerEvent>) -> JoinHandle<Self> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle(&event);
            }
            if !self.bar.is_finished() {
                self.bar.abandon();
            }
            self
        })
    }
}

impl Default for WaveProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TaskOutcome;

    #[tokio::test]
    async fn test_tracks_scheduler_events() {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let handle = WaveProgress::hidden().spawn(rx);

        tx.send(SchedulerEvent::Started {
            total_tasks: 3,
            already_completed: 1,
        })
        .await
        .unwrap();
        tx.send(SchedulerEvent::TaskCompleted {
            task_id: "b".into(),
            outcome: TaskOutcome::default(),
        })
        .await
        .unwrap();
        tx.send(SchedulerEvent::WaveCompleted {
            wave: 1,
            completed_total: 3,
        })
        .await
        .unwrap();
        drop(tx);

        let progress = handle.await.unwrap();
        assert_eq!(progress.length(), Some(3));
        assert_eq!(progress.position(), 3);
    }
}
