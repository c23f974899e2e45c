use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Thread-safe multi-bar progress display keyed by task name. Producers
/// call [`Progress::report`] as often as they like; a bar appears on the
/// first report for its name and disappears once `done` reaches `out_of`.
/// Under lock contention an update is dropped, the next report for the
/// same name repaints it.
#[derive(Clone)]
pub struct Progress {
    inner: Arc<ProgressInner>,
}

struct ProgressInner {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// A reporter that renders nothing. Used by tests and quiet callers.
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(
            "{msg:>20} [{bar:50}] {pos} / {len}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        Self {
            inner: Arc::new(ProgressInner {
                multi: MultiProgress::with_draw_target(target),
                style,
                bars: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn report(&self, name: &str, done: u64, out_of: u64) {
        let Ok(mut bars) = self.inner.bars.try_lock() else {
            return;
        };

        if done >= out_of {
            if let Some(bar) = bars.remove(name) {
                bar.finish_and_clear();
                self.inner.multi.remove(&bar);
            }
            return;
        }

        let bar = bars.entry(name.to_owned()).or_insert_with(|| {
            let bar = self.inner.multi.add(ProgressBar::new(out_of));
            bar.set_style(self.inner.style.clone());
            bar.set_message(name.to_owned());
            bar
        });
        if bar.length() != Some(out_of) {
            bar.set_length(out_of);
        }
        bar.set_position(done);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_appear_and_clear() {
        let progress = Progress::hidden();
        progress.report("FARES.ZIP", 10, 100);
        progress.report("TIMETABLE.ZIP", 5, 50);
        {
            let bars = progress.inner.bars.lock().unwrap();
            assert_eq!(bars.len(), 2);
        }

        progress.report("FARES.ZIP", 100, 100);
        {
            let bars = progress.inner.bars.lock().unwrap();
            assert_eq!(bars.len(), 1);
            assert!(bars.contains_key("TIMETABLE.ZIP"));
        }
    }

    #[test]
    fn reports_are_safe_from_many_threads() {
        let progress = Progress::hidden();
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let progress = progress.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        progress.report(&format!("worker {worker}"), i, 100);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // Contended updates may drop, but the registry never grows past
        // one bar per worker.
        let bars = progress.inner.bars.lock().unwrap();
        assert!(bars.len() <= 8);
    }
}
