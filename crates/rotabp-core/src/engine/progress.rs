/// Events emitted while a factor graph is being filled and solved.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// The solver is about to run at most `total_chunks` convergence checks.
    SolveStart { total_chunks: u64 },
    ChunkFinished { iteration: usize, max_deviation: f64 },
    SolveFinish { iterations: usize, converged: bool },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::PhaseFinish);
    }

    #[test]
    fn reporter_forwards_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.report(Progress::SolveStart { total_chunks: 3 });
        reporter.report(Progress::SolveFinish {
            iterations: 2,
            converged: true,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                Progress::SolveStart { total_chunks: 3 },
                Progress::SolveFinish {
                    iterations: 2,
                    converged: true
                }
            ]
        );
    }
}
