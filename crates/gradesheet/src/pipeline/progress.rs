/// Events emitted by the batch runner as it works.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Step {
        step: usize,
        total: usize,
        name: String,
    },
    StudentGraded {
        index: usize,
        total: usize,
        student: String,
        score: f64,
        max: f64,
    },
    StudentFailed {
        index: usize,
        total: usize,
        student: String,
        error: String,
    },
    Finished {
        graded: usize,
        errors: usize,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and headless runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to a closure.
pub struct FnProgress<F>(pub F);

impl<F> ProgressReporter for FnProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}
