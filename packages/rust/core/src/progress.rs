//! Progress callbacks for long-running commands.

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a package's fields are fetched.
    fn package_started(&self, package_id: &str, current: usize, total: usize);
    /// Called once the command has finished.
    fn finish(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn package_started(&self, _package_id: &str, _current: usize, _total: usize) {}
    fn finish(&self, _message: &str) {}
}
