//! Search progress logging.

/// How chatty the drivers are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// No output (the default).
    #[default]
    Silent,
    /// Seed starts, accepted steps, permutation progress.
    Info,
    /// Additionally every rejected step.
    Debug,
}

/// Plain stdout logger gated by [`Verbosity`].
#[derive(Clone, Copy, Debug)]
pub struct SearchLogger {
    verbosity: Verbosity,
}

impl SearchLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn log_seed(&self, label: &str, score: f64) {
        if self.verbosity >= Verbosity::Info {
            println!("[metafeat] seed '{label}' score {score:.6}");
        }
    }

    pub fn log_step(&self, action: &str, label: &str, score: f64, size: usize) {
        if self.verbosity >= Verbosity::Info {
            println!("[metafeat] {action} '{label}' -> score {score:.6} (size {size})");
        }
    }

    pub fn log_rejected(&self, action: &str, score: f64, best: f64) {
        if self.verbosity >= Verbosity::Debug {
            println!("[metafeat] {action} rejected: {score:.6} <= {best:.6}");
        }
    }

    pub fn log_finish(&self, size: usize, best: f64) {
        if self.verbosity >= Verbosity::Info {
            println!("[metafeat] done: {size} features, best score {best:.6}");
        }
    }

    pub fn log_permutation(&self, done: usize, total: usize) {
        if self.verbosity >= Verbosity::Info && (done % 100 == 0 || done == total) {
            println!("[metafeat] permutation {done}/{total}");
        }
    }
}
