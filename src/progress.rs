use std::io::{self, Write};
use std::time::Instant;

/// Receives diagnostics from the extraction core. Implementations must not
/// influence what the core produces.
pub trait Observer {
    fn info(&self, _msg: &str) {}

    /// A malformed fragment was skipped (unclosed element, dangling comment range, ...).
    fn anomaly(&self, _what: &str, _detail: &str) {}
}

pub struct NullObserver;

impl Observer for NullObserver {}

pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}", msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] warning: {}", msg.as_ref());
    }
}

impl Observer for ConsoleProgress {
    fn info(&self, msg: &str) {
        ConsoleProgress::info(self, msg);
    }

    fn anomaly(&self, what: &str, detail: &str) {
        self.warn(format!("skipped {what}: {detail}"));
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
