use chrono::Local;
use std::sync::{Arc, Mutex};

/// Append-only trace of one top level case run. Nested runs share the parent's
/// sink, only the outermost executor joins and returns the text.
#[derive(Clone, Default)]
pub struct CaseLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, content: impl Into<String>) {
        let stamped = format!(
            "[{}]: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            content.into()
        );
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(stamped);
        }
    }

    pub fn join(&self) -> String {
        match self.lines.lock() {
            Ok(lines) => lines.join("\n"),
            Err(_) => String::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
