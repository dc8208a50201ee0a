//! Where command output and non-silent errors go.

use std::sync::{Arc, Mutex};

pub trait OutputSink: Send + Sync {
    fn print(&self, text: &str);
    fn print_error(&self, text: &str);
}

/// Writes to the process's stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn print(&self, text: &str) {
        println!("{}", text);
    }

    fn print_error(&self, text: &str) {
        eprintln!("cmdlang: {}", text);
    }
}

/// Keeps every line in memory. Errors are stored with an `error: ` prefix.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl OutputSink for BufferSink {
    fn print(&self, text: &str) {
        self.push(text.to_string());
    }

    fn print_error(&self, text: &str) {
        self.push(format!("error: {}", text));
    }
}
