use chrono::{DateTime, Local};
use parking_lot::Mutex;

/// One successful analysis, as listed on the history screen.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub analyzed_at: DateTime<Local>,
    pub image_uri: String,
    pub summary: String,
}

impl HistoryEntry {
    /// First non-empty line of the summary, for list rows.
    pub fn headline(&self) -> &str {
        self.summary
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
    }
}

/// Analyses made during this process, newest first. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MealHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MealHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, image_uri: &str, summary: &str) {
        self.entries.lock().insert(
            0,
            HistoryEntry {
                analyzed_at: Local::now(),
                image_uri: image_uri.to_string(),
                summary: summary.to_string(),
            },
        );
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
