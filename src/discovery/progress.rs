use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Pipeline stage carried by each [`Progress`] snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchingHomepage,
    FindingFriendLinks,
    FetchingFriendPage,
    FoundLinks,
    CheckingRss,
    ProcessingFeed,
    Complete,
}

/// A snapshot streamed to the progress callback.
///
/// `current`/`total` are only meaningful within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stage: Stage,
    pub message: String,
    pub detail: String,
    pub current: usize,
    pub total: usize,
    pub feed_name: String,
    pub found_count: usize,
}

pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

#[derive(Default)]
struct Counters {
    processed: usize,
    found: usize,
    total: usize,
}

/// Shared counters plus the optional callback.
///
/// Workers report from many tasks; the lock is held while the callback runs so
/// snapshots reach it in the order the counters changed.
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
    counters: Mutex<Counters>,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            counters: Mutex::new(Counters::default()),
        }
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Counters) -> Option<Progress>,
    {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = f(&mut counters);
        if let (Some(callback), Some(progress)) = (&self.callback, snapshot) {
            callback(&progress);
        }
    }

    pub(crate) fn stage(&self, stage: Stage, message: impl Into<String>, detail: impl Into<String>) {
        let (message, detail) = (message.into(), detail.into());
        self.update(|c| {
            Some(Progress {
                stage,
                message,
                detail,
                current: c.processed,
                total: c.total,
                feed_name: String::new(),
                found_count: c.found,
            })
        });
    }

    pub(crate) fn set_total(&self, total: usize) {
        self.update(|c| {
            c.total = total;
            None
        });
    }

    pub(crate) fn checking(&self, candidate: &str) {
        self.update(|c| {
            Some(Progress {
                stage: Stage::CheckingRss,
                message: format!("Checking {} of {}", c.processed + 1, c.total),
                detail: candidate.to_string(),
                current: c.processed,
                total: c.total,
                feed_name: String::new(),
                found_count: c.found,
            })
        });
    }

    /// Records one finished candidate; `feed_name` is set when it carried a feed.
    pub(crate) fn finished(&self, candidate: &str, feed_name: Option<&str>) {
        self.update(|c| {
            c.processed += 1;
            let stage = match feed_name {
                Some(_) => {
                    c.found += 1;
                    Stage::ProcessingFeed
                }
                None => Stage::CheckingRss,
            };
            Some(Progress {
                stage,
                message: format!("Checked {} of {}", c.processed, c.total),
                detail: candidate.to_string(),
                current: c.processed,
                total: c.total,
                feed_name: feed_name.unwrap_or_default().to_string(),
                found_count: c.found,
            })
        });
    }

    pub(crate) fn found_count(&self) -> usize {
        self.counters.lock().unwrap_or_else(|e| e.into_inner()).found
    }
}
