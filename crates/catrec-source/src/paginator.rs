use std::future::Future;

use catrec_core::error::FetchError;
use catrec_core::models::report::SourceStatus;
use tracing::{debug, warn};

/// One `offset`/`rows` slice of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub rows: u64,
}

impl Window {
    /// Exclusive upper offset.
    pub fn end(&self) -> u64 {
        self.offset + self.rows
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

/// Backward window sequence produced by [`Paginator::windows`].
#[derive(Debug, Clone)]
pub struct Windows {
    cursor: u64,
    size: u64,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.cursor == 0 {
            return None;
        }
        let top = self.cursor;
        let bottom = top.saturating_sub(self.size);
        self.cursor = bottom;
        Some(Window {
            offset: bottom,
            rows: top - bottom,
        })
    }
}

/// Everything gathered by one paginated walk.
#[derive(Debug, Clone, Default)]
pub struct PageCollection {
    pub items: Vec<String>,
    /// Total announced before the walk.
    pub total: u64,
    pub failed_windows: Vec<Window>,
    /// Windows that returned fewer rows than requested, with the actual count.
    pub short_windows: Vec<(Window, usize)>,
    pub cancelled: bool,
}

impl PageCollection {
    pub fn status(&self) -> SourceStatus {
        let mut status = SourceStatus::Complete;
        if !self.failed_windows.is_empty() {
            let list: Vec<String> = self.failed_windows.iter().map(Window::to_string).collect();
            status = status.merge(SourceStatus::degraded(format!(
                "windows {} failed",
                list.join(", ")
            )));
        }
        if !self.short_windows.is_empty() {
            let missing: u64 = self
                .short_windows
                .iter()
                .map(|(w, got)| w.rows.saturating_sub(*got as u64))
                .sum();
            status = status.merge(SourceStatus::degraded(format!(
                "{} windows under-reported by {missing} rows",
                self.short_windows.len()
            )));
        }
        if self.cancelled {
            status = status.merge(SourceStatus::degraded("cancelled"));
        }
        status
    }
}

/// Offset/rows pagination for catalogs that cap a single response.
///
/// A cursor starts at the announced total and walks backward in fixed-size
/// windows, so the last window fetched is the partial one starting at
/// offset 0. Windows are disjoint and cover `[0, total)` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    window_size: u64,
}

impl Paginator {
    /// `window_size` is clamped to at least 1.
    pub fn new(window_size: u64) -> Self {
        Self {
            window_size: window_size.max(1),
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    pub fn windows(&self, total: u64) -> Windows {
        Windows {
            cursor: total,
            size: self.window_size,
        }
    }

    /// Fetch every window of `total` items through `fetch`.
    ///
    /// A failed window is recorded and skipped; the walk stops early only on
    /// cancellation.
    pub async fn collect<F, Fut>(&self, total: u64, mut fetch: F) -> PageCollection
    where
        F: FnMut(Window) -> Fut,
        Fut: Future<Output = Result<Vec<String>, FetchError>>,
    {
        let mut collection = PageCollection {
            total,
            ..PageCollection::default()
        };

        for window in self.windows(total) {
            match fetch(window).await {
                Ok(items) => {
                    let got = items.len();
                    debug!(offset = window.offset, rows = window.rows, got, "window fetched");
                    if (got as u64) < window.rows {
                        warn!(
                            offset = window.offset,
                            rows = window.rows,
                            got,
                            "catalog returned fewer rows than requested"
                        );
                        collection.short_windows.push((window, got));
                    }
                    collection.items.extend(items);
                }
                Err(e) if e.is_cancelled() => {
                    collection.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(offset = window.offset, rows = window.rows, error = %e, "window lost");
                    collection.failed_windows.push(window);
                }
            }
        }

        collection
    }
}
