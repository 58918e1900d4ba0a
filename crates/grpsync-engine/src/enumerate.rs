//! Watermark-bounded change enumeration over the remote store.
//!
//! Pulls one page at a time and yields items one by one; a recurring master
//! suspends paging and its occurrence expansion is drained first. Nothing
//! here materializes a full result set.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};

use grpsync_core::{Filter, FolderId, RemoteItem, SessionSettings};
use grpsync_remote::{PageRequest, RemoteStore};

use crate::error::Result;
use crate::recurrence::SeriesExpansion;

/// Enumeration predicate: everything changed since the committed watermark,
/// plus anything that never acquired a local link. The second arm keeps
/// items that were skipped on an earlier pass (held lock, isolated failure)
/// visible even after the watermark moved past their version.
pub fn enumeration_filter(watermark: Option<DateTime<Utc>>) -> Filter {
    match watermark {
        Some(wm) => Filter::or(vec![
            Filter::modified_since(wm),
            Filter::is_null("crm_link"),
        ]),
        None => Filter::All,
    }
}

/// Lazy stream of changed remote items from one folder.
pub struct ChangeEnumerator<'a, R: ?Sized> {
    remote: &'a R,
    folder: FolderId,
    filter: Filter,
    window_start: NaiveDate,
    window_end: NaiveDate,
    buffer: VecDeque<RemoteItem>,
    expansion: Option<SeriesExpansion>,
    next_request: Option<PageRequest>,
    high_watermark: Option<DateTime<Utc>>,
}

impl<'a, R: RemoteStore + ?Sized> ChangeEnumerator<'a, R> {
    pub fn new(
        remote: &'a R,
        folder: FolderId,
        watermark: Option<DateTime<Utc>>,
        settings: &SessionSettings,
    ) -> Self {
        Self {
            remote,
            folder,
            filter: enumeration_filter(watermark),
            window_start: settings.sync_window_start.date_naive(),
            window_end: settings.window_end().date_naive(),
            buffer: VecDeque::new(),
            expansion: None,
            next_request: Some(PageRequest::first(settings.page_size)),
            high_watermark: watermark,
        }
    }

    /// Highest version seen so far; becomes the committed watermark when the
    /// pass succeeds.
    pub fn high_watermark(&self) -> Option<DateTime<Utc>> {
        self.high_watermark
    }

    /// Next changed item, or `None` when the folder is exhausted.
    pub async fn next(&mut self) -> Result<Option<RemoteItem>> {
        loop {
            if let Some(expansion) = &mut self.expansion {
                if let Some(instance) = expansion.next() {
                    return Ok(Some(instance));
                }
                self.expansion = None;
            }

            if let Some(item) = self.buffer.pop_front() {
                self.observe(item.version);
                if item.is_recurring_master() {
                    self.expansion =
                        SeriesExpansion::new(item, self.window_start, self.window_end);
                    continue;
                }
                return Ok(Some(item));
            }

            let Some(request) = self.next_request else {
                return Ok(None);
            };
            let page = self
                .remote
                .search(&self.folder, &self.filter, request)
                .await?;
            self.next_request = page.next_offset.map(|o| request.continue_at(o));
            self.buffer.extend(page.items);
            if self.buffer.is_empty() && self.next_request.is_none() {
                return Ok(None);
            }
        }
    }

    fn observe(&mut self, version: DateTime<Utc>) {
        if self.high_watermark.map_or(true, |wm| version > wm) {
            self.high_watermark = Some(version);
        }
    }
}
