//! Pagination primitives for remote search.
//!
//! Remote calls are synchronous and paginated: a search returns one page and
//! an optional continuation offset. Callers must loop fetch → yield →
//! advance-offset until no continuation remains; windows can span months, so
//! nothing may materialize an entire result set.

/// One page request: offset plus a bounded page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { offset: 0, size }
    }

    /// The request for the continuation returned by a page.
    pub fn continue_at(&self, next_offset: usize) -> Self {
        Self {
            offset: next_offset,
            size: self.size,
        }
    }
}

/// One page of results with an optional "more results available" signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Offset of the next page; `None` when this page is the last.
    pub next_offset: Option<usize>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_offset: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_offset.is_some()
    }

    /// Slice a full result set into the requested page.
    ///
    /// Helper for in-memory implementations; real backends page natively.
    pub fn slice(mut all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len();
        if request.offset >= total {
            return Self::last(Vec::new());
        }
        let end = (request.offset + request.size.max(1)).min(total);
        let items: Vec<T> = all.drain(request.offset..end).collect();
        Self {
            items,
            next_offset: (end < total).then_some(end),
        }
    }
}
