use std::num::NonZeroUsize;

/// Offset-based position within a paginated feed
///
/// `offset` is always a multiple of `page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page_size: NonZeroUsize,
    offset: usize,
}

impl PageCursor {
    pub fn new(page_size: NonZeroUsize) -> Self {
        Self {
            page_size,
            offset: 0,
        }
    }

    /// Like [`Self::new`], but `None` for a page size of zero
    pub fn try_new(page_size: usize) -> Option<Self> {
        NonZeroUsize::new(page_size).map(Self::new)
    }

    pub fn page_size(&self) -> usize {
        self.page_size.get()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Position of the next page
    pub fn advance(&mut self) {
        self.offset = self.offset.saturating_add(self.page_size.get());
    }

    pub fn next(self) -> Self {
        let mut next = self;
        next.advance();
        next
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Whether another page may exist after a fetch returned `raw_len` items
    ///
    /// Only a full page can be followed by more. At an exact multiple of the
    /// page size this reports one page too many, which costs a single empty
    /// fetch.
    pub fn has_more_after(&self, raw_len: usize) -> bool {
        self.page_size.get() <= raw_len
    }
}
