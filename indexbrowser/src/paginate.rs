//! Pagination over countable, sliceable result sets.
//!
//! Page numbers here are 1-based. The browser's `p` parameter is 0-based and
//! is translated at the view boundary.

use std::convert::Infallible;
use thiserror::Error;

/// An ordered result set that can be counted and sliced.
pub trait Cursor {
    type Item;
    type Error;

    fn count(&self) -> Result<usize, Self::Error>;

    fn slice(&self, offset: usize, limit: usize) -> Result<Vec<Self::Item>, Self::Error>;
}

impl<T: Clone> Cursor for Vec<T> {
    type Item = T;
    type Error = Infallible;

    fn count(&self) -> Result<usize, Infallible> {
        Ok(self.len())
    }

    fn slice(&self, offset: usize, limit: usize) -> Result<Vec<T>, Infallible> {
        Ok(self.iter().skip(offset).take(limit).cloned().collect())
    }
}

#[derive(Error, Debug)]
pub enum PageError<E> {
    #[error("invalid page {number}: {reason}")]
    InvalidPage { number: usize, reason: &'static str },

    #[error(transparent)]
    Cursor(E),
}

/// One page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub number: usize,
    pub object_list: Vec<T>,
    pub num_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }
}

/// Splits a [`Cursor`] into pages of `per_page` items.
///
/// An empty result set still has one (empty) first page.
pub struct Paginator<C: Cursor> {
    cursor: C,
    per_page: usize,
    count: usize,
}

impl<C: Cursor> Paginator<C> {
    pub fn new(cursor: C, per_page: usize) -> Result<Self, C::Error> {
        let count = cursor.count()?;
        Ok(Self {
            cursor,
            per_page: per_page.max(1),
            count,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn num_pages(&self) -> usize {
        if self.count == 0 {
            1
        } else {
            self.count.div_ceil(self.per_page)
        }
    }

    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    pub fn page(&self, number: usize) -> Result<Page<C::Item>, PageError<C::Error>> {
        if number < 1 {
            return Err(PageError::InvalidPage {
                number,
                reason: "page number is less than 1",
            });
        }
        if number > self.num_pages() {
            return Err(PageError::InvalidPage {
                number,
                reason: "page contains no results",
            });
        }
        let offset = (number - 1) * self.per_page;
        let object_list = self
            .cursor
            .slice(offset, self.per_page)
            .map_err(PageError::Cursor)?;
        Ok(Page {
            number,
            object_list,
            num_pages: self.num_pages(),
        })
    }
}
