//! Range query parameters shared by the planner and the engine.
use std::{fmt, str::FromStr};

use crate::{
    error::{Result, StoreError},
    time::seconds_to_key,
};

/// Order in which a range query returns entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sort {
    /// Oldest entry first.
    #[default]
    Asc,
    /// Newest entry first.
    Desc,
}

impl Sort {
    pub const ASC: &'static str = "asc";
    pub const DESC: &'static str = "desc";
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Asc => f.write_str(Self::ASC),
            Sort::Desc => f.write_str(Self::DESC),
        }
    }
}

impl FromStr for Sort {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            Self::ASC => Ok(Sort::Asc),
            Self::DESC => Ok(Sort::Desc),
            other => Err(StoreError::InvalidQuery(format!(
                "unknown sort order '{other}', expected '{}' or '{}'",
                Self::ASC,
                Self::DESC
            ))),
        }
    }
}

/// A bounded, sorted, page-limited read of one series.
///
/// Both bounds are inclusive. `T` is `f64` seconds at the public surface
/// ([`Query`]) and `i64` nanosecond keys at the engine boundary ([`KeyQuery`]).
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery<T> {
    pub series: String,
    pub start: T,
    pub end: T,
    pub sort: Sort,
    /// Maximum number of entries per page.
    pub limit: usize,
}

/// A range query in SenML seconds.
pub type Query = RangeQuery<f64>;

/// A range query in engine keys.
pub type KeyQuery = RangeQuery<i64>;

impl<T: PartialOrd + Copy> RangeQuery<T> {
    pub fn new(series: impl Into<String>, start: T, end: T) -> Self {
        Self {
            series: series.into(),
            start,
            end,
            sort: Sort::Asc,
            limit: 0,
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn contains(&self, t: T) -> bool {
        self.start <= t && t <= self.end
    }

    /// The query for the page that starts at `cursor`.
    ///
    /// Ascending pages move the start bound forward; descending pages move the
    /// end bound back. The cursor entry itself is the first entry of the page.
    pub fn next_page(&self, cursor: T) -> Self {
        let mut next = self.clone();
        match self.sort {
            Sort::Asc => next.start = cursor,
            Sort::Desc => next.end = cursor,
        }
        next
    }
}

impl Query {
    /// Rejects queries that cannot be paginated.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(StoreError::InvalidQuery(
                "page limit must be greater than zero".to_string(),
            ));
        }
        // Also rejects NaN bounds.
        if !(self.start <= self.end) {
            return Err(StoreError::InvalidQuery(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub(crate) fn to_keys(&self) -> Result<KeyQuery> {
        Ok(KeyQuery {
            series: self.series.clone(),
            start: seconds_to_key(self.start)?,
            end: seconds_to_key(self.end)?,
            sort: self.sort,
            limit: self.limit,
        })
    }
}
