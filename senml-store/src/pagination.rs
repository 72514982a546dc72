//! Paged range queries.
//!
//! A page is fully described by its query: the planner keeps no state between
//! calls. The cursor returned with a page is the time of the first entry of the
//! following page; feeding it back through [`Query::next_page`] yields that
//! page, and so on until a page comes back without a cursor.

use tracing::{debug, info};

use crate::{
    engine::TimeSeriesEngine,
    error::Result,
    query::Query,
    reader,
    senml::MeasurementPack,
    time::key_to_seconds,
};

/// One page of a range query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub pack: MeasurementPack,
    /// Time of the first entry of the next page; `None` on the last page.
    pub cursor: Option<f64>,
}

/// Where every page of a range starts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageIndex {
    /// Time of the first entry of each page, in query order.
    pub boundaries: Vec<f64>,
    /// Number of entries in the whole range.
    pub count: usize,
}

/// Fetches the page of `query`.
pub fn query<E: TimeSeriesEngine + ?Sized>(engine: &E, query: &Query) -> Result<Page> {
    query.validate()?;
    let keys = query.to_keys()?;
    info!(
        series = %query.series,
        start = query.start,
        end = query.end,
        sort = %query.sort,
        limit = query.limit,
        "Querying page"
    );

    let (pack, next) = reader::drain(engine.scan_range(&keys)).into_result()?;
    let cursor = next.map(key_to_seconds);
    debug!(series = %query.series, records = pack.len(), ?cursor, "Page fetched");
    Ok(Page { pack, cursor })
}

/// Computes the start of every `query.limit`-sized page of the range.
pub fn pages<E: TimeSeriesEngine + ?Sized>(engine: &E, query: &Query) -> Result<PageIndex> {
    query.validate()?;
    let keys = query.to_keys()?;
    let (boundaries, count) = engine.page_boundaries(&keys)?;
    debug!(series = %query.series, pages = boundaries.len(), count, "Computed page boundaries");
    Ok(PageIndex {
        boundaries: boundaries.into_iter().map(key_to_seconds).collect(),
        count,
    })
}

/// Iterator over all pages of a range, following cursors.
///
/// Stops after the first page without a cursor, or after yielding an error.
pub struct Paginator<'a, E: TimeSeriesEngine + ?Sized> {
    engine: &'a E,
    next: Option<Query>,
}

impl<'a, E: TimeSeriesEngine + ?Sized> Paginator<'a, E> {
    pub fn new(engine: &'a E, query: Query) -> Self {
        Self {
            engine,
            next: Some(query),
        }
    }
}

impl<'a, E: TimeSeriesEngine + ?Sized> Iterator for Paginator<'a, E> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Result<Page>> {
        let current = self.next.take()?;
        let page = query(self.engine, &current);
        if let Ok(Page {
            cursor: Some(cursor),
            ..
        }) = &page
        {
            self.next = Some(current.next_page(*cursor));
        }
        Some(page)
    }
}
