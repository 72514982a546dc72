// --- Scenario tests over the whole store ---
use std::path::Path;

use anyhow::Result;
use tempfile::tempdir;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use super::*;
use crate::{engine::EntryStream, query::KeyQuery, time::seconds_to_key};

// Helper to initialize logging for tests
fn setup_logging() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("senml_store=trace".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

// Each test gets its own store; the tempdir is removed when it drops.
fn create_test_store(path: Option<&Path>) -> Result<SenmlStore> {
    let config = match path {
        Some(path) => StoreConfig::persistent(path),
        None => StoreConfig::in_memory(),
    };
    Ok(SenmlStore::connect(config.with_scan_channel_capacity(8))?)
}

// `count` one-second-spaced float records of `series`, starting at `start`.
fn create_test_pack(series: &str, start: f64, count: usize) -> MeasurementPack {
    (0..count)
        .map(|i| MeasurementRecord::new(series, start + i as f64, i as f64 * 0.5).with_unit("A"))
        .collect()
}

fn times(pack: &MeasurementPack) -> Vec<f64> {
    pack.records.iter().map(|r| r.time).collect()
}

// Name, time (to the microsecond) and value; the fields a stored record keeps
// from what was ingested.
fn assert_same_records(got: &MeasurementPack, expected: &MeasurementPack) {
    assert_eq!(got.len(), expected.len(), "record count mismatch");
    for (g, e) in got.records.iter().zip(&expected.records) {
        assert_eq!(g.name, e.name);
        assert!((g.time - e.time).abs() < 1e-6, "time {} != {}", g.time, e.time);
        assert_eq!(g.value, e.value);
    }
}

#[test]
fn test_add_and_get_round_trip() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;

    let pack = MeasurementPack::new(vec![
        MeasurementRecord::new("temp", 0.0, 21.5).with_base(BaseFields {
            name: Some("dev1/".into()),
            time: Some(1_700_000_000.0),
            unit: Some("Cel".into()),
            ..Default::default()
        }),
        MeasurementRecord::new("temp", 1.25, 21.75),
        MeasurementRecord::new("door", 2.0, "open"),
        MeasurementRecord::new("hum", 3.5, 40.0).with_unit("%RH"),
        MeasurementRecord::new("door", 4.0, "closed"),
    ]);

    let report = store.add(&pack)?;
    info!("Ingest report: {:?}", report);
    assert_eq!(report.total(), 5);
    assert_eq!(report.series.get("dev1/door"), Some(&2));

    let normalized = pack.normalize();
    for series in ["dev1/temp", "dev1/door", "dev1/hum"] {
        let got = store.get(series)?;
        assert_same_records(&got, &normalized.series(series));
    }

    let hum = store.get("dev1/hum")?;
    assert_eq!(hum.records[0].unit.as_deref(), Some("%RH"));
    let temp = store.get("dev1/temp")?;
    assert_eq!(temp.records[0].unit.as_deref(), Some("Cel"));
    assert_eq!(temp.records[1].time, 1_700_000_001.25);
    Ok(())
}

#[test]
fn test_get_returns_time_order() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;

    let decreasing: MeasurementPack = (0..20)
        .rev()
        .map(|i| MeasurementRecord::new("s", 1000.0 + i as f64 * 0.1, i as f64))
        .collect();
    store.add(&decreasing)?;

    let got = times(&store.get("s")?);
    let mut sorted = got.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(got, sorted);
    assert_eq!(got.len(), 20);
    Ok(())
}

#[test]
fn test_pagination_is_complete_in_both_directions() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;
    // Fractional times exercise the cursor round trip through seconds.
    let pack: MeasurementPack = (0..23)
        .map(|i| MeasurementRecord::new("s", 1543059346.0 + i as f64 * 0.37, i as f64))
        .collect();
    store.add(&pack)?;

    let start = 1543059346.0 + 3.0 * 0.37;
    let end = 1543059346.0 + 19.0 * 0.37;
    let all = store.get("s")?;
    let in_range: Vec<f64> = times(&all)
        .into_iter()
        .filter(|t| (start..=end).contains(t))
        .collect();
    assert_eq!(in_range.len(), 17);

    for sort in [Sort::Asc, Sort::Desc] {
        let mut expected = in_range.clone();
        if sort == Sort::Desc {
            expected.reverse();
        }
        for limit in 1..=18 {
            let query = Query::new("s", start, end).with_sort(sort).with_limit(limit);
            let pages: Vec<Page> = store.paginate(query).collect::<crate::Result<_>>()?;

            let got: Vec<f64> = pages.iter().flat_map(|p| times(&p.pack)).collect();
            assert_eq!(got, expected, "sort {sort}, limit {limit}");
            assert_eq!(pages.len(), (expected.len() + limit - 1) / limit);
            assert!(pages.iter().all(|p| p.pack.len() <= limit));
            assert_eq!(pages.last().and_then(|p| p.cursor), None);
        }
    }
    Ok(())
}

#[test]
fn test_page_boundaries_match_pages() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;
    store.add(&create_test_pack("s", 10.0, 31))?;
    let asc = times(&store.get("s")?);

    for limit in [1, 4, 10, 31, 50] {
        let query = Query::new("s", 10.0, 40.0).with_limit(limit);
        let index = store.get_pages(&query)?;
        assert_eq!(index.count, 31);
        assert_eq!(index.boundaries.len(), (31 + limit - 1) / limit);
        for (i, boundary) in index.boundaries.iter().enumerate() {
            assert_eq!(*boundary, asc[i * limit]);
        }

        // Every boundary is where the paginator starts a page.
        let starts: Vec<f64> = store
            .paginate(query)
            .map(|page| page.map(|p| p.pack.records[0].time))
            .collect::<crate::Result<_>>()?;
        assert_eq!(starts, index.boundaries);
    }

    let empty = store.get_pages(&Query::new("s", 100.0, 200.0).with_limit(5))?;
    assert_eq!(empty, PageIndex::default());
    Ok(())
}

#[test]
fn test_current_series_pages() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;
    store.add(&create_test_pack("current", 1543059346.0, 100))?;

    let query = Query::new("current", 1543059346.0, 1543059445.0)
        .with_sort(Sort::Asc)
        .with_limit(25);
    let index = store.get_pages(&query)?;
    assert_eq!(index.count, 100);
    assert_eq!(
        index.boundaries,
        vec![1543059346.0, 1543059371.0, 1543059396.0, 1543059421.0]
    );

    let first = store.query(&query.clone().with_limit(50))?;
    assert_eq!(first.pack.len(), 50);
    assert_eq!(first.pack.records[0].time, 1543059346.0);
    assert_eq!(first.pack.records[49].time, 1543059395.0);
    assert_eq!(first.cursor, Some(1543059396.0));

    let cursor = first.cursor.unwrap();
    let second = store.query(&query.with_limit(50).next_page(cursor))?;
    assert_eq!(second.pack.len(), 50);
    assert_eq!(second.pack.records[0].time, 1543059396.0);
    assert_eq!(second.pack.records[49].time, 1543059445.0);
    assert_eq!(second.cursor, None);
    Ok(())
}

#[test]
fn test_delete_is_final() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;
    store.add(&create_test_pack("s", 0.0, 10))?;
    store.add(&create_test_pack("other", 0.0, 3))?;

    store.delete("s")?;
    assert!(matches!(
        store.get("s"),
        Err(StoreError::Engine(EngineError::SeriesNotFound(_)))
    ));
    assert!(matches!(
        store.query(&Query::new("s", 0.0, 10.0).with_limit(2)),
        Err(StoreError::Engine(EngineError::SeriesNotFound(_)))
    ));
    assert!(store.delete("s").is_err());
    assert_eq!(store.get("other")?.len(), 3);

    store.add(&create_test_pack("s", 100.0, 2))?;
    assert_eq!(times(&store.get("s")?), vec![100.0, 101.0]);
    Ok(())
}

#[test]
fn test_invalid_packs_write_nothing() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;

    let unnamed = MeasurementPack::new(vec![
        MeasurementRecord::new("ok", 1.0, 1.0),
        MeasurementRecord::new("", 2.0, 2.0),
    ]);
    assert!(matches!(store.add(&unnamed), Err(StoreError::Validation(_))));

    let too_late = MeasurementPack::new(vec![
        MeasurementRecord::new("ok", 1.0, 1.0),
        MeasurementRecord::new("late", 1.0e12, 2.0),
    ]);
    assert!(matches!(store.add(&too_late), Err(StoreError::Overflow(_))));

    assert!(store.engine().series_names()?.is_empty());
    assert_eq!(store.add(&MeasurementPack::default())?.total(), 0);
    Ok(())
}

#[test]
fn test_invalid_queries_are_rejected() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;
    store.add(&create_test_pack("s", 0.0, 3))?;

    for query in [
        Query::new("s", 0.0, 3.0),
        Query::new("s", 3.0, 0.0).with_limit(1),
        Query::new("s", f64::NAN, 3.0).with_limit(1),
    ] {
        assert!(matches!(store.query(&query), Err(StoreError::InvalidQuery(_))));
        assert!(matches!(store.get_pages(&query), Err(StoreError::InvalidQuery(_))));
    }
    Ok(())
}

#[test]
fn test_corrupt_entries_are_skipped() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;
    store.add(&create_test_pack("s", 0.0, 4))?;
    store
        .engine()
        .append("s", vec![TimeEntry::new(seconds_to_key(1.5)?, b"garbage".to_vec())])?;

    let outcome = store.scan("s");
    assert_eq!(outcome.skipped, 1);
    assert!(outcome.status.is_ok());
    assert_eq!(times(&store.get("s")?), vec![0.0, 1.0, 2.0, 3.0]);

    // A page still counts the corrupt entry against its limit.
    let page = store.query(&Query::new("s", 0.0, 3.0).with_limit(3))?;
    assert_eq!(times(&page.pack), vec![0.0, 1.0]);
    assert_eq!(page.cursor, Some(2.0));
    Ok(())
}

// Delegates to a MemoryEngine but refuses to append to one series.
struct FailingEngine {
    inner: MemoryEngine,
    fail_on: &'static str,
}

impl TimeSeriesEngine for FailingEngine {
    fn append(&self, series: &str, entries: Vec<TimeEntry>) -> crate::Result<(), EngineError> {
        if series == self.fail_on {
            return Err(EngineError::Persistence(format!("append to '{series}' refused")));
        }
        self.inner.append(series, entries)
    }

    fn scan_all(&self, series: &str) -> EntryStream {
        self.inner.scan_all(series)
    }

    fn scan_range(&self, query: &KeyQuery) -> EntryStream {
        self.inner.scan_range(query)
    }

    fn page_boundaries(&self, query: &KeyQuery) -> crate::Result<(Vec<i64>, usize), EngineError> {
        self.inner.page_boundaries(query)
    }

    fn delete_series(&self, series: &str) -> crate::Result<(), EngineError> {
        self.inner.delete_series(series)
    }
}

#[test]
fn test_failed_append_keeps_earlier_series() -> Result<()> {
    setup_logging();
    let store = SenmlStore::with_engine(FailingEngine {
        inner: MemoryEngine::default(),
        fail_on: "b",
    });

    let pack: MeasurementPack = ["c", "b", "a"]
        .into_iter()
        .map(|name| MeasurementRecord::new(name, 1.0, 1.0))
        .collect();
    assert!(matches!(
        store.add(&pack),
        Err(StoreError::Engine(EngineError::Persistence(_)))
    ));

    // Series are written in name order: "a" landed, "c" was never attempted.
    assert_eq!(store.get("a")?.len(), 1);
    assert!(store.get("b").is_err());
    assert!(store.get("c").is_err());
    Ok(())
}

#[test]
fn test_concurrent_writers_on_separate_series() -> Result<()> {
    setup_logging();
    let store = create_test_store(None)?;

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let store = &store;
            scope.spawn(move || {
                let series = format!("worker{worker}");
                for batch in 0..5 {
                    let pack = create_test_pack(&series, batch as f64 * 10.0, 10);
                    store.add(&pack).unwrap();
                }
            });
        }
    });

    for worker in 0..4 {
        let got = store.get(&format!("worker{worker}"))?;
        assert_eq!(got.len(), 50);
    }
    Ok(())
}

#[test]
fn test_store_persists_across_connections() -> Result<()> {
    setup_logging();
    let dir = tempdir()?;
    let path = dir.path().join("store.json");

    let store = create_test_store(Some(&path))?;
    store.add(&create_test_pack("current", 1543059346.0, 30))?;
    let before = store.get("current")?;
    store.disconnect()?;
    assert!(path.exists());

    info!("Reconnecting to {:?}", path);
    let store = create_test_store(Some(&path))?;
    let after = store.get("current")?;
    assert_eq!(after, before);

    let page = store.query(&Query::new("current", 1543059350.0, 1543059400.0).with_limit(10))?;
    assert_eq!(page.pack.len(), 10);
    assert_eq!(page.cursor, Some(1543059360.0));
    store.disconnect()?;
    Ok(())
}
