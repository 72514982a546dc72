use std::{collections::HashMap, path::Path, time::Instant};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use senml_store::{
    BaseFields, MeasurementPack, MeasurementRecord, Query, SenmlStore, Sort, StoreConfig,
};
use tempfile::tempdir;
use tracing::{info, info_span, trace, warn};
use tracing_subscriber::{fmt, EnvFilter};

const SERIES: &str = "current";
const FIRST_TIME: f64 = 1543059346.0;

// Function to initialize tracing
fn setup_logging() -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("senml_store_example=info".parse()?)
        .add_directive("senml_store=info".parse()?);

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

fn format_time(seconds: f64) -> String {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    match DateTime::<Utc>::from_timestamp(whole as i64, nanos) {
        Some(dt) => dt.to_rfc3339(),
        None => format!("{seconds}s"),
    }
}

// One record per CSV row. Expected headers: name, time, value, unit (optional).
fn record_from_csv(
    header_map: &HashMap<String, usize>,
    csv_record: &csv::StringRecord,
) -> Result<MeasurementRecord> {
    let field = |header: &str| {
        header_map
            .get(header)
            .and_then(|&index| csv_record.get(index))
            .filter(|s| !s.is_empty())
    };

    let name = field("name").ok_or_else(|| anyhow!("missing name"))?;
    let time: f64 = field("time").ok_or_else(|| anyhow!("missing time"))?.parse()?;
    let value = field("value").ok_or_else(|| anyhow!("missing value"))?;
    trace!(name, time, value, "Parsing CSV row");

    let record = match value.parse::<f64>() {
        Ok(v) => MeasurementRecord::new(name, time, v),
        Err(_) => match value.parse::<bool>() {
            Ok(b) => MeasurementRecord::new(name, time, b),
            Err(_) => MeasurementRecord::new(name, time, value),
        },
    };
    Ok(match field("unit") {
        Some(unit) => record.with_unit(unit),
        None => record,
    })
}

fn load_csv(path: &Path) -> Result<MeasurementPack> {
    let _span = info_span!("csv_parsing").entered();
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let header_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect();

    let mut records = vec![];
    for (row_idx, result) in reader.records().enumerate() {
        let string_record = result?;
        match record_from_csv(&header_map, &string_record) {
            Ok(record) => records.push(record),
            Err(e) => warn!(row = row_idx + 1, error = %e, "Failed to parse CSV row"),
        }
    }
    info!("Parsed {} records from {:?}", records.len(), path);
    if records.is_empty() {
        return Err(anyhow!("Failed to parse any records from CSV"));
    }
    Ok(MeasurementPack::new(records))
}

// 100 one-second readings of a single current sensor, sharing base fields.
fn generated_pack() -> MeasurementPack {
    let mut records: Vec<MeasurementRecord> = (0..100)
        .map(|i| MeasurementRecord::new("", i as f64, 1.0 + (i % 7) as f64 * 0.25))
        .collect();
    records[0].base = BaseFields {
        name: Some(SERIES.to_string()),
        time: Some(FIRST_TIME),
        unit: Some("A".to_string()),
        ..Default::default()
    };
    MeasurementPack::new(records)
}

fn run(store: &SenmlStore, pack: &MeasurementPack) -> Result<()> {
    let start = Instant::now();
    let report = store.add(pack)?;
    info!(
        "Stored {} records in {} series in {:?}",
        report.total(),
        report.series.len(),
        start.elapsed()
    );

    for (series, count) in &report.series {
        let stored = store.get(series)?;
        let (Some(first), Some(last)) = (stored.records.first(), stored.records.last()) else {
            continue;
        };
        println!(
            "{series}: {count} written, {} stored, {} .. {}",
            stored.len(),
            format_time(first.time),
            format_time(last.time)
        );

        let query = Query::new(series.as_str(), first.time, last.time)
            .with_sort(Sort::Desc)
            .with_limit(25);
        let index = store.get_pages(&query)?;
        println!("  {} pages of 25 over {} records", index.boundaries.len(), index.count);

        let _span = info_span!("paginate", series = %series).entered();
        for (n, page) in store.paginate(query).enumerate() {
            let page = page?;
            let newest = page.pack.records.first().map(|r| r.time);
            println!(
                "  page {n}: {} records from {} (next: {})",
                page.pack.len(),
                newest.map(format_time).unwrap_or_default(),
                page.cursor.map(format_time).unwrap_or_else(|| "-".to_string())
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_logging()?;

    let pack = match std::env::args().nth(1) {
        Some(path) => load_csv(Path::new(&path))?,
        None => {
            info!("No CSV given, generating the '{}' series", SERIES);
            generated_pack()
        }
    };

    let temp_dir = tempdir()?;
    let snapshot = temp_dir.path().join("senml_store.json");
    info!("Using snapshot file: {:?}", snapshot);

    let store = SenmlStore::connect(StoreConfig::persistent(&snapshot))?;
    run(&store, &pack)?;
    store.disconnect()?;

    // Reopen to show the snapshot carries the data.
    let store = SenmlStore::connect(StoreConfig::persistent(&snapshot))?;
    let names = store.engine().series_names()?;
    info!("Reopened store holds {} series", names.len());
    store.disconnect()?;

    info!("Main function finished.");
    Ok(())
}
