use crate::error::MapError;
use crate::types::{GeoRecord, RecordId, SearchResult};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Load a pre-fetched record list, dispatching on the file extension.
pub fn load_records(path: &Path) -> Result<Vec<GeoRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Record file has no extension: {:?}", path))?;

    let records = match extension.as_str() {
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => return Err(MapError::UnsupportedFormat(other.to_string()).into()),
    };
    tracing::info!(count = records.len(), "loaded records from {:?}", path);
    Ok(records)
}

// Either a bare array or a paged search response.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    List(Vec<GeoRecord>),
    Page { results: Vec<GeoRecord> },
}

fn load_json(path: &Path) -> Result<Vec<GeoRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open JSON file: {:?}", path))?;
    let parsed: RecordFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse records in {:?}", path))?;
    Ok(match parsed {
        RecordFile::List(records) => records,
        RecordFile::Page { results } => results,
    })
}

/// Flat search-result columns. Everything is optional; blanks read as missing.
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: Option<String>,
    title: Option<String>,
    price: Option<f64>,
    currency: Option<String>,
    price_period: Option<String>,
    property_type: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    city: Option<String>,
    district: Option<String>,
    bedrooms: Option<u32>,
    bathrooms: Option<u32>,
    area: Option<f64>,
    image_url: Option<String>,
}

fn load_csv(path: &Path) -> Result<Vec<GeoRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);

    let mut records = Vec::new();
    for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row.with_context(|| format!("Bad CSV row {} in {:?}", line + 1, path))?;
        records.push(GeoRecord::SearchResult(SearchResult {
            id: row.id.map(RecordId::Text),
            title: row.title,
            price: row.price,
            currency: row.currency,
            price_period: row.price_period,
            property_type: row.property_type,
            latitude: row.latitude,
            longitude: row.longitude,
            address: row.address,
            city: row.city,
            district: row.district,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            area: row.area,
            image_url: row.image_url,
            images: None,
        }));
    }
    Ok(records)
}
