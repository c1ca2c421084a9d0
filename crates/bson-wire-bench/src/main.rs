//! Benchmark for BSON encoding, wire framing and decoding using city data.
//!
//! Reads a JSON array of cities when a path is given, otherwise generates a
//! synthetic set. Set `RUST_LOG=bson_wire=debug` to see framing events.

use std::fs;
use std::time::Instant;

use bson_wire::protocol::{compress_message, decompress_message, Compressor, InsertBody, RequestMessage};
use bson_wire::{
    encode_document, BsonObject, BsonReader, Built, DecodeOptions, Document, EncodeOptions,
    HandlerRegistry, ObjectId, Shape, Value,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

// =============================================================================
// JSON DATA STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
struct City {
    id: u32,
    name: String,
    state_code: String,
    country_code: String,
    latitude: String,
    longitude: String,
    population: Option<i64>,
    timezone: Option<String>,
    #[serde(rename = "wikiDataId")]
    wikidata_id: Option<String>,
}

fn synthetic_cities(count: u32) -> Vec<City> {
    (0..count)
        .map(|i| City {
            id: i,
            name: format!("City {}", i),
            state_code: format!("S{}", i % 50),
            country_code: ["US", "FR", "JP", "BR", "IN"][(i % 5) as usize].to_string(),
            latitude: format!("{:.4}", (i % 180) as f64 - 90.0),
            longitude: format!("{:.4}", (i % 360) as f64 - 180.0),
            population: (i % 3 != 0).then_some(i as i64 * 137),
            timezone: Some("UTC".to_string()),
            wikidata_id: (i % 2 == 0).then(|| format!("Q{}", 1000 + i)),
        })
        .collect()
}

// =============================================================================
// CONVERSION TO DOCUMENTS
// =============================================================================

fn city_document(city: &City) -> Document {
    let mut oid = [0u8; 12];
    oid[8..12].copy_from_slice(&city.id.to_be_bytes());

    let mut doc = Document::new()
        .append("_id", ObjectId::from_bytes(oid))
        .append("name", city.name.as_str())
        .append("state", city.state_code.as_str())
        .append("country", city.country_code.as_str());

    if let (Ok(lat), Ok(lon)) = (city.latitude.parse::<f64>(), city.longitude.parse::<f64>()) {
        doc.set(
            "location",
            Document::new()
                .append("type", "Point")
                .append("coordinates", Value::array([lon, lat])),
        );
    }
    if let Some(pop) = city.population {
        doc.set("population", pop);
    }
    if let Some(ref tz) = city.timezone {
        doc.set("timezone", tz.as_str());
    }
    if let Some(ref wiki_id) = city.wikidata_id {
        doc.set("wikiDataId", wiki_id.as_str());
    }
    doc
}

// =============================================================================
// TYPED TARGET
// =============================================================================

#[derive(Debug, Default)]
struct CityRecord {
    name: String,
    country: String,
    population: i64,
    coordinates: Vec<f64>,
    extra: Document,
}

#[derive(Debug, Default)]
struct Location {
    coordinates: Vec<f64>,
}

impl BsonObject for Location {
    fn property_shape(&self, name: &str) -> Shape {
        match name {
            "coordinates" => Shape::array_of(Shape::Scalar),
            _ => Shape::Scalar,
        }
    }

    fn set_property(&mut self, name: &str, value: Built) -> Result<(), Built> {
        match (name, value) {
            ("coordinates", Built::Array(items)) => {
                self.coordinates = items
                    .into_iter()
                    .filter_map(|item| item.into_value().ok().and_then(|v| v.as_f64()))
                    .collect();
            }
            ("type", Built::Value(_)) => {}
            (_, other) => return Err(other),
        }
        Ok(())
    }
}

impl BsonObject for CityRecord {
    fn property_shape(&self, name: &str) -> Shape {
        match name {
            "location" => Shape::object::<Location>(),
            _ => Shape::Dynamic,
        }
    }

    fn set_property(&mut self, name: &str, value: Built) -> Result<(), Built> {
        match (name, value) {
            ("name", Built::Value(Value::String(s))) => self.name = s,
            ("country", Built::Value(Value::String(s))) => self.country = s,
            ("population", Built::Value(v)) => match v.as_i64() {
                Some(n) => self.population = n,
                None => return Err(Built::Value(v)),
            },
            ("location", built) => self.coordinates = built.downcast::<Location>()?.coordinates,
            (_, other) => return Err(other),
        }
        Ok(())
    }

    fn extra_elements(&mut self) -> Option<&mut Document> {
        Some(&mut self.extra)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cities = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading cities from: {}", path);
            let json_data = fs::read_to_string(&path).expect("Failed to read cities file");
            let parse_start = Instant::now();
            let cities: Vec<City> = serde_json::from_str(&json_data).expect("Failed to parse JSON");
            println!("Parsed {} cities in {:?}", cities.len(), parse_start.elapsed());
            cities
        }
        None => {
            println!("No data file given, generating synthetic cities");
            synthetic_cities(150_000)
        }
    };

    let convert_start = Instant::now();
    let documents: Vec<Document> = cities.iter().map(city_document).collect();
    println!("Converted {} documents in {:?}", documents.len(), convert_start.elapsed());

    // Benchmark document encoding
    let encode_start = Instant::now();
    let encoded: Vec<Vec<u8>> = documents
        .iter()
        .map(|doc| encode_document(doc).expect("Failed to encode"))
        .collect();
    let encode_time = encode_start.elapsed();
    let total_bytes: usize = encoded.iter().map(Vec::len).sum();

    println!("\nEncode: {} bytes in {:?}", total_bytes, encode_time);
    println!(
        "  Throughput: {:.2} MB/s",
        (total_bytes as f64 / 1_000_000.0) / encode_time.as_secs_f64()
    );

    // Benchmark insert splitting and framing
    let options = EncodeOptions::default();
    let frame_start = Instant::now();
    let batches =
        InsertBody::split("geo.cities", documents.clone(), options).expect("Failed to split batch");
    let frames: Vec<Vec<u8>> = batches
        .into_iter()
        .map(|body| RequestMessage::new(body).encode(options).expect("Failed to frame insert"))
        .collect();
    let frame_time = frame_start.elapsed();
    let framed_bytes: usize = frames.iter().map(Vec::len).sum();

    println!(
        "\nInsert framing: {} messages, {} bytes in {:?}",
        frames.len(),
        framed_bytes,
        frame_time
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (framed_bytes as f64 / 1_000_000.0) / frame_time.as_secs_f64()
    );

    // Benchmark compression
    let compress_start = Instant::now();
    let compressed: Vec<Vec<u8>> = frames
        .iter()
        .map(|frame| compress_message(frame, Compressor::Zstd, 3, options).expect("Failed to compress"))
        .collect();
    let compress_time = compress_start.elapsed();
    let compressed_bytes: usize = compressed.iter().map(Vec::len).sum();

    println!("\nCompressed (zstd level 3): {} bytes in {:?}", compressed_bytes, compress_time);
    println!(
        "  Compression ratio: {:.1}x",
        framed_bytes as f64 / compressed_bytes as f64
    );

    let decompress_start = Instant::now();
    for (frame, wrapped) in frames.iter().zip(&compressed) {
        let restored =
            decompress_message(wrapped, DecodeOptions::default()).expect("Failed to decompress");
        assert_eq!(&restored, frame);
    }
    println!("Decompress: {:?}", decompress_start.elapsed());

    // Benchmark decoding
    const DECODE_ITERS: u32 = 5;
    let reader = BsonReader::new(DecodeOptions::default());

    for bytes in encoded.iter().take(1000) {
        let _ = reader.decode_document(bytes).expect("Failed to decode");
    }

    let decode_start = Instant::now();
    for _ in 0..DECODE_ITERS {
        for (bytes, doc) in encoded.iter().zip(&documents) {
            let decoded = reader.decode_document(bytes).expect("Failed to decode");
            debug_assert_eq!(&decoded, doc);
        }
    }
    let decode_time = decode_start.elapsed() / DECODE_ITERS;

    println!(
        "\nDecode (dynamic): {:?} (avg of {} iterations)",
        decode_time, DECODE_ITERS
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (total_bytes as f64 / 1_000_000.0) / decode_time.as_secs_f64()
    );

    let mut registry = HandlerRegistry::new();
    registry.register::<CityRecord>().register::<Location>();

    let typed_start = Instant::now();
    let mut population = 0i64;
    let mut extra = 0usize;
    for _ in 0..DECODE_ITERS {
        population = 0;
        extra = 0;
        for bytes in &encoded {
            let city: CityRecord = reader
                .decode_object(bytes, &registry)
                .expect("Failed to decode city");
            debug_assert!(!city.name.is_empty() && !city.country.is_empty());
            debug_assert!(city.coordinates.is_empty() || city.coordinates.len() == 2);
            population += city.population;
            extra += city.extra.len();
        }
    }
    let typed_time = typed_start.elapsed() / DECODE_ITERS;

    println!(
        "\nDecode (typed): {:?} (avg of {} iterations)",
        typed_time, DECODE_ITERS
    );
    println!(
        "  Throughput: {:.2} MB/s",
        (total_bytes as f64 / 1_000_000.0) / typed_time.as_secs_f64()
    );
    println!("  Total population: {}, extra elements: {}", population, extra);
}
