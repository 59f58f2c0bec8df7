use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use laqn::{batches, build_locator, parse_csv_table, FieldValue, PointTransformer, Station};
use std::collections::BTreeMap;

fn quantity_codes() -> BTreeMap<String, String> {
    ["CO", "NO2", "NOX", "O3", "PM10", "PM25", "SO2", "FINE", "COARSE"]
        .iter()
        .map(|q| (q.to_string(), q.to_string()))
        .collect()
}

fn export_table(rows: usize) -> Vec<u8> {
    let mut body = String::from("Site,Species,ReadingDateTime,Value,Units,Provisional or Ratified\n");
    for i in 0..rows {
        body.push_str(&format!(
            "BL0,NO2,{:02}/01/2021 {:02}:00,{}.5,ug m-3,Ratified\n",
            1 + (i / 24) % 28,
            i % 24,
            i % 90
        ));
    }
    body.into_bytes()
}

fn bench_requests(c: &mut Criterion) {
    let codes = quantity_codes();
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2021, 1, 8).unwrap();

    c.bench_function("batches", |b| b.iter(|| batches(black_box(&[]), &codes, 5)));
    c.bench_function("build_locator", |b| {
        let all = batches(&[], &codes, 5).unwrap();
        b.iter(|| {
            for batch in &all {
                build_locator(
                    "https://www.londonair.org.uk/london/asp/downloadsite.asp?",
                    black_box("BL0"),
                    batch,
                    start,
                    end,
                    "hour",
                    &codes,
                )
                .unwrap();
            }
        })
    });
}

fn bench_transform(c: &mut Criterion) {
    let table = parse_csv_table(export_table(24 * 7 * 5)).unwrap();
    let station = Station {
        id: "BL0".to_string(),
        name: "Camden - Bloomsbury".to_string(),
        tags: BTreeMap::from([("Site Code".to_string(), "BL0".to_string())]),
        fields: BTreeMap::from([("Latitude".to_string(), FieldValue::Float(51.522))]),
    };
    let transformer = PointTransformer::new("LAQN");

    c.bench_function("parse_csv_table", |b| {
        b.iter(|| parse_csv_table(black_box(export_table(24 * 7))))
    });
    c.bench_function("to_points", |b| {
        b.iter(|| transformer.to_points(black_box(&table), &station))
    });
}

criterion_group!(benches, bench_requests, bench_transform);
criterion_main!(benches);
