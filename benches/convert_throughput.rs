use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use encoding_rs::UTF_8;
use roster_sql::convert::convert_bytes;
use roster_sql::keys::KeyMode;
use roster_sql::profile::Profile;

fn generate_export(rows: usize) -> Vec<u8> {
    let mut csv = String::from("Payroll Number,Surname,First Name,Other Names,ID Number,Birth Date\n");
    for i in 0..rows {
        // Every 50th row repeats a key and every 97th drops one.
        let key = match i {
            i if i % 97 == 0 => String::new(),
            i if i % 50 == 0 => format!("P{}", i / 2),
            i => format!("P{i}"),
        };
        let day = (i % 28) + 1;
        let month = (i % 12) + 1;
        csv.push_str(&format!(
            "{key},O'Surname{i},First{i},,{id},{day:02}/{month:02}/19{year:02}\n",
            id = 20_000_000 + i,
            year = 50 + i % 50
        ));
    }
    csv.into_bytes()
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    for rows in [1_000usize, 10_000] {
        let export = generate_export(rows);
        group.throughput(Throughput::Bytes(export.len() as u64));
        for mode in [KeyMode::Skip, KeyMode::Disambiguate] {
            let mut profile = Profile::builtin("users").expect("users profile");
            profile.key.mode = mode;
            group.bench_with_input(BenchmarkId::new(mode.as_str(), rows), &export, |b, export| {
                b.iter(|| convert_bytes(export, &profile, b',', UTF_8).expect("convert"));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
