use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use assaystat::{
    catalog::{AssayDefinition, CodeTable},
    engine::aggregator::AggregationEngine,
    record::{ChemistryReagentGroup, ReagentUsage, SupplyRecord},
    registry::{memory::DeviceTable, Device},
    source::memory::MemoryRecordSource,
    types::{AssayCode, CalibrationState, Classification},
};

fn chem(id: u64, code: AssayCode, remaining_tests: u32) -> SupplyRecord {
    SupplyRecord::Chemistry(ChemistryReagentGroup {
        id,
        device_sn: format!("C-{}", id % 4),
        assay_code: code,
        placed: true,
        usage: ReagentUsage::InUse,
        remaining_tests,
        reagent_expired: false,
        onboard_expired: false,
        calibration: CalibrationState::Valid,
    })
}

fn registry() -> DeviceTable {
    DeviceTable::with_devices((0..4).map(|i| Device::new(format!("C-{i}"), Classification::Chemistry)))
}

fn definitions(n: AssayCode) -> Vec<AssayDefinition> {
    (1..=n)
        .map(|code| AssayDefinition::new(code, Classification::Chemistry, format!("assay-{code}")))
        .collect()
}

fn bench_incremental_updates(c: &mut Criterion) {
    c.bench_function("update_20k_records_200_assays", |b| {
        b.iter(|| {
            let mut engine = AggregationEngine::new(registry(), Box::new(MemoryRecordSource::new()), CodeTable::default());
            engine.load_catalogue(&definitions(200)).expect("load");
            for i in 0..20_000u64 {
                let code = (i % 200) as AssayCode + 1;
                let _ = engine.update_assay_status(&chem(i % 2_000, code, (i % 7) as u32));
            }
        });
    });
}

fn bench_catalogue_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalogue_load");

    for per_assay in [1u64, 10, 100] {
        let mut source = MemoryRecordSource::new();
        for code in 1..=200u32 {
            for id in 0..per_assay {
                source.push(Classification::Chemistry, chem(id, code, (id % 3) as u32));
            }
        }
        let defs = definitions(200);

        group.bench_with_input(BenchmarkId::from_parameter(per_assay), &per_assay, |b, _| {
            b.iter(|| {
                let mut engine = AggregationEngine::new(registry(), Box::new(source.clone()), CodeTable::default());
                engine.load_catalogue(&defs).expect("load");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_incremental_updates, bench_catalogue_load);
criterion_main!(benches);
