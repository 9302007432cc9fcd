use brainy_vector::{DistanceMetric, HnswConfig, Vector, VectorIndex, VectorIndexConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

fn random_vector(dim: usize) -> Vector {
    let mut rng = rand::rng();
    Vector::new((0..dim).map(|_| rng.random_range(-1.0..1.0)).collect())
}

fn build_index(dim: usize, count: usize, config: HnswConfig) -> VectorIndex {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let index_config = VectorIndexConfig::new(dim, DistanceMetric::Cosine).with_hnsw_config(config);
    let mut index = VectorIndex::with_config(index_config).unwrap();

    rt.block_on(async {
        for i in 0..count {
            index.insert(format!("n{i}"), random_vector(dim)).await.unwrap();
        }
    });

    index
}

/// Benchmark: insert throughput at a few graph sizes
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_insert");

    for count in [100, 1000, 5000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("insert", count), &count, |b, &count| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let config = VectorIndexConfig::new(32, DistanceMetric::Cosine).with_hnsw_config(HnswConfig::fast());
            let mut index = VectorIndex::with_config(config).unwrap();

            rt.block_on(async {
                for i in 0..count {
                    index.insert(format!("seed{i}"), random_vector(32)).await.unwrap();
                }
            });

            let mut next_id = count;
            b.iter(|| {
                rt.block_on(async {
                    let v = random_vector(32);
                    index.insert(format!("n{next_id}"), black_box(v)).await.unwrap();
                    next_id += 1;
                });
            });
        });
    }

    group.finish();
}

/// Benchmark: search latency against graphs of increasing size
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_search");

    for count in [1000, 10000, 50000] {
        let index = build_index(32, count, HnswConfig::balanced());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let query = random_vector(32);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("search_k10", count), &count, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let _ = index.search(black_box(&query), 10).await.unwrap();
                });
            });
        });
    }

    group.finish();
}

/// Benchmark: how ef_search trades off against latency at a fixed graph size
fn bench_ef_search_tradeoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_ef_search");

    for ef_search in [10, 50, 200] {
        let mut config = HnswConfig::balanced();
        config.ef_search = ef_search;
        let index = build_index(32, 10000, config);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let query = random_vector(32);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("search", ef_search), &ef_search, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let _ = index.search(black_box(&query), 10).await.unwrap();
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_search, bench_ef_search_tradeoff);
criterion_main!(benches);
