use imdedup::DedupError;
use imdedup::distance::Metric;
use imdedup::index::{IndexKind, VectorIndex, create_index};
use rand::Rng;
use rstest::*;

const DIM: usize = 4;

fn new_index(kind: IndexKind, metric: Metric) -> Box<dyn VectorIndex> {
    create_index(kind, DIM, metric, 16, 64)
}

#[fixture]
fn vectors() -> Vec<[f32; DIM]> {
    vec![
        [1.0, 0.0, 0.0, 0.0],
        [0.99, 0.1, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
    ]
}

#[rstest]
#[case::flat(IndexKind::Flat)]
#[case::hnsw(IndexKind::Hnsw)]
fn empty_index_returns_nothing(#[case] kind: IndexKind) {
    let index = new_index(kind, Metric::Cosine);
    assert!(index.is_empty());
    assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 1.0).unwrap().is_empty());
}

#[rstest]
#[case::flat(IndexKind::Flat)]
#[case::hnsw(IndexKind::Hnsw)]
fn dimension_mismatch(#[case] kind: IndexKind, vectors: Vec<[f32; DIM]>) {
    let mut index = new_index(kind, Metric::Cosine);
    index.insert(1, &vectors[0]).unwrap();

    let err = index.insert(2, &[1.0, 0.0]).unwrap_err();
    assert!(matches!(err, DedupError::DimensionMismatch { expected: DIM, actual: 2 }));
    let err = index.search(&[1.0, 0.0, 0.0], 0.1).unwrap_err();
    assert!(matches!(err, DedupError::DimensionMismatch { expected: DIM, actual: 3 }));

    // 失败的插入不影响已有数据
    assert_eq!(index.len(), 1);
    assert_eq!(index.search(&vectors[0], 0.1).unwrap().len(), 1);
}

#[rstest]
#[case::flat(IndexKind::Flat)]
#[case::hnsw(IndexKind::Hnsw)]
fn ordered_by_distance_then_key(#[case] kind: IndexKind, vectors: Vec<[f32; DIM]>) {
    let mut index = new_index(kind, Metric::Cosine);
    for (i, v) in vectors.iter().enumerate() {
        index.insert(i as u64 + 1, v).unwrap();
    }

    let result = index.search(&vectors[0], 0.1).unwrap();
    let keys = result.iter().map(|n| n.key).collect::<Vec<_>>();
    // key 1 和 5 完全相同，距离相同时按插入顺序
    assert_eq!(keys, vec![1, 5, 2]);
    assert!(result[0].distance <= result[2].distance);

    let result = index.search_excluding(1, &vectors[0], 0.1).unwrap();
    assert_eq!(result.iter().map(|n| n.key).collect::<Vec<_>>(), vec![5, 2]);
}

#[rstest]
#[case::cosine(Metric::Cosine, 0.0)]
#[case::euclidean(Metric::Euclidean, 0.0)]
fn zero_threshold_matches_identical_only(#[case] metric: Metric, #[case] threshold: f32) {
    let mut index = new_index(IndexKind::Flat, metric);
    index.insert(1, &[0.3, 0.4, 0.5, 0.6]).unwrap();
    index.insert(2, &[0.3, 0.4, 0.5, 0.61]).unwrap();
    index.insert(3, &[0.3, 0.4, 0.5, 0.6]).unwrap();

    let keys = index
        .search(&[0.3, 0.4, 0.5, 0.6], threshold)
        .unwrap()
        .into_iter()
        .map(|n| n.key)
        .collect::<Vec<_>>();
    assert_eq!(keys, vec![1, 3]);
}

#[test]
fn euclidean_threshold() {
    let mut index = new_index(IndexKind::Flat, Metric::Euclidean);
    index.insert(1, &[0.0, 0.0, 0.0, 0.0]).unwrap();
    index.insert(2, &[3.0, 4.0, 0.0, 0.0]).unwrap();

    assert_eq!(index.search(&[0.0; DIM], 4.9).unwrap().len(), 1);
    let result = index.search(&[0.0; DIM], 5.0).unwrap();
    assert_eq!(result.len(), 2);
    assert!((result[1].distance - 5.0).abs() < 1e-6);
}

#[test]
fn hnsw_agrees_with_flat_on_small_corpus() {
    let mut rng = rand::rng();
    let mut flat = create_index(IndexKind::Flat, 32, Metric::Cosine, 64, 128);
    let mut hnsw = create_index(IndexKind::Hnsw, 32, Metric::Cosine, 64, 128);

    let base = (0..20)
        .map(|_| (0..32).map(|_| rng.random::<f32>() - 0.5).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let mut key = 0;
    let mut queries = vec![];
    for v in base {
        // 每个基准向量附带两个轻微扰动的副本
        for _ in 0..3 {
            let noisy = v.iter().map(|x| x + (rng.random::<f32>() - 0.5) * 0.01).collect::<Vec<_>>();
            key += 1;
            flat.insert(key, &noisy).unwrap();
            hnsw.insert(key, &noisy).unwrap();
        }
        queries.push(v);
    }

    for q in &queries {
        let expected = flat.search(q, 0.05).unwrap();
        let actual = hnsw.search(q, 0.05).unwrap();
        assert_eq!(
            expected.iter().map(|n| n.key).collect::<Vec<_>>(),
            actual.iter().map(|n| n.key).collect::<Vec<_>>()
        );
    }
}
