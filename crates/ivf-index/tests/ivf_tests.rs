use ivf_core::flat::{FlatCodec, FlatQuantizer};
use ivf_core::MetricType;
use ivf_index::direct_map::DirectMapType;
use ivf_index::ivf::{IvfIndex, ParallelMode, SubsetType};
use ivf_index::quantizer::{Level1Quantizer, TrainStrategy};

fn build_index(d: usize, nlist: usize, metric: MetricType, dm: DirectMapType) -> IvfIndex {
    let quantizer = FlatQuantizer::new(d, metric);
    let l1 = Level1Quantizer::new(Box::new(quantizer), nlist, TrainStrategy::ClusterAndReset);
    let codec = FlatCodec::new(d, metric);
    IvfIndex::new(d, metric, l1, Box::new(codec), dm)
}

/// Builds an index whose coarse quantizer already holds `centroids` in
/// the given order (`nlist = centroids.len() / d`). `train()` then
/// sees `ntotal == nlist` and is a no-op, so the centroid-to-list-id
/// mapping in scenario tests is exactly the caller's order, not an
/// artifact of k-means' random initialization.
fn build_index_with_fixed_centroids(
    d: usize,
    metric: MetricType,
    centroids: &[f32],
    dm: DirectMapType,
) -> IvfIndex {
    let nlist = centroids.len() / d;
    let mut quantizer = FlatQuantizer::new(d, metric);
    ivf_core::CoarseQuantizer::add(&mut quantizer, nlist, centroids).unwrap();
    let l1 = Level1Quantizer::new(Box::new(quantizer), nlist, TrainStrategy::ClusterAndReset);
    let codec = FlatCodec::new(d, metric);
    let mut index = IvfIndex::new(d, metric, l1, Box::new(codec), dm);
    index.train(nlist, centroids).unwrap();
    index
}

/// Scenario 1: 4 centroids at the corners of a 10x10 square, one vector
/// per centroid; a query near (0,0) with k=1, nprobe=1 must land on
/// that centroid's vector with the expected squared distance.
#[test]
fn centroid_grid_nearest_neighbor() {
    let centroids = [0.0, 0.0, 10.0, 0.0, 0.0, 10.0, 10.0, 10.0];
    let mut index =
        build_index_with_fixed_centroids(2, MetricType::L2, &centroids, DirectMapType::Array);
    index.add(4, &centroids, None).unwrap();
    index.nprobe = 1;

    let mut distances = [0.0f32; 1];
    let mut labels = [0i64; 1];
    index
        .search(1, &[0.1, 0.1], 1, &mut distances, &mut labels, None)
        .unwrap();

    assert_eq!(labels[0], 0);
    assert!((distances[0] - 0.02).abs() < 1e-4);
}

/// Scenario 2: query equidistant from all four centroids with nprobe
/// covering all of them returns all four labels at the same distance.
#[test]
fn equidistant_query_returns_all_centroids() {
    let centroids = [0.0, 0.0, 10.0, 0.0, 0.0, 10.0, 10.0, 10.0];
    let mut index =
        build_index_with_fixed_centroids(2, MetricType::L2, &centroids, DirectMapType::Array);
    index.add(4, &centroids, None).unwrap();
    index.nprobe = 4;

    let mut distances = [0.0f32; 4];
    let mut labels = [0i64; 4];
    index
        .search(1, &[5.0, 5.0], 4, &mut distances, &mut labels, None)
        .unwrap();

    let mut sorted_labels = labels.to_vec();
    sorted_labels.sort();
    assert_eq!(sorted_labels, vec![0, 1, 2, 3]);
    for d in distances {
        assert!((d - 50.0).abs() < 1e-3);
    }
}

/// List-id codec byte layout for a representative nlist/listno pair.
#[test]
fn coarse_code_size_and_encode_listno_examples() {
    use ivf_index::quantizer::{coarse_code_size, encode_listno};
    assert_eq!(coarse_code_size(300), 2);
    let mut buf = vec![0u8; 2];
    encode_listno(259, 300, &mut buf);
    assert_eq!(buf, vec![0x03, 0x01]);
}

/// Scenario 4: remove_ids drops exactly the targeted ids and ntotal
/// reflects the removal; subsequent search never returns them.
#[test]
fn remove_ids_drops_targets_and_updates_ntotal() {
    let d = 3;
    let n = 100;
    let mut rng_state = 7u64;
    let mut next = move || {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 33) as f32) / (u32::MAX as f32)
    };
    let x: Vec<f32> = (0..n * d).map(|_| next()).collect();

    let mut index = build_index(d, 8, MetricType::L2, DirectMapType::Array);
    index.train(n, &x).unwrap();
    index.add(n, &x, None).unwrap();
    assert_eq!(index.ntotal(), n);

    let removed = index.remove_ids(&|id| id == 17 || id == 42).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(index.ntotal(), 98);

    index.nprobe = 8;
    let mut distances = vec![0.0f32; n * 10];
    let mut labels = vec![0i64; n * 10];
    index
        .search(n, &x, 10, &mut distances, &mut labels, None)
        .unwrap();
    assert!(!labels.contains(&17));
    assert!(!labels.contains(&42));
}

/// Scenario 5: parallel_mode 1 matches parallel_mode 0 on the same
/// index and query set.
#[test]
fn parallel_mode_1_matches_parallel_mode_0() {
    let d = 4;
    let n = 200;
    let mut rng_state = 99u64;
    let mut next = move || {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 33) as f32) / (u32::MAX as f32)
    };
    let x: Vec<f32> = (0..n * d).map(|_| next()).collect();

    let mut index = build_index(d, 16, MetricType::L2, DirectMapType::Array);
    index.train(n, &x).unwrap();
    index.add(n, &x, None).unwrap();
    index.nprobe = 8;

    let k = 10;
    let queries = &x[0..5 * d];

    index.parallel_mode = ParallelMode::PerQuery;
    let mut d0 = vec![0.0f32; 5 * k];
    let mut l0 = vec![0i64; 5 * k];
    index.search(5, queries, k, &mut d0, &mut l0, None).unwrap();

    index.parallel_mode = ParallelMode::PerProbe;
    let mut d1 = vec![0.0f32; 5 * k];
    let mut l1 = vec![0i64; 5 * k];
    index.search(5, queries, k, &mut d1, &mut l1, None).unwrap();

    assert_eq!(l0, l1);
    for (a, b) in d0.iter().zip(d1.iter()) {
        assert!((a - b).abs() < 1e-4);
    }
}

/// Scenario 6: range search returns exactly the entries within radius,
/// excluding one just beyond it.
#[test]
fn range_search_radius_boundary() {
    let mut index = build_index(1, 2, MetricType::L2, DirectMapType::Array);
    let centroids = [0.0, 10.0];
    index.train(2, &centroids).unwrap();
    let x = [0.0f32, 1.0, 2.0, 10.0];
    index.add(4, &x, None).unwrap();
    index.nprobe = 2;

    // radius 4.0 keeps squared distances <= 4.0 from query 0.0: ids 0
    // (d=0), 1 (d=1), 2 (d=4); excludes id 3 (d=100).
    let results = index.range_search(1, &[0.0], 4.0, None).unwrap();
    let mut ids: Vec<i64> = results[0].iter().map(|(id, _)| *id).collect();
    ids.sort();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn probe_monotonicity_recall_never_decreases() {
    let d = 4;
    let n = 300;
    let mut rng_state = 123u64;
    let mut next = move || {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 33) as f32) / (u32::MAX as f32)
    };
    let x: Vec<f32> = (0..n * d).map(|_| next()).collect();

    let mut index = build_index(d, 20, MetricType::L2, DirectMapType::Array);
    index.train(n, &x).unwrap();
    index.add(n, &x, None).unwrap();

    let query = &x[0..d];
    let k = 5;

    let mut prev_recall_ids: Option<Vec<i64>> = None;
    for nprobe in [1usize, 4, 20] {
        index.nprobe = nprobe;
        let mut distances = vec![0.0f32; k];
        let mut labels = vec![0i64; k];
        index
            .search(1, query, k, &mut distances, &mut labels, None)
            .unwrap();
        let found: Vec<i64> = labels.into_iter().filter(|&l| l >= 0).collect();
        if let Some(prev) = &prev_recall_ids {
            assert!(found.len() >= prev.len());
        }
        prev_recall_ids = Some(found);
    }
}

#[test]
fn merge_from_combines_ntotal_and_ids() {
    let d = 2;
    let a_data = [0.0, 0.0, 1.0, 1.0];
    let b_data = [10.0, 10.0, 11.0, 11.0];

    let mut a = build_index(d, 2, MetricType::L2, DirectMapType::None);
    a.train(2, &a_data).unwrap();
    a.add(2, &a_data, None).unwrap();

    let mut b = build_index(d, 2, MetricType::L2, DirectMapType::None);
    b.train(2, &b_data).unwrap();
    b.add(2, &b_data, None).unwrap();

    a.merge_from(&mut b, 1000).unwrap();
    assert_eq!(a.ntotal(), 4);
    assert_eq!(b.ntotal(), 0);
}

#[test]
fn sa_encode_output_length_matches_n_times_code_size() {
    let d = 3;
    let mut index = build_index(d, 4, MetricType::L2, DirectMapType::Array);
    let centroids = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0];
    index.train(4, &centroids).unwrap();

    let n = 5;
    let x = vec![0.5f32; n * d];
    let mut out = vec![0u8; n * index.sa_code_size()];
    index.sa_encode(n, &x, &mut out).unwrap();
    assert_eq!(out.len(), n * index.sa_code_size());
}

#[test]
fn n_zero_add_and_search_are_no_ops() {
    let mut index = build_index(2, 2, MetricType::L2, DirectMapType::Array);
    index.train(2, &[0.0, 0.0, 1.0, 1.0]).unwrap();
    index.add(0, &[], None).unwrap();
    assert_eq!(index.ntotal(), 0);

    let mut distances: Vec<f32> = Vec::new();
    let mut labels: Vec<i64> = Vec::new();
    index.search(0, &[], 1, &mut distances, &mut labels, None).unwrap();
}

#[test]
fn unfilled_heap_slots_carry_sentinels_when_k_exceeds_candidates() {
    let d = 2;
    let mut index = build_index(d, 1, MetricType::L2, DirectMapType::Array);
    let centroids = [0.0, 0.0];
    index.train(1, &centroids).unwrap();
    index.add(1, &[0.0, 0.0], None).unwrap();
    index.nprobe = 1;

    let k = 3;
    let mut distances = vec![0.0f32; k];
    let mut labels = vec![0i64; k];
    index
        .search(1, &[0.0, 0.0], k, &mut distances, &mut labels, None)
        .unwrap();
    assert_eq!(labels[0], 0);
    for slot in 1..k {
        assert_eq!(labels[slot], -1);
        assert_eq!(distances[slot], f32::INFINITY);
    }
}

#[test]
fn copy_subset_to_id_range_copies_only_matching_ids() {
    let d = 2;
    let mut src = build_index(d, 2, MetricType::L2, DirectMapType::Array);
    let centroids = [0.0, 0.0, 10.0, 10.0];
    src.train(2, &centroids).unwrap();
    let x: Vec<f32> = (0..10).flat_map(|i| vec![i as f32, i as f32]).collect();
    src.add(10, &x, None).unwrap();

    let mut dst = build_index(d, 2, MetricType::L2, DirectMapType::Array);
    dst.train(2, &centroids).unwrap();

    src.copy_subset_to(&mut dst, SubsetType::IdRange, 3, 6).unwrap();
    assert_eq!(dst.ntotal(), 3);
}

use std::sync::{Arc, Mutex};
use std::thread;

/// Stress test: many threads add disjoint id ranges at once, verifying
/// the writer never panics and every id ends up searchable afterwards.
#[test]
fn concurrent_add_from_many_threads_is_consistent() {
    let d = 3;
    let per_thread = 200;
    let num_threads = 8;

    let mut index = build_index(d, 16, MetricType::L2, DirectMapType::Array);
    let train_x = vec![0.5f32; 64 * d];
    index.train(64, &train_x).unwrap();

    let index = Arc::new(Mutex::new(index));
    let mut handles = vec![];
    for t in 0..num_threads {
        let index = index.clone();
        handles.push(thread::spawn(move || {
            let mut rng_state = (t as u64 + 1) * 7919;
            let mut next = move || {
                rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((rng_state >> 33) as f32) / (u32::MAX as f32)
            };
            let x: Vec<f32> = (0..per_thread * d).map(|_| next()).collect();
            let ids: Vec<i64> = (0..per_thread).map(|i| (t * per_thread + i) as i64).collect();
            index.lock().unwrap().add(per_thread, &x, Some(&ids)).unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let index = index.lock().unwrap();
    assert_eq!(index.ntotal(), per_thread * num_threads);
}

/// Array-mode update_vectors must relocate the id's entry rather than
/// leaving the old list's code behind: the total entry count across all
/// lists must stay equal to ntotal, the id's old list must shrink, its
/// new list must grow, and reconstruct/search must only ever see the
/// new vector.
#[test]
fn update_vectors_array_mode_moves_entry_without_duplicating() {
    let d = 2;
    let centroids = [0.0, 0.0, 10.0, 0.0, 0.0, 10.0, 10.0, 10.0];
    let mut index =
        build_index_with_fixed_centroids(d, MetricType::L2, &centroids, DirectMapType::Array);
    index.add(4, &centroids, None).unwrap();
    assert_eq!(index.ntotal(), 4);
    for list_no in 0..4 {
        assert_eq!(index.list_size(list_no), 1);
    }

    // Move id 0 (originally at centroid 0, list 0) to sit on top of
    // centroid 3 (list 3).
    index.update_vectors(&[0], &[10.0, 10.0]).unwrap();

    assert_eq!(index.ntotal(), 4);
    let total: usize = (0..4).map(|l| index.list_size(l)).sum();
    assert_eq!(total, 4, "update must not leave a duplicate entry behind");
    assert_eq!(index.list_size(0), 0, "old list must be vacated");
    assert_eq!(index.list_size(3), 2, "new list must gain the moved entry");

    let mut out = [0.0f32; 2];
    index.reconstruct(0, &mut out).unwrap();
    assert_eq!(out, [10.0, 10.0]);

    // A search near the old location (centroid 0) with nprobe=1 must no
    // longer surface id 0 — its list is now empty.
    index.nprobe = 1;
    let mut distances = [0.0f32; 1];
    let mut labels = [0i64; 1];
    index
        .search(1, &[0.0, 0.0], 1, &mut distances, &mut labels, None)
        .unwrap();
    assert_ne!(labels[0], 0);
}

/// Hashtable-mode update_vectors goes through remove_ids + add; this is
/// a regression guard on that path staying correct alongside the
/// Array-mode fix above.
#[test]
fn update_vectors_hashtable_mode_replaces_value_in_place() {
    let d = 2;
    let centroids = [0.0, 0.0, 10.0, 0.0, 0.0, 10.0, 10.0, 10.0];
    let mut index = build_index_with_fixed_centroids(
        d,
        MetricType::L2,
        &centroids,
        DirectMapType::Hashtable,
    );
    index.add(4, &centroids, None).unwrap();
    assert_eq!(index.ntotal(), 4);

    index.update_vectors(&[0], &[10.0, 10.0]).unwrap();
    assert_eq!(index.ntotal(), 4);

    let mut out = [0.0f32; 2];
    index.reconstruct(0, &mut out).unwrap();
    assert_eq!(out, [10.0, 10.0]);

    index.nprobe = 4;
    let mut distances = [0.0f32; 4];
    let mut labels = [0i64; 4];
    index
        .search(1, &[10.0, 10.0], 4, &mut distances, &mut labels, None)
        .unwrap();
    assert_eq!(labels.iter().filter(|&&l| l == 0).count(), 1);
}
