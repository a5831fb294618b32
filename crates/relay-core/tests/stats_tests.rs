use relay_core::stats::{mean, percentile, requests_per_second, sort_latencies};

#[test]
fn percentile_uses_ceiling_rank() {
    let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
    assert_eq!(percentile(&sorted, 50.0), 30.0);
    assert_eq!(percentile(&sorted, 90.0), 50.0);
    assert_eq!(percentile(&sorted, 99.0), 50.0);
    assert_eq!(percentile(&sorted, 20.0), 10.0);
}

#[test]
fn percentile_clamps_out_of_range_ranks() {
    let sorted = [7.0, 9.0];
    assert_eq!(percentile(&sorted, 0.0), 7.0);
    assert_eq!(percentile(&sorted, 150.0), 9.0);
}

#[test]
fn percentile_of_empty_is_zero() {
    assert_eq!(percentile(&[], 50.0), 0.0);
    assert_eq!(percentile(&[], 99.0), 0.0);
}

#[test]
fn mean_of_empty_is_none() {
    assert_eq!(mean(&[]), None);
    assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
}

#[test]
fn throughput_is_zero_without_successes() {
    assert_eq!(requests_per_second(0, 2.5), 0.0);
    assert_eq!(requests_per_second(5, 0.0), 0.0);
    assert_eq!(requests_per_second(10, 2.0), 5.0);
}

#[test]
fn sorting_is_ascending() {
    let mut v = vec![3.5, 0.25, 2.0];
    sort_latencies(&mut v);
    assert_eq!(v, vec![0.25, 2.0, 3.5]);
}
