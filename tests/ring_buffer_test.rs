//! Integration tests for the fixed-capacity history buffer.

use rocket_telemetry::data::ring_buffer::RingBuffer;

#[test]
fn test_keeps_last_capacity_values_in_push_order() {
    for (capacity, pushes) in [(5usize, 5usize), (5, 6), (5, 12), (1, 3), (1000, 2500)] {
        let mut rb = RingBuffer::new(capacity);
        for i in 0..pushes {
            rb.push(i as f64);
        }

        let expected: Vec<f64> = (pushes.saturating_sub(capacity)..pushes)
            .map(|i| i as f64)
            .collect();
        assert_eq!(rb.len(), pushes.min(capacity));
        assert_eq!(rb.to_vec(), expected, "capacity={capacity} pushes={pushes}");
    }
}

#[test]
fn test_partial_fill_is_not_padded() {
    let mut rb = RingBuffer::new(10);
    rb.push(1.5);
    rb.push(2.5);
    assert_eq!(rb.to_vec(), vec![1.5, 2.5]);
    assert_eq!(rb.latest(), Some(2.5));
}

#[test]
fn test_clear_empties_without_shrinking() {
    let mut rb = RingBuffer::new(4);
    for i in 0..7 {
        rb.push(f64::from(i));
    }
    rb.clear();

    assert!(rb.is_empty());
    assert!(rb.to_vec().is_empty());
    assert_eq!(rb.latest(), None);
    assert_eq!(rb.capacity(), 4);

    rb.push(42.0);
    assert_eq!(rb.to_vec(), vec![42.0]);
}

#[test]
fn test_reads_do_not_mutate() {
    let mut rb = RingBuffer::new(3);
    for i in 0..5 {
        rb.push(f64::from(i));
    }
    let first = rb.to_vec();
    let second = rb.to_vec();
    assert_eq!(first, second);
    assert_eq!(rb.len(), 3);
}

#[test]
fn test_zero_capacity_holds_one_value() {
    let mut rb = RingBuffer::new(0);
    rb.push(1.0);
    rb.push(2.0);
    assert_eq!(rb.capacity(), 1);
    assert_eq!(rb.to_vec(), vec![2.0]);
}
