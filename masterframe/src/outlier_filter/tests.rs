//! Tests for the local outlier filter.

use super::*;

fn flat_image(size: ImageSize, value: f32) -> Vec<f32> {
    vec![value; size.pixel_count()]
}

#[test]
fn test_hot_pixel_replaced_by_neighborhood_formula() {
    let size = ImageSize::new(10, 10);
    let mut data = flat_image(size, 50.0);
    data[5 * 10 + 5] = 500.0;

    let replaced = remove_noise(&mut data, size, 3.0);

    assert_eq!(replaced, 1);
    // Window sum 24 * 50 + 500 = 1700, minus min 50, max 500 and the center 500
    let expected = (650.0f64 / 22.0) as f32;
    assert_eq!(data[5 * 10 + 5], expected);
    for (i, &v) in data.iter().enumerate() {
        if i != 5 * 10 + 5 {
            assert_eq!(v, 50.0, "pixel {i} changed");
        }
    }
}

#[test]
fn test_cold_pixel_replaced() {
    let size = ImageSize::new(10, 10);
    let mut data = flat_image(size, 50.0);
    data[5 * 10 + 5] = 0.0;

    assert_eq!(remove_noise(&mut data, size, 3.0), 1);
    // (24 * 50 + 0 - 0 - 50 - 0) / 22
    assert_eq!(data[5 * 10 + 5], (1150.0f64 / 22.0) as f32);
}

#[test]
fn test_corner_window_keeps_fixed_denominator() {
    let size = ImageSize::new(10, 10);
    let mut data = flat_image(size, 50.0);
    data[0] = 500.0;

    assert_eq!(remove_noise(&mut data, size, 3.0), 1);
    // 3x3 window: (8 * 50 + 500 - 50 - 500 - 500) / (9 - 3)
    assert_eq!(data[0], -25.0);
}

#[test]
fn test_replacements_read_original_values() {
    let size = ImageSize::new(10, 10);
    let mut data = flat_image(size, 50.0);
    data[5 * 10 + 5] = 500.0;
    data[5 * 10 + 6] = 500.0;

    assert_eq!(remove_noise(&mut data, size, 3.0), 2);
    // Both windows contain both hot pixels from the untouched copy:
    // (23 * 50 + 1000 - 50 - 500 - 500) / 22 = 50
    assert_eq!(data[5 * 10 + 5], 50.0);
    assert_eq!(data[5 * 10 + 6], 50.0);
}

#[test]
fn test_clean_image_unchanged() {
    let size = ImageSize::new(8, 8);
    let mut data: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 49.0 } else { 51.0 }).collect();
    let original = data.clone();

    assert_eq!(remove_noise(&mut data, size, 3.0), 0);
    assert_eq!(data, original);
}

#[test]
fn test_tiny_image_untouched() {
    let size = ImageSize::new(3, 1);
    let mut data = vec![1.0, 1000.0, 1.0];
    assert_eq!(remove_noise(&mut data, size, 3.0), 0);
    assert_eq!(data, vec![1.0, 1000.0, 1.0]);
}

#[test]
fn test_neighborhood_mean_interior() {
    let size = ImageSize::new(5, 5);
    let data: Vec<f32> = (0..25).map(|v| v as f32).collect();
    // Full window: sum 300, min 0, max 24, center 12
    let value = neighborhood_mean(&data, size, 2, 2).unwrap();
    assert_eq!(value, (264.0f64 / 22.0) as f32);
}

#[test]
fn test_neighborhood_mean_too_small_window() {
    let size = ImageSize::new(3, 1);
    let data = vec![1.0, 2.0, 3.0];
    assert!(neighborhood_mean(&data, size, 0, 0).is_none());

    let size = ImageSize::new(4, 1);
    let data = vec![1.0, 2.0, 3.0, 4.0];
    // Window around col 1 spans cols 0..=3: (10 - 1 - 4 - 2) / 1
    assert_eq!(neighborhood_mean(&data, size, 1, 0), Some(3.0));
}

#[test]
#[should_panic(expected = "Pixel count mismatch")]
fn test_size_mismatch_panics() {
    let mut data = vec![0.0; 10];
    remove_noise(&mut data, ImageSize::new(4, 4), 3.0);
}
