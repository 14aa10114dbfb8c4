#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn full_hd() -> Dimensions {
    Dimensions::rendered(1920.0, 1080.0, 1920.0, 1080.0)
}

// --- Dimensions ---

#[test]
fn scale_factor_is_pixel_width_over_logical_width() {
    let dims = Dimensions::rendered(1920.0, 1080.0, 960.0, 540.0);
    assert!(approx_eq(dims.scale_factor(), 0.5));
}

#[test]
fn dimensions_deserialize_from_console_json() {
    let json = r#"{"videoWidth":1280,"videoHeight":720,"pixelWidth":640,"pixelHeight":360,"offsetX":12,"offsetY":4}"#;
    let dims: Dimensions = serde_json::from_str(json).expect("dimensions json");
    assert_eq!(dims.video_width, 1280.0);
    assert_eq!(dims.pixel_height, 360.0);
    assert_eq!(dims.offset_x, 12.0);
    assert_eq!(dims.offset_y, 4.0);
}

#[test]
fn dimensions_offsets_default_to_zero() {
    let json = r#"{"videoWidth":1920,"videoHeight":1080,"pixelWidth":1920,"pixelHeight":1080}"#;
    let dims: Dimensions = serde_json::from_str(json).expect("dimensions json");
    assert_eq!(dims.offset_x, 0.0);
    assert_eq!(dims.offset_y, 0.0);
}

// --- widget_size_px ---

#[test]
fn widget_size_scales_with_rendered_width() {
    let dims = Dimensions::rendered(1920.0, 1080.0, 960.0, 540.0);
    let size = widget_size_px(&dims, Size::new(400.0, 200.0));
    assert!(approx_eq(size.width, 200.0));
    assert!(approx_eq(size.height, 100.0));
}

#[test]
fn widget_size_is_capped_at_frame() {
    let dims = Dimensions::rendered(1920.0, 1080.0, 960.0, 540.0);
    let size = widget_size_px(&dims, Size::new(4000.0, 3000.0));
    assert!(approx_eq(size.width, 960.0));
    assert!(approx_eq(size.height, 540.0));
}

// --- normalized_ranges ---

#[test]
fn ranges_upper_bound_shrinks_with_item_size() {
    let ranges = normalized_ranges(&full_hd(), Size::new(400.0, 108.0));
    assert!(approx_eq(ranges.x_min, -1.0));
    assert!((ranges.x_max - 0.583_333).abs() < 1e-5);
    assert!(approx_eq(ranges.y_max, 0.8));
}

#[test]
fn ranges_for_zero_size_item_span_full_interval() {
    let ranges = normalized_ranges(&full_hd(), Size::new(0.0, 0.0));
    assert!(approx_eq(ranges.x_max, 1.0));
    assert!(approx_eq(ranges.y_max, 1.0));
}

#[test]
fn ranges_for_full_width_item_collapse() {
    let ranges = normalized_ranges(&full_hd(), Size::new(1920.0, 100.0));
    assert!(approx_eq(ranges.x_max, ranges.x_min));
}

#[test]
fn ranges_with_zero_frame_do_not_produce_nan() {
    let dims = Dimensions::rendered(1920.0, 1080.0, 0.0, 0.0);
    let ranges = normalized_ranges(&dims, Size::new(0.0, 0.0));
    assert!(ranges.x_max.is_finite());
    assert!(ranges.y_max.is_finite());
}

// --- widget_position ---

#[test]
fn origin_maps_to_frame_center_for_top_left_corner() {
    let pos = widget_position(NormalizedPos::new(0.0, 0.0), &full_hd(), Size::new(400.0, 200.0));
    assert!(approx_eq(pos.x, 960.0));
    assert!(approx_eq(pos.y, 540.0));
}

#[test]
fn range_endpoints_map_to_frame_edges() {
    let dims = full_hd();
    let size = Size::new(400.0, 200.0);
    let ranges = normalized_ranges(&dims, size);

    let top_left = widget_position(NormalizedPos::new(-1.0, -1.0), &dims, size);
    assert!(approx_eq(top_left.x, 0.0));
    assert!(approx_eq(top_left.y, 0.0));

    let bottom_right = widget_position(NormalizedPos::new(ranges.x_max, ranges.y_max), &dims, size);
    assert!(approx_eq(bottom_right.x, 1520.0));
    assert!(approx_eq(bottom_right.y, 880.0));
}

#[test]
fn out_of_range_input_is_clamped_into_frame() {
    let dims = full_hd();
    let size = Size::new(400.0, 200.0);

    let far = widget_position(NormalizedPos::new(5.0, 5.0), &dims, size);
    assert!(approx_eq(far.x, 1520.0));
    assert!(approx_eq(far.y, 880.0));

    let near = widget_position(NormalizedPos::new(-3.0, -3.0), &dims, size);
    assert!(approx_eq(near.x, 0.0));
    assert!(approx_eq(near.y, 0.0));
}

#[test]
fn full_width_item_is_pinned_on_x_but_moves_on_y() {
    let dims = full_hd();
    let size = Size::new(1920.0, 200.0);
    for norm_x in [-1.0, -0.5, 0.0, 0.7, 1.0] {
        let pos = widget_position(NormalizedPos::new(norm_x, 0.0), &dims, size);
        assert_eq!(pos.x, 0.0, "x must stay pinned for norm_x={norm_x}");
        assert!(approx_eq(pos.y, 540.0));
    }
}

#[test]
fn positions_always_stay_inside_frame() {
    let dims = Dimensions::rendered(1280.0, 720.0, 853.0, 480.0);
    let size = widget_size_px(&dims, Size::new(300.0, 150.0));
    for norm in [-2.0, -1.0, -0.25, 0.0, 0.4, 0.9, 1.0, 3.0] {
        let pos = widget_position(NormalizedPos::new(norm, -norm), &dims, size);
        assert!(BoxRect::new(pos, size).contained_in(&dims), "escaped frame for norm={norm}");
    }
}

// --- normalized_position ---

#[test]
fn centered_pixel_position_maps_back_to_negative_normalized() {
    let pos = normalized_position(Point::new(760.0, 440.0), &full_hd(), Size::new(400.0, 200.0));
    assert!((pos.x - -0.208_333).abs() < 1e-5);
    assert!((pos.y - -0.185_185).abs() < 1e-5);
}

#[test]
fn round_trip_returns_original_normalized_position() {
    let dims = Dimensions::rendered(1920.0, 1080.0, 1366.0, 768.0);
    let size = widget_size_px(&dims, Size::new(480.0, 270.0));
    let ranges = normalized_ranges(&dims, size);
    for (x, y) in [(-1.0, -1.0), (-0.3, 0.1), (0.0, 0.0), (ranges.x_max, ranges.y_max)] {
        let norm = NormalizedPos::new(x, y);
        let back = normalized_position(widget_position(norm, &dims, size), &dims, size);
        assert!(approx_eq(back.x, norm.x), "x round trip failed for {norm:?}");
        assert!(approx_eq(back.y, norm.y), "y round trip failed for {norm:?}");
    }
}

#[test]
fn normalized_position_of_pinned_axis_is_minimum() {
    let pos = normalized_position(Point::new(0.0, 100.0), &full_hd(), Size::new(1920.0, 200.0));
    assert_eq!(pos.x, -1.0);
}

#[test]
fn normalized_position_is_clamped_to_range() {
    let dims = full_hd();
    let size = Size::new(400.0, 200.0);
    let ranges = normalized_ranges(&dims, size);
    let pos = normalized_position(Point::new(5000.0, -50.0), &dims, size);
    assert!(approx_eq(pos.x, ranges.x_max));
    assert!(approx_eq(pos.y, -1.0));
}

// --- clamp_position / BoxRect ---

#[test]
fn clamp_position_keeps_raw_drag_inside() {
    let pos = clamp_position(Point::new(-40.0, 2000.0), &full_hd(), Size::new(400.0, 200.0));
    assert_eq!(pos, Point::new(0.0, 880.0));
}

#[test]
fn to_container_applies_video_offset() {
    let mut dims = full_hd();
    dims.offset_x = 30.0;
    dims.offset_y = 12.0;
    let rect = BoxRect::new(Point::new(100.0, 50.0), Size::new(10.0, 10.0)).to_container(&dims);
    assert_eq!(rect.x, 130.0);
    assert_eq!(rect.y, 62.0);
    assert_eq!(rect.width, 10.0);
}

#[test]
fn contained_in_rejects_overflow() {
    let rect = BoxRect::new(Point::new(1600.0, 0.0), Size::new(400.0, 100.0));
    assert!(!rect.contained_in(&full_hd()));
}
