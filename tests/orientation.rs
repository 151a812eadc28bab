use ocrs::{aggregate, classify, BoundingPolygon, Orientation, OrientationTally, Point};

fn poly(pts: &[(f64, f64)]) -> BoundingPolygon {
    pts.iter().copied().map(Point::from).collect()
}

fn wide_line() -> BoundingPolygon {
    poly(&[(0.0, 0.0), (100.0, 0.0), (100.0, 20.0), (0.0, 20.0)])
}

fn tall_column() -> BoundingPolygon {
    poly(&[(0.0, 0.0), (10.0, 0.0), (10.0, 100.0), (0.0, 100.0)])
}

fn tilted_block() -> BoundingPolygon {
    poly(&[(0.0, 0.0), (70.0, 70.0), (40.0, 100.0), (-30.0, 30.0)])
}

/// Rectangle of the given size whose top edge runs at `deg` degrees.
fn rotated_rect(w: f64, h: f64, deg: f64) -> BoundingPolygon {
    let (s, c) = deg.to_radians().sin_cos();
    let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    corners
        .iter()
        .map(|&(x, y)| Point::new(x * c - y * s, x * s + y * c))
        .collect()
}

#[test]
fn test_scenarios() {
    assert_eq!(classify(&wide_line()), Orientation::Horizontal);
    assert_eq!(classify(&tall_column()), Orientation::Vertical);
    assert_eq!(classify(&tilted_block()), Orientation::Rotated);
}

#[test]
fn test_scenario_page_tally() {
    let page = [wide_line(), tall_column(), tilted_block()];
    assert_eq!(
        aggregate(&page),
        OrientationTally {
            horizontal: 1,
            vertical: 1,
            rotated: 1,
        }
    );
}

#[test]
fn test_zero_width_is_always_vertical() {
    for x in [-50.0, 0.0, 12.5, 1e6] {
        for h in [0.0, 1.0, 300.0] {
            let p = poly(&[(x, 0.0), (x, h), (x, h * 2.0), (x, h * 3.0)]);
            assert_eq!(classify(&p), Orientation::Vertical, "x={x} h={h}");
        }
    }
}

#[test]
fn test_axis_aligned_squares_are_horizontal() {
    for side in [1.0, 7.0, 64.0, 2048.0] {
        let p = poly(&[(5.0, 5.0), (5.0 + side, 5.0), (5.0 + side, 5.0 + side), (5.0, 5.0 + side)]);
        assert_eq!(classify(&p), Orientation::Horizontal, "side={side}");
    }
}

#[test]
fn test_very_tall_boxes_are_vertical_whatever_the_angle() {
    for deg in [0.0, 10.0, 45.0, 90.0, 135.0, 170.0] {
        // top edge at `deg`, but an extent forced to be ten times taller than wide
        let (s, c) = (deg as f64).to_radians().sin_cos();
        let p = poly(&[(0.0, 0.0), (c, s), (1.0, 100.0), (0.0, 100.0)]);
        assert_eq!(classify(&p), Orientation::Vertical, "deg={deg}");
    }
}

#[test]
fn test_angles_between_bounds_are_rotated() {
    for deg in [26.0, 45.0, 60.0, 90.0, 120.0, 154.0] {
        let p = rotated_rect(100.0, 100.0, deg);
        let ext = p.extent().unwrap();
        assert!(ext.height() / ext.width() <= 2.5);
        assert_eq!(classify(&p), Orientation::Rotated, "deg={deg}");
    }
}

#[test]
fn test_slight_skew_is_not_rotation() {
    for deg in [0.0, 3.0, 10.0, 24.0] {
        assert_eq!(
            classify(&rotated_rect(200.0, 30.0, deg)),
            Orientation::Horizontal,
            "deg={deg}"
        );
    }
}

#[test]
fn test_empty_page() {
    let empty: Vec<BoundingPolygon> = Vec::new();
    assert_eq!(aggregate(&empty), OrientationTally::default());
    assert_eq!(aggregate(&empty).total(), 0);
}

#[test]
fn test_aggregate_is_order_independent() {
    let page = vec![
        wide_line(),
        tall_column(),
        tilted_block(),
        wide_line(),
        poly(&[(0.0, 0.0)]),
        poly(&[(1.0, 1.0); 4]),
    ];
    let expected = aggregate(&page);
    assert_eq!(expected.total(), page.len());

    let mut reversed = page.clone();
    reversed.reverse();
    assert_eq!(aggregate(&reversed), expected);

    for shift in 1..page.len() {
        let mut rotated = page.clone();
        rotated.rotate_left(shift);
        assert_eq!(aggregate(&rotated), expected, "shift={shift}");
    }
}

#[test]
fn test_degenerate_input_never_panics() {
    let nasty = [
        poly(&[]),
        poly(&[(f64::NAN, f64::NAN); 4]),
        poly(&[(0.0, 0.0), (f64::INFINITY, 0.0), (0.0, f64::NEG_INFINITY), (1.0, 1.0)]),
        poly(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]),
    ];
    let tally = aggregate(&nasty);
    assert_eq!(tally.total(), nasty.len());
}
