/// Check whether two floats have a relative difference of at most 5e-5 times the smaller value.
#[macro_export]
macro_rules! assert_floats_near_equal {
    ($val1:expr, $val2:expr, $msg:expr) => {{
        let a: f64 = $val1;
        let b: f64 = $val2;
        let diff = (a - b).abs();
        let relative_diff = if a.abs() < b.abs() { diff / a.abs() } else { diff / b.abs() };
        assert!(diff == 0.0 || relative_diff < 0.00005, "{}: {} vs {}", $msg, a, b);
    }};
}
