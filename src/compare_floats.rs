pub fn min_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first < second {
        first
    } else {
        second
    }
}

pub fn max_of_2<T: PartialOrd + Copy>(first: T, second: T) -> T {
    if first > second {
        first
    } else {
        second
    }
}

/// Clamp a ratio into the closed unit interval
pub(crate) fn clamp_fraction(value: f64) -> f64 {
    max_of_2(0., min_of_2(value, 1.))
}

/// Whether `value` lies between `bound_a` and `bound_b` inclusive, in either order
pub(crate) fn is_between(value: f64, bound_a: f64, bound_b: f64) -> bool {
    let (low, high) = if bound_a <= bound_b {
        (bound_a, bound_b)
    } else {
        (bound_b, bound_a)
    };
    value >= low && value <= high
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    pub fn should_calc_2_as_min_of_4_and_2_floats() {
        assert_eq!(min_of_2(4., 2.), 2.);
    }

    #[rstest]
    pub fn should_calc_4_as_max_of_2_and_4_ints() {
        assert_eq!(max_of_2(2, 4), 4);
    }

    #[rstest]
    #[case(-0.2, 0.)]
    #[case(0.35, 0.35)]
    #[case(1.7, 1.)]
    fn should_clamp_fraction(#[case] value: f64, #[case] expected: f64) {
        assert_eq!(clamp_fraction(value), expected);
    }

    #[rstest]
    #[case(-2000., 0., -2500., true)]
    #[case(-2000., -2500., 0., true)]
    #[case(-3000., 0., -2500., false)]
    #[case(0., 0., -2500., true)]
    fn should_detect_value_between_bounds(
        #[case] value: f64,
        #[case] bound_a: f64,
        #[case] bound_b: f64,
        #[case] expected: bool,
    ) {
        assert_eq!(is_between(value, bound_a, bound_b), expected);
    }
}
