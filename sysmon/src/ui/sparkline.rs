use crate::timeseries::TimeSeries;

const LEVELS_LOW: [char; 3] = ['▁', '▄', '█'];
const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render `series` as `width` glyphs scaled between its min and max.
///
/// Fewer than two points render as a flat baseline. Longer series are
/// sampled at a fixed stride, shorter ones padded with the last value.
pub fn sparkline(series: &TimeSeries, width: usize) -> String {
    render(&series.values(), width)
}

pub fn render(values: &[f64], width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if values.len() < 2 {
        return LEVELS[0].to_string().repeat(width);
    }

    let levels: &[char] = if width < 10 { &LEVELS_LOW } else { &LEVELS };

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        max = min + 1.0;
    }

    let sampled: Vec<f64> = if values.len() > width {
        let stride = values.len() / width;
        (0..width).map(|i| values[i * stride]).collect()
    } else {
        let last = values[values.len() - 1];
        values
            .iter()
            .copied()
            .chain(std::iter::repeat(last))
            .take(width)
            .collect()
    };

    sampled
        .into_iter()
        .map(|v| {
            let scaled = (v - min) / (max - min);
            let idx = (scaled * (levels.len() - 1) as f64) as usize;
            levels[idx.min(levels.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_series_is_flat() {
        assert_eq!(render(&[50.0], 4), "▁▁▁▁");
        assert_eq!(render(&[], 3), "▁▁▁");
    }

    #[test]
    fn spans_full_range() {
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        assert_eq!(render(&values, 12), "▁▂▃▄▅▆▇█████");
    }

    #[test]
    fn narrow_width_uses_coarse_levels() {
        assert_eq!(render(&[0.0, 50.0, 100.0], 3), "▁▄█");
    }

    #[test]
    fn long_series_is_downsampled() {
        let values: Vec<f64> = (0..60).map(f64::from).collect();
        let line = render(&values, 20);
        assert_eq!(line.chars().count(), 20);
        assert!(line.starts_with('▁'));
    }

    #[test]
    fn constant_series_does_not_divide_by_zero() {
        assert_eq!(render(&[7.0, 7.0, 7.0], 3), "▁▁▁");
    }
}
