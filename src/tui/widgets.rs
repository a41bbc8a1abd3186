//! Small rendering helpers shared by the views.

/// Block characters from low to high
const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render the tail of a latency history as a block-character sparkline,
/// scaled to the window's own maximum
pub fn latency_sparkline(history: &[u64], width: usize) -> String {
    if history.is_empty() || width == 0 {
        return String::new();
    }

    let start = history.len().saturating_sub(width);
    let window = &history[start..];
    let max = window.iter().copied().max().unwrap_or(1).max(1);

    window
        .iter()
        .map(|&v| {
            let idx = ((v as f64 / max as f64) * (BARS.len() - 1) as f64).round() as usize;
            BARS[idx.min(BARS.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparkline_empty() {
        assert_eq!(latency_sparkline(&[], 10), "");
        assert_eq!(latency_sparkline(&[1, 2], 0), "");
    }

    #[test]
    fn test_sparkline_scales_to_max() {
        let s = latency_sparkline(&[0, 50, 100], 10);
        let chars: Vec<char> = s.chars().collect();
        assert_eq!(chars.len(), 3);
        assert_eq!(chars[0], '▁');
        assert_eq!(chars[2], '█');
    }

    #[test]
    fn test_sparkline_windows_to_width() {
        let history: Vec<u64> = (0..100).collect();
        let s = latency_sparkline(&history, 20);
        assert_eq!(s.chars().count(), 20);
    }
}
