//! Global Otsu thresholding for binarization and cell decoding.

use sheet_inspect_core::GrayImageView;

/// Histogram of 8-bit intensities.
fn histogram<'a>(values: impl IntoIterator<Item = &'a u8>) -> ([u32; 256], u32) {
    let mut hist = [0u32; 256];
    let mut total = 0u32;
    for &v in values {
        hist[v as usize] += 1;
        total += 1;
    }
    (hist, total)
}

/// Otsu threshold over a histogram; pixels `< t` are dark.
///
/// Degenerate histograms (one or two populated bins) return the midpoint of
/// the extremes so a clean two-level image splits between its levels.
fn otsu_from_histogram(hist: &[u32; 256], total: u32) -> u8 {
    if total == 0 {
        return 127;
    }
    let first = hist.iter().position(|&h| h > 0).unwrap_or(0);
    let last = hist.iter().rposition(|&h| h > 0).unwrap_or(255);
    if first == last {
        return first as u8;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((first + last + 1) / 2) as u8;
    }

    let total = total as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127usize;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }
        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t;
        }
    }

    // `t` is the last dark bin; callers compare with `<`.
    (best_t + 1).min(255) as u8
}

/// Otsu threshold from a set of sample intensities.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    let (hist, total) = histogram(samples);
    otsu_from_histogram(&hist, total)
}

/// Otsu threshold over a whole frame.
pub fn otsu_threshold(img: &GrayImageView<'_>) -> u8 {
    let (hist, total) = histogram(img.data);
    otsu_from_histogram(&hist, total)
}

/// Dark mask (`1` where `pixel < threshold`).
pub(crate) fn dark_mask(img: &GrayImageView<'_>, threshold: u8) -> Vec<u8> {
    img.data.iter().map(|&v| u8::from(v < threshold)).collect()
}
