//! Tempo-derived analysis windows. One window spans four beats.

const BEATS_PER_SEGMENT: f64 = 4.0;

/// Seconds per segment for a tempo in beats per minute.
pub fn segment_duration(bpm: u32) -> f64 {
    (60.0 / bpm as f64) * BEATS_PER_SEGMENT
}

/// Number of whole segments that fit in the track. A trailing partial segment is dropped.
///
/// The count is the floor of the exact quotient, derived from the remainder. Dividing
/// first can round a quotient just below an integer up to it and count one segment
/// too many.
pub fn segment_count(total_secs: f64, segment_secs: f64) -> usize {
    if segment_secs <= 0.0 || total_secs <= 0.0 {
        return 0;
    }
    let remainder = total_secs % segment_secs;
    let whole = (total_secs - remainder) / segment_secs;
    let floor = whole.floor();
    if whole - floor > 0.5 {
        floor as usize + 1
    } else {
        floor as usize
    }
}

/// Sample range of segment `index`. Both ends are derived from the index directly,
/// so `end` of one segment need not equal `start` of the next.
pub fn segment_bounds(index: usize, segment_secs: f64, sample_rate: u32) -> (usize, usize) {
    let rate = sample_rate as f64;
    let start = (index as f64 * segment_secs * rate).floor() as usize;
    let end = ((index + 1) as f64 * segment_secs * rate).floor() as usize;
    (start, end)
}

/// Start time in seconds of segment `index`.
pub fn segment_start_secs(index: usize, segment_secs: f64) -> f64 {
    index as f64 * segment_secs
}
