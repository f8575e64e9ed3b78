use itertools::Itertools;

pub const DEFAULT_MIN_GAP_SIZE: u32 = 5;
pub const DEFAULT_MIN_CONTENT_SIZE: u32 = 20;

/// Half-open run `[start, end)` of occupied columns or rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentInterval {
    pub start: u32,
    pub end: u32,
}

impl ContentInterval {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Distance from the end of `self` to the start of `next`
    pub fn gap_to(&self, next: &ContentInterval) -> u32 {
        next.start.saturating_sub(self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapConfig {
    /// Gaps narrower than this are holes inside a sprite, not frame separators
    pub min_gap_size: u32,
    /// Merged runs shorter than this are noise and get dropped
    pub min_content_size: u32,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            min_gap_size: DEFAULT_MIN_GAP_SIZE,
            min_content_size: DEFAULT_MIN_CONTENT_SIZE,
        }
    }
}

/// Where the run scanner is relative to content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    /// The current position is the first occupied entry of a run
    Entering { start: u32 },
    Inside { start: u32 },
}

/// Maximal runs of `true` in an occupancy profile, in order
pub fn raw_runs(profile: &[bool]) -> Vec<ContentInterval> {
    let mut runs = Vec::new();
    let mut state = ScanState::Outside;

    for (i, &occupied) in profile.iter().enumerate() {
        let i = i as u32;
        state = match (state, occupied) {
            (ScanState::Outside, false) => ScanState::Outside,
            (ScanState::Outside, true) => ScanState::Entering { start: i },
            (ScanState::Entering { start } | ScanState::Inside { start }, true) => {
                ScanState::Inside { start }
            }
            (ScanState::Entering { start } | ScanState::Inside { start }, false) => {
                runs.push(ContentInterval::new(start, i));
                ScanState::Outside
            }
        };
    }

    // a run touching the far edge never sees its closing transition
    if let ScanState::Entering { start } | ScanState::Inside { start } = state {
        runs.push(ContentInterval::new(start, profile.len() as u32));
    }
    runs
}

/// Join neighbouring runs separated by less than `min_gap_size`
pub fn merge_small_gaps(runs: Vec<ContentInterval>, min_gap_size: u32) -> Vec<ContentInterval> {
    runs.into_iter()
        .coalesce(|prev, next| {
            if prev.gap_to(&next) < min_gap_size {
                Ok(ContentInterval::new(prev.start, next.end))
            } else {
                Err((prev, next))
            }
        })
        .collect()
}

/// Content intervals of one axis: raw runs, small gaps merged away, small blobs dropped.
///
/// Never fails. An empty or all-false profile gives an empty list.
pub fn content_intervals(profile: &[bool], config: &GapConfig) -> Vec<ContentInterval> {
    merge_small_gaps(raw_runs(profile), config.min_gap_size)
        .into_iter()
        .filter(|interval| interval.len() >= config.min_content_size)
        .collect()
}

/// Split `[0, total)` into `count` consecutive slices.
///
/// Slice `i` is `[i * total / count, (i + 1) * total / count)`: uniform when `count`
/// divides `total`, otherwise widths differ by at most one. The slices always tile the
/// axis exactly.
pub fn equal_division(total: u32, count: u32) -> Vec<ContentInterval> {
    if count == 0 {
        return Vec::new();
    }
    let boundary = |i: u32| (u64::from(i) * u64::from(total) / u64::from(count)) as u32;
    (0..count)
        .map(|i| ContentInterval::new(boundary(i), boundary(i + 1)))
        .collect()
}
