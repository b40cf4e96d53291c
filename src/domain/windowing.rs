/// One supervised example: a window of W consecutive normalized prices and
/// the normalized price that immediately follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedExample {
    pub input: Vec<f64>,
    pub target: f64,
}

/// Slice a normalized series into supervised examples.
///
/// For a series of length L this yields exactly `L - W - 1` examples, not
/// `L - W`: the trailing example is excluded. That off-by-one is carried
/// over from the behavior the trained artifacts were validated against and
/// callers must not assume `L - W` examples.
pub fn make_windows(normalized: &[f64], window: usize) -> Vec<WindowedExample> {
    if normalized.len() < window + 2 {
        return Vec::new();
    }

    let count = normalized.len() - window - 1;
    (0..count)
        .map(|i| WindowedExample {
            input: normalized[i..i + window].to_vec(),
            target: normalized[i + window],
        })
        .collect()
}

/// Chronological train/test split.
///
/// Splits by index order, never randomly: the test slice always follows the
/// training slice in time. Shuffling would leak future observations into
/// training through overlapping windows.
pub fn split(
    examples: Vec<WindowedExample>,
    train_fraction: f64,
) -> (Vec<WindowedExample>, Vec<WindowedExample>) {
    let train_len = (examples.len() as f64 * train_fraction).floor() as usize;
    let mut train = examples;
    let test = train.split_off(train_len.min(train.len()));
    (train, test)
}
