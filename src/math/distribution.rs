//! Operations on discrete, unnormalized distributions over intensity states

use ndarray::Array1;
use num_traits::Float;

/// Index of the largest value, lowest index winning ties
///
/// NaN entries never win. Returns `None` for an empty input or one that
/// holds only NaNs.
pub fn argmax_first<T, I>(values: I) -> Option<usize>
where
    T: Float,
    I: IntoIterator<Item = T>,
{
    let mut best: Option<(usize, T)> = None;
    for (index, value) in values.into_iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Largest absolute elementwise difference between two vectors
///
/// Vectors of different lengths compare as infinitely far apart.
pub fn max_abs_difference<T: Float>(a: &[T], b: &[T]) -> T {
    if a.len() != b.len() {
        return T::infinity();
    }
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x - y).abs())
        .fold(T::zero(), T::max)
}

/// Elementwise product of a set of messages, starting from all ones
///
/// Returns the length of the first message without `states` entries as the
/// error.
pub fn product<'a, I>(states: usize, messages: I) -> Result<Array1<f64>, usize>
where
    I: IntoIterator<Item = &'a Array1<f64>>,
{
    let mut combined = Array1::ones(states);
    for message in messages {
        if message.len() != states {
            return Err(message.len());
        }
        combined *= message;
    }
    Ok(combined)
}

/// Scale a vector so that it sums to one
///
/// Returns the denominator as the error when it is zero, negative or not
/// finite.
pub fn normalize(mut raw: Array1<f64>) -> Result<Array1<f64>, f64> {
    let total = raw.sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(total);
    }
    raw /= total;
    Ok(raw)
}
