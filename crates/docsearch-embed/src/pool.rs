//! Vector arithmetic shared by the embedding strategies.

/// Smallest value written into an otherwise all-zero vector.
pub const ZERO_NUDGE: f32 = 1e-6;

/// Component-wise mean of `vectors`; zeros when there are none.
pub fn mean_pool<'a, I>(vectors: I, dimension: usize) -> Vec<f32>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut sum = vec![0f32; dimension];
    let mut count = 0usize;
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += *x;
        }
        count += 1;
    }
    if count > 0 {
        #[allow(clippy::cast_precision_loss)]
        let n = count as f32;
        for x in &mut sum {
            *x /= n;
        }
    }
    sanitize(&mut sum);
    sum
}

/// Scale to unit length; a zero vector is left as is.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    sanitize(v);
}

/// NaN and infinite components become zero.
pub fn sanitize(v: &mut [f32]) {
    for x in v.iter_mut() {
        if !x.is_finite() {
            *x = 0.0;
        }
    }
}

/// Give an all-zero vector a single tiny component so cosine distance stays defined.
pub fn nudge_zero(v: &mut [f32]) {
    if v.iter().all(|x| *x == 0.0) {
        if let Some(first) = v.first_mut() {
            *first = ZERO_NUDGE;
        }
    }
}
