pub mod batch;
pub mod bitmap;
pub mod datatype;
pub mod flat;
pub mod hash;
pub mod list_view;
pub mod physical_type;
pub mod scalar;
pub mod scalar_buffer;
pub mod transfer;
pub mod vector;
pub mod visitor;

/// Compute the capacity to grow to so that at least `needed` entries fit.
///
/// Empty buffers start at `initial`, then capacity doubles until it's large
/// enough.
pub(crate) fn next_capacity(curr: usize, needed: usize, initial: usize) -> usize {
    let mut cap = if curr == 0 { initial.max(1) } else { curr };
    while cap < needed {
        cap = cap.saturating_mul(2);
    }
    cap
}
