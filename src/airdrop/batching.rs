use crate::utils::amount::ceil_div;

/// Split `items` into `ceil(len / target_size)` batches, dealing items out
/// round-robin: item `i` lands in batch `i % batch_count`.
///
/// Every batch is non-empty and sizes differ by at most one.
pub fn partition_round_robin<T: Clone>(items: &[T], target_size: usize) -> Vec<Vec<T>> {
    let batch_count = ceil_div(items.len(), target_size.max(1));
    let mut batches: Vec<Vec<T>> = (0..batch_count)
        .map(|_| Vec::with_capacity(ceil_div(items.len(), batch_count)))
        .collect();

    for (i, item) in items.iter().enumerate() {
        batches[i % batch_count].push(item.clone());
    }

    batches
}
