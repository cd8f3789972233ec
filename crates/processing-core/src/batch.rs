//! Batch and chunk partitioning.
//!
//! Batches bound the memory of audio extraction; chunks bound the size of
//! one video filter graph. Both are contiguous and order-preserving.

/// Contiguous slice of work with its position in the sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch<'a, T> {
    pub index: usize,
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// File name of this batch's intermediate artifact.
    pub fn artifact_name(&self, extension: &str) -> String {
        format!("batch_{:04}.{extension}", self.index)
    }
}

/// Split `items` into batches of at most `batch_size` (treated as at least 1).
pub fn partition<T>(items: &[T], batch_size: usize) -> Vec<Batch<'_, T>> {
    items
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(index, items)| Batch { index, items })
        .collect()
}

/// Segments per chunk so that about `target_chunks` chunks cover `count`
/// segments, clamped to `1..=max_per_chunk`.
pub fn chunk_size(count: usize, target_chunks: usize, max_per_chunk: usize) -> usize {
    (count / target_chunks.max(1)).max(1).min(max_per_chunk.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_preserves_order() {
        let items: Vec<usize> = (0..1234).collect();
        let batches = partition(&items, 500);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].index, 2);
        assert_eq!(batches[2].len(), 234);
        let flattened: Vec<usize> = batches.iter().flat_map(|b| b.items.iter().copied()).collect();
        assert_eq!(flattened, items);
    }

    #[test]
    fn test_partition_edge_cases() {
        let empty: Vec<u8> = Vec::new();
        assert!(partition(&empty, 500).is_empty());
        assert_eq!(partition(&[1, 2, 3], 0).len(), 3);
    }

    #[test]
    fn test_artifact_name() {
        let items = [1];
        let batch = partition(&items, 10)[0];
        assert_eq!(batch.artifact_name("wav"), "batch_0000.wav");
    }

    #[test]
    fn test_chunk_size() {
        assert_eq!(chunk_size(60, 5, 10), 10);
        assert_eq!(partition(&[0u8; 60], chunk_size(60, 5, 10)).len(), 6);
        assert_eq!(chunk_size(3, 5, 10), 1);
        assert_eq!(chunk_size(30, 5, 10), 6);
        assert_eq!(chunk_size(0, 5, 10), 1);
    }
}
