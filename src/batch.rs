use crate::error::{Error, Result};
use crate::store::ObjectKey;

/// A bounded group of keys that ends up in one manifest
pub type Batch = Vec<ObjectKey>;

/// Split `keys` into batches of at most `batch_limit` keys
///
/// The returned iterator makes a single forward pass over `keys`. Every batch
/// except the last holds exactly `batch_limit` keys; the last one holds the
/// remainder and is never empty.
pub fn batch<I>(keys: I, batch_limit: usize) -> Result<Batches<I::IntoIter>>
where
    I: IntoIterator<Item = ObjectKey>,
{
    if batch_limit < 1 {
        return Err(Error::invalid_argument(format!(
            "batch limit must be at least 1, got {}",
            batch_limit
        )));
    }
    Ok(Batches { keys: keys.into_iter(), limit: batch_limit })
}

/// Lazy batch producer returned by [`batch`]
#[derive(Debug, Clone)]
pub struct Batches<I> {
    keys: I,
    limit: usize,
}

impl<I> Batches<I> {
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<I: Iterator<Item = ObjectKey>> Iterator for Batches<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let chunk = self.keys.by_ref().take(self.limit).collect::<Vec<_>>();
        if chunk.is_empty() { None } else { Some(chunk) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.keys.size_hint();
        (lo.div_ceil(self.limit), hi.map(|hi| hi.div_ceil(self.limit)))
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn keys(n: usize) -> Vec<ObjectKey> {
        (0..n).map(|i| format!("img/{}.jpg", i)).collect()
    }

    #[rstest]
    #[case(0, 3, vec![])]
    #[case(1, 3, vec![1])]
    #[case(3, 3, vec![3])]
    #[case(7, 3, vec![3, 3, 1])]
    #[case(9, 1, vec![1; 9])]
    #[case(2500, 1000, vec![1000, 1000, 500])]
    fn batch_sizes(#[case] n: usize, #[case] limit: usize, #[case] sizes: Vec<usize>) {
        let batches = batch(keys(n), limit).unwrap().collect::<Vec<_>>();
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), sizes);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    #[case(10)]
    #[case(64)]
    fn concatenation_preserves_order(#[case] limit: usize) {
        let input = keys(37);
        let batches = batch(input.clone(), limit).unwrap().collect::<Vec<_>>();
        for b in &batches[..batches.len() - 1] {
            assert_eq!(b.len(), limit);
        }
        assert!(batches.last().unwrap().len() <= limit);
        assert_eq!(batches.concat(), input);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = batch(keys(3), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn pulls_lazily() {
        let mut pulled = 0;
        let source = std::iter::repeat_with(|| {
            pulled += 1;
            "k".to_string()
        });
        let first = batch(source, 5).unwrap().next().unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(pulled, 5);
    }

    #[test]
    fn size_hint_counts_batches() {
        assert_eq!(batch(keys(2500), 1000).unwrap().size_hint(), (3, Some(3)));
    }
}
