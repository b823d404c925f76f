//! Per-feature map: rayon with the `threading` feature, sequential otherwise.
//! Output order always follows input order.

#[cfg(feature = "threading")]
pub(crate) fn map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    use rayon::prelude::*;
    items.par_iter().map(f).collect()
}

#[cfg(not(feature = "threading"))]
pub(crate) fn map<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    items.iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    #[test]
    fn map_preserves_order() {
        let v: Vec<u32> = (0..100).collect();
        assert_eq!(super::map(&v, |x| x * 2), (0..100).map(|x| x * 2).collect::<Vec<_>>());
    }
}
