use rand::Rng;
use rand::seq::SliceRandom;

/// Collects `items` and returns them in uniformly random order.
pub fn shuffled<T, R>(items: impl IntoIterator<Item = T>, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let mut out: Vec<T> = items.into_iter().collect();
    out.as_mut_slice().shuffle(rng);
    out
}
