//! Tournament reduction.
//!
//! Folds a sequence by combining adjacent pairs per round instead of
//! chaining left to right; an odd survivor is carried into the next round
//! unchanged. The round index is handed to the combiner, which is what
//! lets indexed-load lowering key each round off one bit of the index.

/// Reduces `items` pairwise. Returns `None` on an empty input.
pub(crate) fn tournament<T, F>(items: &[T], combine: &mut F) -> Option<T>
where
    T: Copy,
    F: FnMut(T, T, usize) -> T,
{
    if items.is_empty() {
        return None;
    }

    let mut round = items.to_vec();
    let mut level = 0;
    while round.len() > 1 {
        let mut next = Vec::with_capacity((round.len() + 1) / 2);
        for pair in round.chunks(2) {
            match pair {
                [a, b] => next.push(combine(*a, *b, level)),
                [odd] => next.push(*odd),
                _ => unreachable!(),
            }
        }
        round = next;
        level += 1;
    }
    Some(round[0])
}

/// Number of rounds a tournament over `n` items takes, i.e. ⌈log₂ n⌉.
pub(crate) fn levels(n: usize) -> usize {
    if n < 2 {
        return 0;
    }
    (usize::BITS - (n - 1).leading_zeros()) as usize
}
