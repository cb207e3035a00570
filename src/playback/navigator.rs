//! Index arithmetic for "next" and "previous".
//!
//! Pure functions over a list length, a current index and a [`PlayMode`].
//! Randomness for shuffle is injected so callers (and tests) control it.

use rand::Rng;

use super::types::PlayMode;

/// Index to play after `current`, or `None` when playback should stop.
pub fn next_index<R: Rng + ?Sized>(
    len: usize,
    current: usize,
    mode: PlayMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match mode {
        PlayMode::Sequential => current.checked_add(1).filter(|&i| i < len),
        PlayMode::RepeatAll => Some((current.min(len - 1) + 1) % len),
        PlayMode::RepeatOne => Some(current.min(len - 1)),
        PlayMode::Shuffle => Some(rng.random_range(0..len)),
    }
}

/// Index to play before `current`, or `None` when there is nothing before it.
///
/// Shuffle keeps no history, so going back picks a random index like going forward.
pub fn previous_index<R: Rng + ?Sized>(
    len: usize,
    current: usize,
    mode: PlayMode,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match mode {
        PlayMode::Sequential => current.checked_sub(1).filter(|&i| i < len),
        PlayMode::RepeatAll => Some((current.min(len - 1) + len - 1) % len),
        PlayMode::RepeatOne => Some(current.min(len - 1)),
        PlayMode::Shuffle => next_index(len, current, mode, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const ALL_MODES: [PlayMode; 4] = [
        PlayMode::Sequential,
        PlayMode::RepeatAll,
        PlayMode::RepeatOne,
        PlayMode::Shuffle,
    ];

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn empty_list_is_none_in_every_mode() {
        let mut r = rng();
        for mode in ALL_MODES {
            for current in [0, 1, 5] {
                assert_eq!(next_index(0, current, mode, &mut r), None);
                assert_eq!(previous_index(0, current, mode, &mut r), None);
            }
        }
    }

    #[test]
    fn sequential_stops_at_both_ends() {
        let mut r = rng();
        assert_eq!(next_index(3, 0, PlayMode::Sequential, &mut r), Some(1));
        assert_eq!(next_index(3, 2, PlayMode::Sequential, &mut r), None);
        assert_eq!(previous_index(3, 2, PlayMode::Sequential, &mut r), Some(1));
        assert_eq!(previous_index(3, 0, PlayMode::Sequential, &mut r), None);
    }

    #[test]
    fn repeat_all_wraps() {
        let mut r = rng();
        assert_eq!(next_index(3, 2, PlayMode::RepeatAll, &mut r), Some(0));
        assert_eq!(previous_index(3, 0, PlayMode::RepeatAll, &mut r), Some(2));
        assert_eq!(next_index(1, 0, PlayMode::RepeatAll, &mut r), Some(0));
    }

    #[test]
    fn repeat_one_stays_put() {
        let mut r = rng();
        for len in 1..6 {
            for i in 0..len {
                assert_eq!(next_index(len, i, PlayMode::RepeatOne, &mut r), Some(i));
                assert_eq!(previous_index(len, i, PlayMode::RepeatOne, &mut r), Some(i));
            }
        }
    }

    #[test]
    fn next_then_previous_round_trips_for_ordered_modes() {
        let mut r = rng();
        for mode in [PlayMode::Sequential, PlayMode::RepeatAll] {
            for len in 1..8 {
                for i in 0..len {
                    if let Some(n) = next_index(len, i, mode, &mut r) {
                        assert_eq!(
                            previous_index(len, n, mode, &mut r),
                            Some(i),
                            "{mode:?} len={len} i={i}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn shuffle_stays_in_bounds_and_is_reproducible_with_a_seed() {
        let picks = |seed| {
            let mut r = StdRng::seed_from_u64(seed);
            (0..64)
                .map(|_| next_index(5, 0, PlayMode::Shuffle, &mut r).unwrap())
                .collect::<Vec<_>>()
        };
        let a = picks(9);
        assert!(a.iter().all(|&i| i < 5));
        assert_eq!(a, picks(9));
        // 64 draws over 5 slots hit more than one slot.
        assert!(a.iter().any(|&i| i != a[0]));
    }

    #[test]
    fn shuffle_previous_draws_like_next() {
        let mut a = rng();
        let mut b = rng();
        for _ in 0..16 {
            assert_eq!(
                previous_index(7, 3, PlayMode::Shuffle, &mut a),
                next_index(7, 3, PlayMode::Shuffle, &mut b)
            );
        }
    }
}
