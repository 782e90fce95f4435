//! Stack growth for deeply recursive evaluation.

/// Keep this much stack free before recursing further.
const RED_ZONE: usize = 128 * 1024;

/// Size of each freshly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f`, first moving to a new stack segment if the current one is
/// nearly exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
