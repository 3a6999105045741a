//! Stack headroom for the recursive parser and binder.
//!
//! Parsing and binding recurse once per nesting level of the input. The
//! recursion limits bound the depth, and these helpers make sure the
//! thread has room for that depth, moving to a heap-allocated segment
//! when it doesn't.

/// Free stack required before descending another level.
const RED_ZONE: usize = 128 * 1024;

/// Size of each segment allocated once the red zone is reached.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Stack reserved per nesting level when the whole input is parsed at once.
const PARSE_FRAME_SIZE: usize = 16 * 1024;

/// Runs `f`, switching to a fresh segment first if the current one is
/// nearly exhausted.
#[inline]
pub(crate) fn ensure_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// Runs `f` with enough stack to parse input nested `depth` levels deep.
pub(crate) fn with_parse_stack<R>(depth: usize, f: impl FnOnce() -> R) -> R {
    let needed = depth.saturating_mul(PARSE_FRAME_SIZE).max(RED_ZONE);
    stacker::maybe_grow(needed, needed.saturating_add(RED_ZONE), f)
}
