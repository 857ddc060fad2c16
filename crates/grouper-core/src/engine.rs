use grouper_error::GrouperResult;
use grouper_utils::IdxSize;

/// Linear stage machine of one engine invocation. Failures short-circuit;
/// scratch release is the context's drop glue, on every exit path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum EngineState {
    Init,
    Hashed,
    Sorted,
    Grouped,
    Done,
}

/// Per-invocation scratch owner. Nothing here outlives the call and no
/// process-wide mutable state exists; worker threads only ever share
/// read-only views of these buffers.
pub(crate) struct EngineContext {
    pub(crate) state: EngineState,
    h_scratch: Vec<u64>,
    idx_scratch: Vec<IdxSize>,
    pub(crate) row_buf: Vec<u8>,
}

impl EngineContext {
    pub(crate) fn new() -> Self {
        Self {
            state: EngineState::Init,
            h_scratch: Vec::new(),
            idx_scratch: Vec::new(),
            row_buf: Vec::new(),
        }
    }

    pub(crate) fn advance(&mut self, next: EngineState) {
        debug_assert!(self.state < next, "stage order violated: {:?} -> {next:?}", self.state);
        self.state = next;
    }

    /// Scatter buffers for the sort stage, grown on demand. Acquired before
    /// any caller array is mutated so allocation failure leaves no partial
    /// state behind.
    pub(crate) fn sort_scratch(
        &mut self,
        n: usize,
    ) -> GrouperResult<(&mut [u64], &mut [IdxSize])> {
        if self.h_scratch.len() < n {
            let grow = n - self.h_scratch.len();
            self.h_scratch.try_reserve(grow)?;
            self.h_scratch.resize(n, 0);
        }
        if self.idx_scratch.len() < n {
            let grow = n - self.idx_scratch.len();
            self.idx_scratch.try_reserve(grow)?;
            self.idx_scratch.resize(n, 0);
        }
        Ok((&mut self.h_scratch[..n], &mut self.idx_scratch[..n]))
    }
}
