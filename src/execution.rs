use std::fmt::Display;

use crate::backend::Backend;
use crate::common::FftError;
use crate::kernel_call::KernelCall;

/// An ordered list of kernel calls that together compute one transform.
///
/// Stages communicate only through the device buffers they share: stage `k + 1` reads what stage `k` wrote. The plan
/// therefore replays its calls strictly in order on the backend's single in-order queue, and never reorders,
/// merges or skips them, except for `once` stages that have already run.
pub struct ExecutionPlan<B: Backend> {
    calls: Vec<KernelCall<B>>,
}

impl<B: Backend> ExecutionPlan<B> {
    pub(crate) fn new(calls: Vec<KernelCall<B>>) -> Self {
        Self { calls }
    }

    /// Enqueues every stage in order.
    ///
    /// Stages marked `once` are skipped if they have already been enqueued by an earlier call to `execute`.
    /// The first failing launch stops the replay and is returned along with the description of its stage.
    pub fn execute(&mut self, backend: &B) -> Result<(), FftError> {
        for call in self.calls.iter_mut() {
            if call.should_run() {
                call.enqueue(backend)?;
            }
        }
        Ok(())
    }

    /// Clears every invocation count, so that `once` stages run again on the next [`ExecutionPlan::execute`].
    ///
    /// Needed when the caller has overwritten the buffers that `once` stages populate.
    pub fn reset(&mut self) {
        for call in self.calls.iter_mut() {
            call.reset();
        }
    }

    /// The kernel calls, in replay order
    pub fn calls(&self) -> &[KernelCall<B>] {
        &self.calls
    }

    /// Number of kernel calls in the plan
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns true if the plan contains no kernel calls
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl<B: Backend> Display for ExecutionPlan<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, call) in self.calls.iter().enumerate() {
            let marker = if call.once() { " [once]" } else { "" };
            writeln!(f, "{:>3}: {}{}", i, call.desc(), marker)?;
        }
        Ok(())
    }
}

impl<B: Backend> std::fmt::Debug for ExecutionPlan<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.calls.iter()).finish()
    }
}
