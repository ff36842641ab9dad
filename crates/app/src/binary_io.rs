//! One bit of hardware seen as an observable input or a settable output.

use std::sync::Arc;

use hausbus_domain::binary::{BinaryState, WriteMode};

use crate::subscription::Subscription;

/// Level transition reported by a [`BinaryInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryStateChange {
    pub old: BinaryState,
    pub new: BinaryState,
}

pub type BinaryStateListener = dyn Fn(BinaryStateChange) + Send + Sync;

pub trait BinaryInput: Send + Sync {
    fn read(&self) -> BinaryState;

    /// Register a listener for level transitions.
    fn on_state_changed(&self, listener: Arc<BinaryStateListener>) -> Subscription;
}

pub trait BinaryOutput: Send + Sync {
    fn read(&self) -> BinaryState;

    /// Set the level. Failures to reach the hardware are logged by the
    /// implementation and never reported to the caller.
    fn write(&self, state: BinaryState, mode: WriteMode);

    /// Push levels staged with [`WriteMode::Stage`] to the hardware. A
    /// no-op when nothing is pending or the output has no staging.
    fn commit(&self) {}
}
