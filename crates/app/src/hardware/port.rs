use std::sync::Arc;

use hausbus_domain::binary::{BinaryState, WriteMode};
use hausbus_domain::board::BinaryPort;

use crate::binary_io::{BinaryInput, BinaryOutput, BinaryStateChange, BinaryStateListener};
use crate::hardware::board::IoBoard;
use crate::subscription::Subscription;

/// One pin of an [`IoBoard`], usable as input and output.
///
/// An inverted port flips the level in both directions so that `High`
/// always means logically active.
#[derive(Clone, Debug)]
pub struct BoardPort {
    board: IoBoard,
    port: BinaryPort,
}

impl BoardPort {
    pub(crate) fn new(board: IoBoard, port: BinaryPort) -> Self {
        Self { board, port }
    }

    #[must_use]
    pub fn with_inverted_state(mut self) -> Self {
        self.port.inverted = !self.port.inverted;
        self
    }

    #[must_use]
    pub fn descriptor(&self) -> &BinaryPort {
        &self.port
    }

    fn logical(&self, wire: BinaryState) -> BinaryState {
        wire.invert_if(self.port.inverted)
    }
}

impl BinaryInput for BoardPort {
    fn read(&self) -> BinaryState {
        // The pin was validated when the port was created.
        self.logical(self.board.port_state(self.port.pin).unwrap_or_default())
    }

    fn on_state_changed(&self, listener: Arc<BinaryStateListener>) -> Subscription {
        let pin = self.port.pin;
        let inverted = self.port.inverted;
        self.board.on_pin_changed(move |change| {
            if change.pin == pin {
                listener(BinaryStateChange {
                    old: change.old.invert_if(inverted),
                    new: change.new.invert_if(inverted),
                });
            }
        })
    }
}

impl BinaryOutput for BoardPort {
    fn read(&self) -> BinaryState {
        BinaryInput::read(self)
    }

    fn write(&self, state: BinaryState, mode: WriteMode) {
        let wire = state.invert_if(self.port.inverted);
        if let Err(err) = self
            .board
            .set_port_state(self.port.pin, wire, mode == WriteMode::Commit)
        {
            tracing::warn!(port = %self.port, %err, "writing port failed");
        }
    }

    fn commit(&self) {
        if let Err(err) = self.board.commit_changes(false) {
            tracing::warn!(port = %self.port, %err, "committing port failed");
        }
    }
}
