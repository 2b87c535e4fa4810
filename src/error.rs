use thiserror::Error;

pub use crate::sys::CecTxError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Transmit(#[from] CecTxError),
}

/// A frame that can not be turned into a [CecMessage](crate::CecMessage) or back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("message too short: {0} bytes, need header and opcode")]
    TooShort(usize),

    #[error("too many parameters: {0} bytes, at most 14 fit")]
    TooLong(usize),
}

/// Delivering a result to a [Callback](crate::Callback) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// the receiving side went away
    #[error("callback receiver is gone")]
    Gone,

    #[error("callback failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CecLogicalAddress, CecMessage, CecOpcode, CecMsg};

    fn encode(params: &[u8]) -> Result<CecMsg, Error> {
        let msg = CecMessage::new(
            CecLogicalAddress::Playback1,
            CecLogicalAddress::Tv,
            CecOpcode::ReportPowerStatus,
            params,
        );
        Ok(msg.to_raw()?)
    }

    #[test]
    fn oversized_message_is_a_message_error() {
        assert!(encode(&[0; 14]).is_ok());
        match encode(&[0; 15]) {
            Err(Error::Message(MessageError::TooLong(15))) => {}
            other => panic!("unexpected {:?}", other.map(|m| m.len)),
        }
    }

    #[test]
    fn nack_is_a_transmit_error() {
        let e = Error::from(CecTxError {
            status: crate::TxStatus::NACK,
            arb_lost: 0,
            nack: 1,
            low_drive: 0,
            error: 0,
        });
        assert!(matches!(e, Error::Transmit(ref t) if t.nack == 1));
        assert!(e.to_string().starts_with("transmit failed"));
    }
}
