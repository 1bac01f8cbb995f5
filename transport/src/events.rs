//! Transport events: the items a producer enqueues to a channel.

use std::io;

use byteorder::{ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use strom_bytes::view::View;

use crate::gate::TaskId;

/// The byte order for writing channel headers.
type ByteOrder = byteorder::BigEndian;

/// Framing data accompanying each view in flight, identifying the channel, the
/// source and destination tasks, the payload length, and a per-channel sequence
/// number.
// *Warning*: Adding, removing and altering fields requires to adjust the implementation below!
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelHeader {
    /// Index of the channel within its gate.
    pub channel: usize,
    /// Identity of the task sending the view.
    pub source: TaskId,
    /// Identity of the task receiving the view.
    pub target: TaskId,
    /// Number of payload bytes in the view.
    pub length: usize,
    /// Sequence number, stamped at enqueue; consecutive per channel.
    pub seqno: usize,
}

impl ChannelHeader {

    /// Bytes occupied by the three `u64` fields and the two task identities.
    const HEADER_BYTES: usize = 3 * std::mem::size_of::<u64>() + 2 * std::mem::size_of::<u128>();

    /// Returns a header when there is enough supporting data.
    #[inline]
    pub fn try_read(bytes: &[u8]) -> Option<ChannelHeader> {
        let mut cursor = io::Cursor::new(bytes);
        // Order must match writing order.
        let channel = cursor.read_u64::<ByteOrder>().ok()? as usize;
        let length = cursor.read_u64::<ByteOrder>().ok()? as usize;
        let seqno = cursor.read_u64::<ByteOrder>().ok()? as usize;
        let source = TaskId::from_u128(cursor.read_u128::<ByteOrder>().ok()?);
        let target = TaskId::from_u128(cursor.read_u128::<ByteOrder>().ok()?);

        let header = ChannelHeader { channel, source, target, length, seqno };

        if bytes.len() >= header.required_bytes() {
            Some(header)
        } else {
            None
        }
    }

    /// Writes the header as binary data.
    #[inline]
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buffer = [0u8; Self::HEADER_BYTES];
        let mut cursor = io::Cursor::new(&mut buffer[..]);
        // Order must match reading order.
        cursor.write_u64::<ByteOrder>(self.channel as u64)?;
        cursor.write_u64::<ByteOrder>(self.length as u64)?;
        cursor.write_u64::<ByteOrder>(self.seqno as u64)?;
        cursor.write_u128::<ByteOrder>(self.source.as_u128())?;
        cursor.write_u128::<ByteOrder>(self.target.as_u128())?;

        writer.write_all(&buffer[..])
    }

    /// The number of bytes required for the header and payload together.
    #[inline]
    pub fn required_bytes(&self) -> usize {
        Self::HEADER_BYTES + self.length
    }
}

/// Control metadata routed along a channel, distinct from bulk record data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum DataEvent {
    /// The sending side bound the gate and the channel is live.
    GateOpen {
        /// Gate index on the sending task.
        gate: usize,
    },
    /// No further data will be emitted on the gate; the terminal signal
    /// corresponding to the `ITERATION_END` marker.
    Exhausted {
        /// Gate index on the sending task.
        gate: usize,
    },
    /// The sending side tore the gate down.
    GateClosed {
        /// Gate index on the sending task.
        gate: usize,
    },
}

/// An item enqueued to a channel's outbound queue.
pub enum TransportEvent {
    /// One filled view with its framing header; the hot path.
    Data(ChannelHeader, View),
    /// A control event.
    Control(DataEvent),
}

#[cfg(test)]
mod tests {

    use crate::gate::TaskId;
    use super::ChannelHeader;

    #[test]
    fn header_roundtrip() {
        let header = ChannelHeader {
            channel: 3,
            source: TaskId::fresh(),
            target: TaskId::fresh(),
            length: 0,
            seqno: 17,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(ChannelHeader::try_read(&bytes), Some(header));
    }

    #[test]
    fn short_data_reads_nothing() {
        let header = ChannelHeader {
            channel: 0,
            source: TaskId::fresh(),
            target: TaskId::fresh(),
            length: 128,
            seqno: 0,
        };
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        // Header present but payload missing.
        assert_eq!(ChannelHeader::try_read(&bytes), None);
    }
}
