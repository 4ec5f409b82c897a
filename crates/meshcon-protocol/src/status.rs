//! Status bodies carried by `sta` lines.
//!
//! Node-scoped statuses share a common prefix of packet metadata:
//! `<op> <addr> <ttl> <rssi> <payload>`. Gateway-scoped statuses (`log`,
//! `address_book_capacity`) carry their own fields.

use std::collections::BTreeSet;
use std::str::SplitWhitespace;

use crate::address::NodeAddress;
use crate::error::{ProtocolError, ProtocolResult};

/// Fault code reported when a low-power node has lost its friend.
pub const FAULT_FRIENDLESS: u8 = 0x01;

/// Metadata of the mesh packet that carried a status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketMeta {
    /// Remaining hop budget on reception.
    pub ttl: u8,
    /// Received signal strength in dB.
    pub rssi: f64,
}

/// Decoded status body.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    /// Periodic health report with the current fault set.
    Health {
        address: NodeAddress,
        meta: PacketMeta,
        faults: BTreeSet<u8>,
    },

    /// Battery level as a raw ADC reading.
    Battery {
        address: NodeAddress,
        meta: PacketMeta,
        raw_adc: f64,
    },

    /// Generic on/off server state.
    OnOff {
        address: NodeAddress,
        meta: PacketMeta,
        on: bool,
    },

    /// Diagnostic log line from the gateway firmware.
    Log { text: String },

    /// Address book occupancy of the gateway.
    AddressBookCapacity { free: u32, total: u32 },
}

impl StatusMessage {
    /// Parse a status body (the text after `sta `).
    pub fn parse(body: &str) -> ProtocolResult<StatusMessage> {
        let body = body.trim();
        let (op, rest) = body.split_once(' ').unwrap_or((body, ""));

        match op {
            "" => Err(ProtocolError::Empty),
            "health" => {
                let mut fields = NodeFields::new("health", rest);
                let (address, meta) = fields.header()?;
                let faults = parse_faults(fields.next("faults")?)?;
                fields.finish()?;
                Ok(StatusMessage::Health { address, meta, faults })
            }
            "battery" => {
                let mut fields = NodeFields::new("battery", rest);
                let (address, meta) = fields.header()?;
                let raw_adc = fields.finite_number("raw_adc")?;
                fields.finish()?;
                Ok(StatusMessage::Battery { address, meta, raw_adc })
            }
            "onoff" => {
                let mut fields = NodeFields::new("onoff", rest);
                let (address, meta) = fields.header()?;
                let on = fields.number::<i64>("onoff")? != 0;
                fields.finish()?;
                Ok(StatusMessage::OnOff { address, meta, on })
            }
            "log" => Ok(StatusMessage::Log {
                text: rest.trim_start().to_string(),
            }),
            "address_book_capacity" => {
                let mut fields = NodeFields::new("address_book_capacity", rest);
                let free = fields.number::<u32>("free")?;
                let total = fields.number::<u32>("total")?;
                fields.finish()?;
                Ok(StatusMessage::AddressBookCapacity { free, total })
            }
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }

    /// Status op name as it appears on the wire.
    pub fn op(&self) -> &'static str {
        match self {
            StatusMessage::Health { .. } => "health",
            StatusMessage::Battery { .. } => "battery",
            StatusMessage::OnOff { .. } => "onoff",
            StatusMessage::Log { .. } => "log",
            StatusMessage::AddressBookCapacity { .. } => "address_book_capacity",
        }
    }

    /// Address of the node this status is about, if node-scoped.
    pub fn address(&self) -> Option<NodeAddress> {
        match self {
            StatusMessage::Health { address, .. }
            | StatusMessage::Battery { address, .. }
            | StatusMessage::OnOff { address, .. } => Some(*address),
            StatusMessage::Log { .. } | StatusMessage::AddressBookCapacity { .. } => None,
        }
    }
}

/// Parse the bracketed fault bitmap of a health report.
///
/// The text is a run of hex byte pairs, e.g. `[0100]`. Zero bytes are
/// padding; every non-zero byte is a fault code.
pub fn parse_faults(token: &str) -> ProtocolResult<BTreeSet<u8>> {
    let invalid = || ProtocolError::InvalidField {
        op: "health",
        field: "faults",
        value: token.to_string(),
    };

    let digits = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(token);
    if digits.len() % 2 != 0 || !digits.is_ascii() {
        return Err(invalid());
    }

    let mut faults = BTreeSet::new();
    for pair in digits.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(pair).map_err(|_| invalid())?;
        let code = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        if code != 0 {
            faults.insert(code);
        }
    }
    Ok(faults)
}

/// Cursor over the whitespace-separated fields of one status body.
struct NodeFields<'a> {
    op: &'static str,
    tokens: SplitWhitespace<'a>,
}

impl<'a> NodeFields<'a> {
    fn new(op: &'static str, rest: &'a str) -> Self {
        NodeFields {
            op,
            tokens: rest.split_whitespace(),
        }
    }

    fn next(&mut self, field: &'static str) -> ProtocolResult<&'a str> {
        self.tokens
            .next()
            .ok_or(ProtocolError::MissingField { op: self.op, field })
    }

    fn number<T: std::str::FromStr>(&mut self, field: &'static str) -> ProtocolResult<T> {
        let token = self.next(field)?;
        token.parse().map_err(|_| ProtocolError::InvalidField {
            op: self.op,
            field,
            value: token.to_string(),
        })
    }

    /// A float that must be a real value; `NaN` and `inf` are rejected.
    fn finite_number(&mut self, field: &'static str) -> ProtocolResult<f64> {
        let value = self.number::<f64>(field)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ProtocolError::InvalidField {
                op: self.op,
                field,
                value: value.to_string(),
            })
        }
    }

    fn header(&mut self) -> ProtocolResult<(NodeAddress, PacketMeta)> {
        let token = self.next("address")?;
        let address = NodeAddress::parse_hex(token).ok_or_else(|| ProtocolError::InvalidField {
            op: self.op,
            field: "address",
            value: token.to_string(),
        })?;
        let ttl = self.number::<u8>("ttl")?;
        let rssi = self.finite_number("rssi")?;
        Ok((address, PacketMeta { ttl, rssi }))
    }

    fn finish(mut self) -> ProtocolResult<()> {
        let rest: Vec<&str> = self.tokens.by_ref().collect();
        if rest.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingInput {
                op: self.op,
                rest: rest.join(" "),
            })
        }
    }
}
