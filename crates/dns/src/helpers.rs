/// Extracts the transaction ID from a DNS message.
pub fn extract_transaction_id(data: &[u8]) -> Option<u16> {
    if data.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([data[0], data[1]]))
}

/// Checks the QR bit to see whether `data` looks like a response rather than a query.
pub fn is_response(data: &[u8]) -> Option<bool> {
    if data.len() < 3 {
        return None;
    }
    Some((data[2] & 0x80) != 0)
}

/// Checks the TC (truncated) bit of a raw DNS message without fully decoding it.
pub fn is_truncated(data: &[u8]) -> Option<bool> {
    if data.len() < 3 {
        return None;
    }
    Some((data[2] & 0x02) != 0)
}
