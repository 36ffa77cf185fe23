//! ICMP / ICMPv6 echo packet encoding.
//!
//! The identifier field cannot carry the tracking token: unprivileged
//! datagram sockets on Linux overwrite it with the socket's local port. The
//! token therefore travels in the payload, behind a fixed marker.

/// Marker at the start of every payload we send.
const MAGIC: [u8; 4] = *b"mpng";

const HEADER_LEN: usize = 8;
const PAYLOAD_LEN: usize = 32;

const ECHO_REQUEST_V4: u8 = 8;
const ECHO_REPLY_V4: u8 = 0;
const ECHO_REQUEST_V6: u8 = 128;
const ECHO_REPLY_V6: u8 = 129;

/// Fields recovered from an echo reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Echo {
    pub seq: u16,
    pub token: u64,
}

/// Build an echo request.
///
/// The ICMPv6 checksum covers a pseudo-header only the kernel knows, so it
/// is left zero for the kernel to fill in.
pub fn encode_request(v6: bool, ident: u16, seq: u16, token: u64) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_LEN + PAYLOAD_LEN];
    buf[0] = if v6 { ECHO_REQUEST_V6 } else { ECHO_REQUEST_V4 };
    buf[4..6].copy_from_slice(&ident.to_be_bytes());
    buf[6..8].copy_from_slice(&seq.to_be_bytes());
    buf[8..12].copy_from_slice(&MAGIC);
    buf[12..20].copy_from_slice(&token.to_be_bytes());

    if !v6 {
        let sum = checksum(&buf);
        buf[2..4].copy_from_slice(&sum.to_be_bytes());
    }
    buf
}

/// Decode an echo reply carrying one of our payloads.
///
/// Raw IPv4 sockets hand over the IP header as well; `ip_header` strips it.
/// Anything else (other ICMP types, foreign echoes, truncated data) yields
/// `None`.
pub fn decode_reply(packet: &[u8], v6: bool, ip_header: bool) -> Option<Echo> {
    let icmp = if ip_header {
        let first = *packet.first()?;
        if first >> 4 != 4 {
            return None;
        }
        packet.get(usize::from(first & 0x0f) * 4..)?
    } else {
        packet
    };

    if icmp.len() < HEADER_LEN + 12 {
        return None;
    }
    let expected = if v6 { ECHO_REPLY_V6 } else { ECHO_REPLY_V4 };
    if icmp[0] != expected || icmp[1] != 0 || icmp[8..12] != MAGIC {
        return None;
    }

    Some(Echo {
        seq: u16::from_be_bytes([icmp[6], icmp[7]]),
        token: u64::from_be_bytes(icmp[12..20].try_into().ok()?),
    })
}

/// RFC 1071 internet checksum.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u32::from(u16::from_be_bytes([*hi, *lo])),
            [hi] => u32::from(*hi) << 8,
            _ => 0,
        })
        .sum();
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Turn one of our requests into the reply a peer would send back.
    fn as_reply(mut packet: Vec<u8>, v6: bool) -> Vec<u8> {
        packet[0] = if v6 { ECHO_REPLY_V6 } else { ECHO_REPLY_V4 };
        packet
    }

    #[test]
    fn v4_request_checksum_verifies() {
        let packet = encode_request(false, 0x1234, 7, 42);
        assert_eq!(packet[0], ECHO_REQUEST_V4);
        assert_eq!(checksum(&packet), 0);
    }

    #[test]
    fn reply_carries_sequence_and_token() {
        let reply = as_reply(encode_request(true, 9, 513, 0xdead_beef_0000_0001), true);
        let echo = decode_reply(&reply, true, false).unwrap();
        assert_eq!(
            echo,
            Echo {
                seq: 513,
                token: 0xdead_beef_0000_0001
            }
        );
    }

    #[test]
    fn raw_v4_header_is_stripped() {
        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip.extend(as_reply(encode_request(false, 1, 2, 3), false));
        assert_eq!(decode_reply(&ip, false, true).map(|e| e.seq), Some(2));
        // The same bytes without stripping are not an echo reply.
        assert_eq!(decode_reply(&ip, false, false), None);
    }

    #[test]
    fn requests_and_foreign_payloads_are_ignored() {
        let request = encode_request(false, 1, 2, 3);
        assert_eq!(decode_reply(&request, false, false), None);

        let mut foreign = as_reply(request, false);
        foreign[8..12].copy_from_slice(b"ping");
        assert_eq!(decode_reply(&foreign, false, false), None);

        assert_eq!(decode_reply(&[0u8; 10], false, false), None);
    }

    #[test]
    fn checksum_of_odd_length_input() {
        // 0x0102 + 0x0300 = 0x0402, complemented.
        assert_eq!(checksum(&[1, 2, 3]), !0x0402);
    }
}
