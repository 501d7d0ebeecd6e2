//! Pkt-line framing, per the git smart-HTTP protocol: a packet is a 4-hex-digit length
//! prefix (including itself) followed by the raw payload; `0000` is a flush packet.

/// Encodes `data` as a single pkt-line.
pub fn encode_pkt_line(data: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    out.extend(format!("{:04x}", data.len() + 4).into_bytes());
    out.extend(data.as_bytes());
    out
}

pub const FLUSH_PKT: &[u8] = b"0000";

/// The pkt-line preamble that opens an `info/refs` advertisement response, ahead of the
/// native `git <service> --advertise-refs` output.
pub fn service_advertisement(service: &str) -> Vec<u8> {
    let mut out = encode_pkt_line(&format!("# service={service}\n"));
    out.extend_from_slice(FLUSH_PKT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_length_including_prefix() {
        // "0006a\n" => 4-byte prefix + "a\n" (2 bytes) = 6
        assert_eq!(encode_pkt_line("a\n"), b"0006a\n");
    }

    #[test]
    fn service_advertisement_ends_with_flush() {
        let out = service_advertisement("git-upload-pack");
        assert!(out.ends_with(FLUSH_PKT));
        // "# service=git-upload-pack\n" is 26 bytes + 4-byte prefix = 30 = 0x1e
        assert_eq!(&out[..4], b"001e");
    }
}
