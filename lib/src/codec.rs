//! Fixed size base64 codec.
//!
//! Records leave the device as base64 text. Their byte length is fixed per
//! configuration, so the encoder computes its output size once and then only
//! ever writes into a caller owned, pre-sized buffer. Reading records back
//! goes through the `base64` crate.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';

/// Length of the base64 text for `input_len` bytes: `4 * ceil(n / 3)`.
pub const fn encoded_len(input_len: usize) -> usize {
    4 * input_len.div_ceil(3)
}

/// Base64 encoder for inputs of one fixed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base64Codec {
    input_len: usize,
    output_len: usize,
}

impl Base64Codec {
    pub const fn new(input_len: usize) -> Self {
        Self {
            input_len,
            output_len: encoded_len(input_len),
        }
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Encode the first `input_len` bytes of `input` into the first
    /// `output_len` bytes of `out`.
    ///
    /// # Panics
    /// If `input` or `out` is shorter than the configured lengths.
    pub fn encode(&self, input: &[u8], out: &mut [u8]) {
        let input = &input[..self.input_len];
        let out = &mut out[..self.output_len];
        out.fill(PAD);

        let groups = input.chunks_exact(3);
        let tail = groups.remainder();
        let mut hpos = 0;
        for group in groups {
            let n = (group[0] as u32) << 16 | (group[1] as u32) << 8 | group[2] as u32;
            out[hpos] = ALPHABET[(n >> 18) as usize];
            out[hpos + 1] = ALPHABET[(n >> 12 & 0x3F) as usize];
            out[hpos + 2] = ALPHABET[(n >> 6 & 0x3F) as usize];
            out[hpos + 3] = ALPHABET[(n & 0x3F) as usize];
            hpos += 4;
        }

        match *tail {
            [a, b] => {
                let n = (a as u32) << 8 | b as u32;
                out[hpos] = ALPHABET[(n >> 10 & 0x3F) as usize];
                out[hpos + 1] = ALPHABET[(n >> 4 & 0x3F) as usize];
                out[hpos + 2] = ALPHABET[(n << 2 & 0x3F) as usize];
            }
            [a] => {
                let n = a as u32;
                out[hpos] = ALPHABET[(n >> 2) as usize];
                out[hpos + 1] = ALPHABET[(n << 4 & 0x3F) as usize];
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    fn encode_to_string(input: &[u8]) -> String {
        let codec = Base64Codec::new(input.len());
        let mut out = vec![0u8; codec.output_len()];
        codec.encode(input, &mut out);
        String::from_utf8(out).expect("base64 output is ascii")
    }

    #[test]
    fn known_vectors() {
        assert_eq!(encode_to_string(b""), "");
        assert_eq!(encode_to_string(b"f"), "Zg==");
        assert_eq!(encode_to_string(b"fo"), "Zm8=");
        assert_eq!(encode_to_string(b"foo"), "Zm9v");
        assert_eq!(encode_to_string(b"foob"), "Zm9vYg==");
        assert_eq!(encode_to_string(b"fooba"), "Zm9vYmE=");
        assert_eq!(encode_to_string(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn marker_prefix() {
        // The record marker 65534 as little endian bytes.
        let text = encode_to_string(&65534u32.to_le_bytes());
        assert!(text.starts_with("/v8A"));
    }

    #[test]
    fn output_length_and_padding() {
        for n in 0..40usize {
            let input: Vec<u8> = (0..n).map(|i| (i * 37 + 11) as u8).collect();
            let text = encode_to_string(&input);
            assert_eq!(text.len(), 4 * n.div_ceil(3));

            let expected_pads = match n % 3 {
                0 => 0,
                1 => 2,
                _ => 1,
            };
            let pads = text.bytes().rev().take_while(|&c| c == b'=').count();
            assert_eq!(pads, expected_pads, "n = {n}");
            assert!(text
                .bytes()
                .take(text.len() - pads)
                .all(|c| ALPHABET.contains(&c)));
        }
    }

    #[test]
    fn matches_reference_engine() {
        for n in [1usize, 2, 3, 70, 384, 451, 612, 679] {
            let input: Vec<u8> = (0..n).map(|i| (i * 131 + 7) as u8).collect();
            let text = encode_to_string(&input);
            assert_eq!(text, STANDARD.encode(&input), "n = {n}");
            assert_eq!(STANDARD.decode(&text).unwrap(), input, "n = {n}");
        }
    }

    #[test]
    fn encode_only_touches_configured_prefix() {
        let codec = Base64Codec::new(4);
        let mut out = vec![b'#'; 10];
        codec.encode(&[1, 2, 3, 4, 5, 6], &mut out);
        assert_eq!(&out[..8], b"AQIDBA==");
        assert_eq!(&out[8..], b"##");
    }
}
