use md4::{digest::generic_array::GenericArray, digest::OutputSizeUser, Digest as Md4Digest, Md4};

/// UTF-16LE encodes a password.
#[inline]
fn utf16_le(password: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(password.len() * 2);

    for unit in password.encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }

    buf
}

/// Hashes a password using NTLM.
#[inline]
pub fn ntlm(password: &str) -> GenericArray<u8, <Md4 as OutputSizeUser>::OutputSize> {
    Md4::digest(utf16_le(password))
}

#[cfg(test)]
mod tests {
    use super::ntlm;

    #[test]
    fn test_ntlm() {
        let expected = [
            0x88u8, 0x46, 0xF7, 0xEA, 0xEE, 0x8F, 0xB1, 0x17, 0xAD, 0x06, 0xBD, 0xD8, 0x30, 0xB7,
            0x58, 0x6C,
        ];
        let actual = ntlm("password");
        assert_eq!(expected, actual.as_slice());
    }
}
