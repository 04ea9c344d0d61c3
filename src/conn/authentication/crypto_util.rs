use hmac::{Hmac, Mac};
use md5::Md5;
use pbkdf2::pbkdf2;
use sha1::{Digest, Sha1};

pub(crate) const SHA1_OUTPUT_LEN: usize = 20;

pub(crate) fn md5_hex(data: &[u8]) -> String {
    let mut md5 = Md5::new();
    md5.update(data);
    hex::encode(md5.finalize())
}

pub(crate) fn sha1(data: &[u8]) -> Vec<u8> {
    let mut sha = Sha1::new();
    sha.update(data);
    sha.finalize().to_vec()
}

// HMAC-SHA1 accepts keys of any length, so this never fails.
pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC-SHA1 accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub(crate) fn pbkdf2_hmac_sha1(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut output = [0_u8; SHA1_OUTPUT_LEN];
    pbkdf2::<Hmac<Sha1>>(password, salt, iterations, &mut output)
        .expect("20-byte output is valid for PBKDF2-HMAC-SHA1");
    output.to_vec()
}

pub(crate) fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    assert_eq!(a.len(), b.len(), "xor needs two equally long parameters");
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_hex_matches_known_vector() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn xor_is_involutive() {
        let a = vec![0x0f, 0xf0, 0x55];
        let b = vec![0xaa, 0x0a, 0x11];
        let x = xor(&a, &b);
        assert_eq!(xor(&x, &b), a);
    }
}
