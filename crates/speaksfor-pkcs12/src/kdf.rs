#![forbid(unsafe_code)]

//! Key derivation and decryption for PKCS#12.
//!
//! Three paths:
//! 1. PKCS#12 KDF (RFC 7292 Appendix B) for MAC key derivation and legacy PBE
//! 2. Legacy PBE: pbeWithSHAAnd3-KeyTripleDES-CBC using the PKCS#12 KDF
//! 3. PBES2: PBKDF2 + AES-256-CBC (modern OpenSSL 3.x default)

use cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use hmac::Hmac;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use speaksfor_core::Error;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Des3CbcDec = cbc::Decryptor<des::TdesEde3>;

/// PKCS#12 KDF ID values (RFC 7292 Appendix B.3).
pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// PKCS#12 KDF with SHA-1 (u=20, v=64).
pub fn pkcs12_kdf_sha1(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    pkcs12_kdf::<Sha1>(id, password, salt, iterations, output_len, 20, 64)
}

/// PKCS#12 KDF with SHA-256 (u=32, v=64).
pub fn pkcs12_kdf_sha256(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    pkcs12_kdf::<Sha256>(id, password, salt, iterations, output_len, 32, 64)
}

/// The RFC 7292 Appendix B.2 derivation. `id` selects key/IV/MAC material,
/// `password` is the BMP-encoded password, `u` the hash output size and `v`
/// the hash block size.
fn pkcs12_kdf<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
    u: usize,
    v: usize,
) -> Vec<u8>
where
    D: Digest + sha2::digest::FixedOutputReset,
{
    // D = id repeated v times; S and P are salt/password tiled to a
    // multiple of v; I = S || P.
    let d_block = vec![id; v];
    let s = tile_to_multiple(salt, v);
    let p = tile_to_multiple(password, v);
    let mut i_block = Vec::with_capacity(s.len() + p.len());
    i_block.extend_from_slice(&s);
    i_block.extend_from_slice(&p);

    let num_blocks = output_len.div_ceil(u);
    let mut result = Vec::with_capacity(num_blocks * u);

    for block_idx in 0..num_blocks {
        // A = H^iterations(D || I)
        let mut hasher = D::new();
        Digest::update(&mut hasher, &d_block);
        Digest::update(&mut hasher, &i_block);
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        result.extend_from_slice(&a);

        if block_idx + 1 < num_blocks {
            // I_j = (I_j + B + 1) mod 2^(v*8), with B = A tiled to v bytes.
            let b = tile_to_multiple(&a, v);
            for j in 0..(i_block.len() / v) {
                add_one_plus_b(&mut i_block[j * v..(j + 1) * v], &b);
            }
        }
    }

    result.truncate(output_len);
    result
}

/// Tile `data` by repetition to the next multiple of `v` bytes.
fn tile_to_multiple(data: &[u8], v: usize) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(v) * v;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let take = (len - out.len()).min(data.len());
        out.extend_from_slice(&data[..take]);
    }
    out
}

/// In-place (block + b + 1) mod 2^(v*8); `b` has the same length as `block`.
fn add_one_plus_b(block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for k in (0..block.len()).rev() {
        let sum = block[k] as u16 + b[k] as u16 + carry;
        block[k] = sum as u8;
        carry = sum >> 8;
    }
}

/// Encode a password as BMP (UTF-16BE) with two trailing zero bytes.
pub fn password_to_bmp(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let mut bmp = Vec::with_capacity(password.len() * 2 + 2);
    for c in password.encode_utf16() {
        bmp.push((c >> 8) as u8);
        bmp.push(c as u8);
    }
    bmp.push(0);
    bmp.push(0);
    bmp
}

/// Decrypt pbeWithSHAAnd3-KeyTripleDES-CBC ciphertext.
pub fn decrypt_pbe_sha1_3des(
    ciphertext: &[u8],
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let key = pkcs12_kdf_sha1(ID_KEY, bmp_password, salt, iterations, 24);
    let iv = pkcs12_kdf_sha1(ID_IV, bmp_password, salt, iterations, 8);

    let decryptor = Des3CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| Error::KeyDecryption(format!("3DES-CBC init failed: {e}")))?;

    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::KeyDecryption("PKCS#12 decryption failed (wrong password?)".into()))?;
    Ok(plaintext.to_vec())
}

/// Decrypt PBES2 ciphertext: PBKDF2 (SHA-1 or SHA-256 PRF) + AES-256-CBC.
pub fn decrypt_pbes2_aes256cbc(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
    iv: &[u8],
    prf_sha256: bool,
) -> Result<Vec<u8>, Error> {
    let mut key = [0u8; 32];
    if prf_sha256 {
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    } else {
        pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key);
    }

    let decryptor = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|e| Error::KeyDecryption(format!("AES-256-CBC init failed: {e}")))?;

    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::KeyDecryption("PKCS#12 decryption failed (wrong password?)".into()))?;
    Ok(plaintext.to_vec())
}

/// HMAC-SHA1 for MAC verification.
pub fn compute_hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    use hmac::Mac;
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// HMAC-SHA256 for MAC verification.
pub fn compute_hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    use hmac::Mac;
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kdf_is_deterministic_and_id_dependent() {
        let password = password_to_bmp("test");
        let salt = b"saltsalt";
        let key = pkcs12_kdf_sha1(ID_KEY, &password, salt, 2048, 24);
        assert_eq!(key.len(), 24);
        assert_eq!(key, pkcs12_kdf_sha1(ID_KEY, &password, salt, 2048, 24));

        let iv = pkcs12_kdf_sha1(ID_IV, &password, salt, 2048, 8);
        assert_eq!(iv.len(), 8);
        assert_ne!(&key[..8], &iv[..]);
    }

    #[test]
    fn kdf_sha256_output_length() {
        let password = password_to_bmp("test");
        let key = pkcs12_kdf_sha256(ID_KEY, &password, b"saltsalt", 2048, 32);
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn bmp_password_encoding() {
        assert!(password_to_bmp("").is_empty());
        assert_eq!(password_to_bmp("A"), vec![0x00, 0x41, 0x00, 0x00]);
        assert_eq!(
            password_to_bmp("ab"),
            vec![0x00, 0x61, 0x00, 0x62, 0x00, 0x00]
        );
    }
}
