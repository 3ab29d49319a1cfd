//! WinZip AES-256 entry encryption (AE-2).
//!
//! Payload layout: 16-byte salt, 2-byte password verifier, AES-CTR
//! ciphertext of the (possibly compressed) data, 10-byte HMAC-SHA1 over the
//! ciphertext. The counter is a 128-bit little-endian block number starting
//! at 1.

use crate::Result;
use crate::ZipBuildError;
use crate::zip::format::AES_EXTRA_ID;
use aes::Aes256;
use ctr::cipher::KeyIvInit;
use ctr::cipher::StreamCipher;
use hmac::Hmac;
use hmac::Mac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::Sha1;
use std::io;
use std::io::Write;

type Aes256Ctr = ctr::Ctr128LE<Aes256>;
type HmacSha1 = Hmac<Sha1>;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const VERIFIER_LEN: usize = 2;
const AUTH_CODE_LEN: usize = 10;
const PBKDF2_ROUNDS: u32 = 1000;

/// AE-2: no CRC is stored, the authentication code covers integrity.
const VENDOR_VERSION_AE2: u16 = 2;
const STRENGTH_AES256: u8 = 3;

/// Bytes added to an entry's payload by encryption.
pub(crate) const AES_OVERHEAD: u64 = (SALT_LEN + VERIFIER_LEN + AUTH_CODE_LEN) as u64;

/// The `0x9901` extra field announcing AES and the real compression method.
pub(crate) fn aes_extra_field(method: u16) -> Vec<u8> {
    let mut extra = Vec::with_capacity(11);
    extra.extend_from_slice(&AES_EXTRA_ID.to_le_bytes());
    extra.extend_from_slice(&7u16.to_le_bytes());
    extra.extend_from_slice(&VENDOR_VERSION_AE2.to_le_bytes());
    extra.extend_from_slice(b"AE");
    extra.push(STRENGTH_AES256);
    extra.extend_from_slice(&method.to_le_bytes());
    extra
}

/// Encrypts everything written through it into `inner`.
///
/// The salt and verifier are written on construction; [`finish`] appends
/// the authentication code.
///
/// [`finish`]: AesEntryWriter::finish
pub(crate) struct AesEntryWriter<W: Write> {
    inner: W,
    cipher: Aes256Ctr,
    mac: HmacSha1,
    buffer: Vec<u8>,
}

impl<W: Write> AesEntryWriter<W> {
    /// Derives the keys for a fresh salt and writes the payload prefix.
    pub fn new(mut inner: W, password: &str, entry_name: &str) -> Result<Self> {
        let failure = |reason: String| ZipBuildError::EncryptionFailure {
            name: entry_name.to_string(),
            reason,
        };

        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| failure(format!("no random salt: {e}")))?;

        let mut derived = [0u8; 2 * KEY_LEN + VERIFIER_LEN];
        pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut derived);
        let (aes_key, rest) = derived.split_at(KEY_LEN);
        let (mac_key, verifier) = rest.split_at(KEY_LEN);

        let cipher = Aes256Ctr::new_from_slices(aes_key, &1u128.to_le_bytes())
            .map_err(|e| failure(e.to_string()))?;
        let mac = <HmacSha1 as Mac>::new_from_slice(mac_key).map_err(|e| failure(e.to_string()))?;

        inner.write_all(&salt)?;
        inner.write_all(verifier)?;

        Ok(Self {
            inner,
            cipher,
            mac,
            buffer: Vec::new(),
        })
    }

    /// Writes the authentication code and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        let code = self.mac.finalize().into_bytes();
        self.inner.write_all(&code[..AUTH_CODE_LEN])?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for AesEntryWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.clear();
        self.buffer.extend_from_slice(buf);
        self.cipher.apply_keystream(&mut self.buffer);
        self.mac.update(&self.buffer);
        self.inner.write_all(&self.buffer)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
