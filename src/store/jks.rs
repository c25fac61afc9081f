//! Java KeyStore (JKS, version 2) reading and writing.
//!
//! Layout: magic, version, entry count, then per entry a tag, alias, creation
//! time and either a protected private key plus chain or a single certificate.
//! A keyed SHA-1 digest over everything follows the entries.

use der::asn1::{Null, ObjectIdentifier, OctetStringRef};
use der::{Decode, Encode, Sequence};
use sha1::{Digest, Sha1};
use time::OffsetDateTime;
use tracing::debug;

use super::Credential;
use crate::cert::Certificate;
use crate::error::{CertDeskError, Result};
use crate::key::KeyPair;

const MAGIC: u32 = 0xFEED_FEED;
const JCEKS_MAGIC: u32 = 0xCECE_CECE;
const VERSION: u32 = 2;
const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const CERT_TYPE: &str = "X.509";
const WHITENER: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;

/// Sun's proprietary key protection algorithm.
const KEY_PROTECTOR_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.42.2.17.1.1");

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct ProtectorAlgorithm {
    algorithm: ObjectIdentifier,
    parameters: Null,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct ProtectedKeyInfo<'a> {
    algorithm: ProtectorAlgorithm,
    encrypted_data: OctetStringRef<'a>,
}

fn load_err(reason: impl Into<String>) -> CertDeskError {
    CertDeskError::StoreLoad(reason.into())
}

/// Serializes `credentials` as a JKS keystore.
///
/// The store password also protects every private key.
pub fn encode<'a>(
    credentials: impl IntoIterator<Item = &'a Credential>,
    password: &str,
) -> Result<Vec<u8>> {
    let credentials: Vec<&Credential> = credentials.into_iter().collect();
    let password = password_bytes(password);
    let timestamp = i64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
        .map_err(|e| CertDeskError::Encoding(e.to_string()))?;

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&len_u32(credentials.len())?.to_be_bytes());

    for credential in credentials {
        match credential.private_key() {
            Some(key) => {
                out.extend_from_slice(&TAG_PRIVATE_KEY.to_be_bytes());
                write_utf(&mut out, credential.alias())?;
                out.extend_from_slice(&timestamp.to_be_bytes());
                let protected = protect_key(&key.to_pkcs8_der()?, &password)?;
                write_bytes(&mut out, &protected)?;
                out.extend_from_slice(&len_u32(credential.chain().len())?.to_be_bytes());
                for cert in credential.chain() {
                    write_utf(&mut out, CERT_TYPE)?;
                    write_bytes(&mut out, &cert.to_der()?)?;
                }
            }
            None => {
                out.extend_from_slice(&TAG_TRUSTED_CERT.to_be_bytes());
                write_utf(&mut out, credential.alias())?;
                out.extend_from_slice(&timestamp.to_be_bytes());
                write_utf(&mut out, CERT_TYPE)?;
                write_bytes(&mut out, &credential.certificate().to_der()?)?;
            }
        }
    }

    let digest = integrity_digest(&password, &out);
    out.extend_from_slice(&digest);
    Ok(out)
}

/// Parses a JKS keystore, checking its integrity digest with `password`.
pub fn decode(bytes: &[u8], password: &str) -> Result<Vec<Credential>> {
    let mut header = Reader::new(bytes);
    match header.u32()? {
        MAGIC => {}
        JCEKS_MAGIC => return Err(load_err("JCEKS keystores are not supported")),
        other => return Err(load_err(format!("not a JKS keystore (magic {other:#010x})"))),
    }
    let version = header.u32()?;
    if version != VERSION {
        return Err(load_err(format!("unsupported JKS version {version}")));
    }

    let password = password_bytes(password);
    let body_len = bytes
        .len()
        .checked_sub(DIGEST_LEN)
        .ok_or_else(|| load_err("keystore is truncated"))?;
    let (body, stored_digest) = bytes.split_at(body_len);
    if integrity_digest(&password, body).as_slice() != stored_digest {
        return Err(load_err(
            "keystore was tampered with, or password was incorrect",
        ));
    }

    let entries = body
        .get(8..)
        .ok_or_else(|| load_err("keystore is truncated"))?;
    let mut reader = Reader::new(entries);
    let count = reader.u32()?;
    let mut credentials = Vec::new();
    for _ in 0..count {
        let tag = reader.u32()?;
        let alias = reader.utf()?;
        let _created = reader.i64()?;
        match tag {
            TAG_PRIVATE_KEY => {
                let protected = reader.bytes()?;
                let pkcs8 = recover_key(protected, &password)?;
                let key = KeyPair::from_pkcs8_der(&pkcs8)
                    .map_err(|e| load_err(format!("key entry {alias}: {e}")))?;
                let chain_len = reader.u32()?;
                let chain = (0..chain_len)
                    .map(|_| reader.certificate())
                    .collect::<Result<Vec<_>>>()?;
                let credential = Credential::key_entry(alias.as_str(), key, chain)
                    .map_err(|e| load_err(format!("key entry {alias}: {e}")))?;
                credentials.push(credential);
            }
            TAG_TRUSTED_CERT => {
                let cert = reader.certificate()?;
                credentials.push(Credential::trusted_certificate(alias, cert));
            }
            other => return Err(load_err(format!("unknown JKS entry tag {other}"))),
        }
    }
    debug!(entries = credentials.len(), "Decoded JKS keystore");
    Ok(credentials)
}

/// Passwords are digested as big-endian UTF-16 code units, like a Java `char[]`.
fn password_bytes(password: &str) -> Vec<u8> {
    password.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

fn integrity_digest(password: &[u8], data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(password);
    hasher.update(WHITENER);
    hasher.update(data);
    hasher.finalize().into()
}

/// XORs `input` with the SHA-1 chain seeded by `salt`.
fn keystream_xor(password: &[u8], salt: &[u8], input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    let mut block: Vec<u8> = salt.to_vec();
    for chunk in input.chunks(DIGEST_LEN) {
        let mut hasher = Sha1::new();
        hasher.update(password);
        hasher.update(&block);
        block = hasher.finalize().to_vec();
        output.extend(chunk.iter().zip(&block).map(|(b, k)| b ^ k));
    }
    output
}

fn key_check(password: &[u8], plaintext: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(password);
    hasher.update(plaintext);
    hasher.finalize().into()
}

/// salt || encrypted key || check digest, wrapped in an `EncryptedPrivateKeyInfo`.
fn protect_key(pkcs8: &[u8], password: &[u8]) -> Result<Vec<u8>> {
    let salt: [u8; DIGEST_LEN] = rand::random();
    let mut protected = Vec::with_capacity(pkcs8.len() + 2 * DIGEST_LEN);
    protected.extend_from_slice(&salt);
    protected.extend(keystream_xor(password, &salt, pkcs8));
    protected.extend_from_slice(&key_check(password, pkcs8));

    ProtectedKeyInfo {
        algorithm: ProtectorAlgorithm {
            algorithm: KEY_PROTECTOR_OID,
            parameters: Null,
        },
        encrypted_data: OctetStringRef::new(&protected)?,
    }
    .to_der()
    .map_err(|e| CertDeskError::Encoding(e.to_string()))
}

fn recover_key(encoded: &[u8], password: &[u8]) -> Result<Vec<u8>> {
    let info = ProtectedKeyInfo::from_der(encoded).map_err(|e| load_err(e.to_string()))?;
    if info.algorithm.algorithm != KEY_PROTECTOR_OID {
        return Err(load_err(format!(
            "unsupported key protection algorithm {}",
            info.algorithm.algorithm
        )));
    }
    let data = info.encrypted_data.as_bytes();
    if data.len() < 2 * DIGEST_LEN {
        return Err(load_err("protected key is truncated"));
    }
    let (salt, rest) = data.split_at(DIGEST_LEN);
    let (encrypted, check) = rest.split_at(rest.len() - DIGEST_LEN);
    let plaintext = keystream_xor(password, salt, encrypted);
    if key_check(password, &plaintext).as_slice() != check {
        return Err(load_err("cannot recover key, password was incorrect"));
    }
    Ok(plaintext)
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|e| CertDeskError::Encoding(e.to_string()))
}

fn write_bytes(out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    out.extend_from_slice(&len_u32(data.len())?.to_be_bytes());
    out.extend_from_slice(data);
    Ok(())
}

/// `DataOutput.writeUTF`: modified UTF-8 with a 16-bit length prefix.
fn write_utf(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let mut encoded = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => encoded.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                encoded.push(0xC0 | (unit >> 6) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                encoded.push(0xE0 | (unit >> 12) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    let len = u16::try_from(encoded.len())
        .map_err(|_| CertDeskError::Encoding(format!("alias too long: {value}")))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend(encoded);
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(load_err("keystore is truncated"));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// `DataInput.readUTF`.
    fn utf(&mut self) -> Result<String> {
        let len = u16::from_be_bytes(self.array()?) as usize;
        let raw = self.take(len)?;
        let malformed = || load_err("malformed modified UTF-8 string");
        let mut units = Vec::with_capacity(len);
        let mut i = 0;
        while i < raw.len() {
            let b0 = u16::from(raw[i]);
            let (unit, width) = match raw[i] >> 4 {
                0x0..=0x7 => (b0, 1),
                0xC | 0xD => {
                    let b1 = u16::from(*raw.get(i + 1).ok_or_else(malformed)?);
                    (((b0 & 0x1F) << 6) | (b1 & 0x3F), 2)
                }
                0xE => {
                    let b1 = u16::from(*raw.get(i + 1).ok_or_else(malformed)?);
                    let b2 = u16::from(*raw.get(i + 2).ok_or_else(malformed)?);
                    (((b0 & 0x0F) << 12) | ((b1 & 0x3F) << 6) | (b2 & 0x3F), 3)
                }
                _ => return Err(malformed()),
            };
            units.push(unit);
            i += width;
        }
        String::from_utf16(&units).map_err(|_| malformed())
    }

    fn certificate(&mut self) -> Result<Certificate> {
        let cert_type = self.utf()?;
        if cert_type != CERT_TYPE {
            return Err(load_err(format!("unsupported certificate type {cert_type}")));
        }
        Certificate::from_der(self.bytes()?).map_err(|e| load_err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_utf8_round_trip() {
        for alias in ["server", "nul\0char", "caf\u{e9}", "\u{1F512}lock", ""] {
            let mut out = Vec::new();
            write_utf(&mut out, alias).unwrap();
            assert_eq!(Reader::new(&out).utf().unwrap(), alias);
        }
        let mut out = Vec::new();
        write_utf(&mut out, "\0").unwrap();
        assert_eq!(out, vec![0x00, 0x02, 0xC0, 0x80]);
    }

    #[test]
    fn test_key_protection() {
        let password = password_bytes("changeit");
        let key = KeyPair::generate_ecdsa_p256().to_pkcs8_der().unwrap();
        let protected = protect_key(&key, &password).unwrap();
        assert_eq!(recover_key(&protected, &password).unwrap(), key);
        assert!(matches!(
            recover_key(&protected, &password_bytes("wrong")),
            Err(CertDeskError::StoreLoad(_))
        ));
    }

    #[test]
    fn test_empty_store_layout() {
        let bytes = encode(std::iter::empty::<&Credential>(), "").unwrap();
        assert_eq!(&bytes[..4], &[0xFE, 0xED, 0xFE, 0xED]);
        assert_eq!(bytes.len(), 12 + DIGEST_LEN);
        assert!(decode(&bytes, "").unwrap().is_empty());
        assert!(matches!(decode(&bytes, "x"), Err(CertDeskError::StoreLoad(_))));
    }

    #[test]
    fn test_rejects_foreign_magic() {
        let mut jceks = JCEKS_MAGIC.to_be_bytes().to_vec();
        jceks.extend_from_slice(&[0; 28]);
        assert!(matches!(decode(&jceks, ""), Err(CertDeskError::StoreLoad(_))));
        assert!(matches!(decode(&[0x30, 0x82], ""), Err(CertDeskError::StoreLoad(_))));
    }
}
