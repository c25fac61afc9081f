//! PKCS#12 keystores, read and written through `p12-keystore`.

use p12_keystore::{KeyStore, KeyStoreEntry, PrivateKeyChain};
use sha1::{Digest, Sha1};
use tracing::debug;

use super::Credential;
use crate::cert::Certificate;
use crate::error::{CertDeskError, Result};
use crate::key::KeyPair;

fn to_p12_certificate(cert: &Certificate) -> Result<p12_keystore::Certificate> {
    p12_keystore::Certificate::from_der(&cert.to_der()?)
        .map_err(|e| CertDeskError::Encoding(e.to_string()))
}

/// Serializes `credentials` as a PKCS#12 file protected by `password`.
///
/// Key entries use the SHA-1 of their leaf certificate as local key id.
pub fn encode<'a>(
    credentials: impl IntoIterator<Item = &'a Credential>,
    password: &str,
) -> Result<Vec<u8>> {
    let mut keystore = KeyStore::new();
    for credential in credentials {
        let entry = match credential.private_key() {
            Some(key) => {
                let chain = credential
                    .chain()
                    .iter()
                    .map(to_p12_certificate)
                    .collect::<Result<Vec<_>>>()?;
                let local_key_id = Sha1::digest(credential.certificate().to_der()?);
                KeyStoreEntry::PrivateKeyChain(PrivateKeyChain::new(
                    key.to_pkcs8_der()?,
                    local_key_id.to_vec(),
                    chain,
                ))
            }
            None => KeyStoreEntry::Certificate(to_p12_certificate(credential.certificate())?),
        };
        keystore.add_entry(credential.alias(), entry);
    }
    keystore
        .writer(password)
        .write()
        .map_err(|e| CertDeskError::Encoding(e.to_string()))
}

/// Parses a PKCS#12 file. MAC or decryption failures surface as `StoreLoad`.
pub fn decode(bytes: &[u8], password: &str) -> Result<Vec<Credential>> {
    let keystore = KeyStore::from_pkcs12(bytes, password)
        .map_err(|e| CertDeskError::StoreLoad(e.to_string()))?;

    let mut credentials = Vec::new();
    for (alias, entry) in keystore.entries() {
        let load_err = |e: CertDeskError| CertDeskError::StoreLoad(format!("entry {alias}: {e}"));
        match entry {
            KeyStoreEntry::PrivateKeyChain(key_chain) => {
                let key = KeyPair::from_pkcs8_der(key_chain.key()).map_err(load_err)?;
                let chain = key_chain
                    .chain()
                    .iter()
                    .map(|c| Certificate::from_der(c.as_der()))
                    .collect::<Result<Vec<_>>>()
                    .map_err(load_err)?;
                let credential =
                    Credential::key_entry(alias.as_str(), key, chain).map_err(load_err)?;
                credentials.push(credential);
            }
            KeyStoreEntry::Certificate(cert) => {
                let cert = Certificate::from_der(cert.as_der()).map_err(load_err)?;
                credentials.push(Credential::trusted_certificate(alias.as_str(), cert));
            }
            #[allow(unreachable_patterns)]
            _ => debug!(alias = %alias, "Skipping unsupported PKCS#12 entry"),
        }
    }
    debug!(entries = credentials.len(), "Decoded PKCS#12 keystore");
    Ok(credentials)
}
