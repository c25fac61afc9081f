//! Export of credential entries to files in other formats.

use std::fmt;

use tracing::info;

use crate::codec::{self, PemEncodable};
use crate::error::{CertDeskError, Result};
use crate::store::{Credential, CredentialStore, StoreType};

/// Output formats of [`export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Concatenated `CERTIFICATE` blocks, never keys.
    Pem,
    /// The raw certificate of a single entry.
    Der,
    /// Certificates-only PKCS#7 bundle.
    Pkcs7,
    /// The raw PKCS#8 private key of a single key entry.
    Pkcs8,
    Keystore(StoreType),
}

impl ExportFormat {
    /// Maps a file extension or format name to an export format, ignoring case.
    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim().trim_start_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "pem" => Ok(ExportFormat::Pem),
            "cer" | "crt" | "der" => Ok(ExportFormat::Der),
            "pkcs8" => Ok(ExportFormat::Pkcs8),
            "p7b" | "p7c" | "pkcs7" => Ok(ExportFormat::Pkcs7),
            "p12" | "pfx" | "pkcs12" => Ok(ExportFormat::Keystore(StoreType::Pkcs12)),
            "jks" => Ok(ExportFormat::Keystore(StoreType::Jks)),
            _ => Err(CertDeskError::invalid_config(
                "format",
                format!("unknown export format `{name}`"),
            )),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ExportFormat::Pem => "pem",
            ExportFormat::Der => "der",
            ExportFormat::Pkcs7 => "pkcs7",
            ExportFormat::Pkcs8 => "pkcs8",
            ExportFormat::Keystore(StoreType::Jks) => "jks",
            ExportFormat::Keystore(StoreType::Pkcs12) => "pkcs12",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoding of a single exported private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExportFormat {
    /// `PRIVATE KEY` PEM block.
    Pem,
    /// Raw PKCS#8 DER.
    Der,
}

fn single<'a>(entries: &'a [Credential], format: ExportFormat) -> Result<&'a Credential> {
    match entries {
        [entry] => Ok(entry),
        _ => Err(CertDeskError::MultipleEntriesNotSupported {
            format: format.to_string(),
            count: entries.len(),
        }),
    }
}

/// Encodes `entries` as `format`.
///
/// Keystore formats hold a trusted-certificate entry for every entry without a
/// key and a key entry with its full chain otherwise. `store_password`
/// defaults to empty; `entry_password`, when given, must equal it.
pub fn export(
    entries: &[Credential],
    format: ExportFormat,
    store_password: Option<&str>,
    entry_password: Option<&str>,
) -> Result<Vec<u8>> {
    if entries.is_empty() {
        return Err(CertDeskError::invalid_config(
            "entries",
            "select at least one entry to export",
        ));
    }
    let store_password = store_password.unwrap_or_default();
    if entry_password.is_some_and(|p| p != store_password) {
        return Err(CertDeskError::invalid_config(
            "entryPassword",
            "key entries are protected with the store password",
        ));
    }

    let bytes = match format {
        ExportFormat::Pem => entries
            .iter()
            .map(|entry| entry.certificate().encode_to_pem())
            .collect::<Result<String>>()?
            .into_bytes(),
        ExportFormat::Der => single(entries, format)?.certificate().to_der()?,
        ExportFormat::Pkcs7 => {
            let certificates: Vec<_> = entries.iter().map(|e| e.certificate().clone()).collect();
            codec::encode_pkcs7(&certificates)?
        }
        ExportFormat::Pkcs8 => {
            let entry = single(entries, format)?;
            entry
                .private_key()
                .ok_or_else(|| CertDeskError::NoPrivateKey(entry.alias().to_string()))?
                .to_pkcs8_der()?
        }
        ExportFormat::Keystore(store_type) => {
            let mut store = CredentialStore::new(store_type);
            store.set_password(store_password);
            for entry in entries {
                store.insert(entry.clone(), false)?;
            }
            store.to_bytes()?
        }
    };

    info!(format = %format, entries = entries.len(), bytes = bytes.len(), "Exported credentials");
    Ok(bytes)
}

/// Exports the private key of a key entry.
pub fn export_private_key(credential: &Credential, format: KeyExportFormat) -> Result<Vec<u8>> {
    let key = credential
        .private_key()
        .ok_or_else(|| CertDeskError::NoPrivateKey(credential.alias().to_string()))?;
    match format {
        KeyExportFormat::Pem => Ok(key.to_pkcs8_pem()?.into_bytes()),
        KeyExportFormat::Der => key.to_pkcs8_der(),
    }
}
