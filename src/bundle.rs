//! Keystore and PEM files for deploying a generated CA and server certificate.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use tracing::info;

use crate::cert::CertificateWithPrivateKey;
use crate::codec::PemEncodable;
use crate::error::{CertDeskError, Result};
use crate::store::{Credential, StoreType, encode_entries};

/// One generated keystore file and the password protecting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    pub file_name: String,
    pub password: String,
    pub bytes: Vec<u8>,
}

/// One generated PEM file. Key files hold unencrypted PKCS#8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemFile {
    pub file_name: String,
    pub contents: String,
}

/// Eight URL-safe characters drawn from 48 random bits.
pub fn generate_short_password() -> String {
    let random: [u8; 6] = rand::random();
    URL_SAFE_NO_PAD.encode(random)
}

/// Builds the keystores handed out after generating a CA and a server certificate.
///
/// With a CA: `ca.{ext}` holds key entry `ca`, and `ca-truststore.{ext}` holds
/// the trusted certificate `ca`; both use the same password. With a server
/// certificate: `server.{ext}` holds key entry `server` with chain
/// `[server, ca]` (or `[server]` without a CA) under its own password.
pub fn build_keystore_bundle(
    ca: Option<&CertificateWithPrivateKey>,
    server: Option<&CertificateWithPrivateKey>,
    store_type: StoreType,
) -> Result<Vec<BundleFile>> {
    if ca.is_none() && server.is_none() {
        return Err(CertDeskError::invalid_config(
            "entries",
            "a CA or a server certificate is required",
        ));
    }
    let extension = store_type.extension();
    let mut files = Vec::new();

    if let Some(ca) = ca {
        let password = generate_short_password();
        let key_entry = Credential::key_entry("ca", ca.key.clone(), vec![ca.cert.clone()])?;
        let trusted = Credential::trusted_certificate("ca", ca.cert.clone());
        files.push(BundleFile {
            file_name: format!("ca.{extension}"),
            bytes: encode_entries(store_type, [&key_entry], &password)?,
            password: password.clone(),
        });
        files.push(BundleFile {
            file_name: format!("ca-truststore.{extension}"),
            bytes: encode_entries(store_type, [&trusted], &password)?,
            password,
        });
    }

    if let Some(server) = server {
        let password = generate_short_password();
        let chain = std::iter::once(server.cert.clone())
            .chain(ca.map(|ca| ca.cert.clone()))
            .collect();
        let key_entry = Credential::key_entry("server", server.key.clone(), chain)?;
        files.push(BundleFile {
            file_name: format!("server.{extension}"),
            bytes: encode_entries(store_type, [&key_entry], &password)?,
            password,
        });
    }

    info!(
        store_type = %store_type,
        files = ?files.iter().map(|f| f.file_name.as_str()).collect::<Vec<_>>(),
        "Built keystore bundle"
    );
    Ok(files)
}

/// Builds the PEM files handed out after generating a CA and a server certificate.
///
/// With a CA: `ca.pem` and `ca-key.pem`. With a server certificate: `server.pem`
/// and `server-key.pem`, plus `fullchain.pem` (server then CA) when the CA is
/// present too.
pub fn build_pem_bundle(
    ca: Option<&CertificateWithPrivateKey>,
    server: Option<&CertificateWithPrivateKey>,
) -> Result<Vec<PemFile>> {
    if ca.is_none() && server.is_none() {
        return Err(CertDeskError::invalid_config(
            "entries",
            "a CA or a server certificate is required",
        ));
    }
    let file = |file_name: &str, contents: String| PemFile {
        file_name: file_name.to_string(),
        contents,
    };
    let mut files = Vec::new();

    let ca_pem = match ca {
        Some(ca) => {
            let ca_pem = ca.cert.encode_to_pem()?;
            files.push(file("ca.pem", ca_pem.clone()));
            files.push(file("ca-key.pem", ca.key.to_pkcs8_pem()?));
            Some(ca_pem)
        }
        None => None,
    };

    if let Some(server) = server {
        let server_pem = server.cert.encode_to_pem()?;
        files.push(file("server.pem", server_pem.clone()));
        files.push(file("server-key.pem", server.key.to_pkcs8_pem()?));
        if let Some(ca_pem) = &ca_pem {
            files.push(file("fullchain.pem", format!("{server_pem}{ca_pem}")));
        }
    }

    info!(
        files = ?files.iter().map(|f| f.file_name.as_str()).collect::<Vec<_>>(),
        "Built PEM bundle"
    );
    Ok(files)
}
