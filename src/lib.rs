//! # CertDesk - Private CA and Keystore Toolkit
//!
//! CertDesk builds a private certificate authority, issues leaf certificates
//! signed by it, and moves certificates and keys between the common credential
//! formats. It is built entirely with rustcrypto libraries.
//!
//! ## Supported Key Types
//!
//! - **RSA**: any modulus size (2048 bits typical)
//! - **ECDSA**: P-256 and P-384 curves
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! ## Supported Formats
//!
//! - **PEM** / **DER** certificates and PKCS#8 private keys
//! - legacy `RSA PRIVATE KEY` and `EC PRIVATE KEY` PEM (read only)
//! - **PKCS#7** certificate bundles
//! - **JKS** and **PKCS#12** keystores, with trusted-certificate and key entries
//!
//! ## Quick Start
//!
//! ### Generating a CA and a Server Certificate
//!
//! ```rust,no_run
//! use certdesk::config::SelfSignConfig;
//! use certdesk::issuer::generate_self_signed_pair;
//!
//! # fn main() -> Result<(), certdesk::error::CertDeskError> {
//! let config = SelfSignConfig::from_yaml(
//!     r#"
//! algorithm: EC
//! ca:
//!   dn: CN=Example Root CA,O=Example Corp,C=US
//!   validityYear: 10
//!   initializeSize: 384
//! certificate:
//!   dn: CN=example.com,O=Example Corp,C=US
//!   validityYear: 1
//!   initializeSize: 256
//!   hosts: [example.com, 10.0.0.5]
//! "#,
//! )?;
//!
//! let pair = generate_self_signed_pair(&config)?;
//! println!("{}", pair.ca.cert.to_pem()?);
//! println!("{}", pair.certificate.cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing From Your Own Requests
//!
//! ```rust,no_run
//! use certdesk::{
//!     cert::{Certificate, CertificateWithPrivateKey, SignatureAlgorithm},
//!     cert::params::{CertificationRequestInfo, DistinguishedName, Validity},
//!     issuer::Issuer,
//!     key::{KeyPair, PublicKey},
//! };
//!
//! # fn main() -> Result<(), certdesk::error::CertDeskError> {
//! let ca_key = KeyPair::generate_ecdsa_p256();
//! let ca_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::parse("CN=Example CA")?)
//!     .subject_public_key(PublicKey::from_key_pair(&ca_key))
//!     .is_ca(true)
//!     .build();
//! let ca_cert = Certificate::new_self_signed(
//!     &ca_info,
//!     &ca_key,
//!     Validity::for_years(5)?,
//!     SignatureAlgorithm::Sha256WithEcdsa,
//! )?;
//! let ca = CertificateWithPrivateKey { cert: ca_cert, key: ca_key };
//!
//! let server_key = KeyPair::generate_ed25519();
//! let server_info = CertificationRequestInfo::builder()
//!     .subject(DistinguishedName::parse("CN=server.example.com")?)
//!     .subject_public_key(PublicKey::from_key_pair(&server_key))
//!     .hosts(vec!["server.example.com".to_string()])
//!     .build();
//! let server_cert = ca.issue(
//!     &server_info,
//!     Validity::for_days(90)?,
//!     SignatureAlgorithm::Sha256WithEcdsa,
//! )?;
//! server_cert.verify_signed_by(&ca.cert.public_key()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Converting Between Formats
//!
//! ```rust,no_run
//! use certdesk::convert::{ExportFormat, export};
//! use certdesk::store::{CredentialStore, StoreType};
//!
//! # fn main() -> Result<(), certdesk::error::CertDeskError> {
//! let bytes = std::fs::read("keystore.jks").unwrap_or_default();
//! let store = CredentialStore::load_from_bytes(&bytes, StoreType::Jks, "changeit")?;
//! let entries: Vec<_> = store.credentials().cloned().collect();
//! let p12 = export(&entries, ExportFormat::from_name("p12")?, Some("changeit"), None)?;
//! let pem = export(&entries, ExportFormat::Pem, None, None)?;
//! # let _ = (p12, pem);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::CertDeskError`], one variant per failure kind:
//!
//! ```rust
//! use certdesk::{codec::decode_private_key, error::CertDeskError};
//!
//! match decode_private_key(b"invalid pem data") {
//!     Ok(_) => println!("Key imported successfully"),
//!     Err(CertDeskError::KeyDecode(msg)) => println!("Failed to decode key: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: Key generation and PKCS#8 encoding
//! - [`pki`]: Signing and signature verification
//! - [`codec`]: PEM, DER, PKCS#7 and legacy key decoding and encoding
//! - [`cert`]: Certificate parsing, metadata and extensions
//! - [`issuer`]: CA generation and certificate issuance
//! - [`config`]: YAML configuration of the CA and certificate
//! - [`store`]: Keystore entries, JKS and PKCS#12 files
//! - [`convert`]: Export of entries to other formats
//! - [`bundle`]: Ready-to-deploy CA, truststore and server keystores or PEM files
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure assembly

pub mod bundle;
pub mod cert;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod issuer;
pub mod key;
pub mod pki;
pub mod store;
pub mod tbs_certificate;
