pub mod extensions;
pub mod params;

use std::fmt;

use const_oid::ObjectIdentifier;
use der::{Decode, Encode, EncodePem};
use extensions::{BasicConstraints, ToAndFromX509Extension};
use params::{CertificationRequestInfo, DistinguishedName, Validity};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{CertDeskError, Result};
use crate::issuer::Issuer;
use crate::key::{KeyAlgorithm, KeyPair, PublicKey};

/// Represents the supported signature algorithms for certificates.
///
/// Names follow the JCA convention used in configuration files (`SHA256withRSA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha256WithRsa,
    Sha384WithRsa,
    Sha512WithRsa,
    Sha256WithEcdsa,
    Sha384WithEcdsa,
    Sha512WithEcdsa,
    Ed25519,
}

impl SignatureAlgorithm {
    const ALL: [SignatureAlgorithm; 7] = [
        SignatureAlgorithm::Sha256WithRsa,
        SignatureAlgorithm::Sha384WithRsa,
        SignatureAlgorithm::Sha512WithRsa,
        SignatureAlgorithm::Sha256WithEcdsa,
        SignatureAlgorithm::Sha384WithEcdsa,
        SignatureAlgorithm::Sha512WithEcdsa,
        SignatureAlgorithm::Ed25519,
    ];

    /// Parses a JCA signature algorithm name, ignoring case.
    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("EdDSA") {
            return Ok(SignatureAlgorithm::Ed25519);
        }
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                CertDeskError::UnsupportedAlgorithm(format!("unknown signature algorithm {name}"))
            })
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.oid() == oid)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256withRSA",
            SignatureAlgorithm::Sha384WithRsa => "SHA384withRSA",
            SignatureAlgorithm::Sha512WithRsa => "SHA512withRSA",
            SignatureAlgorithm::Sha256WithEcdsa => "SHA256withECDSA",
            SignatureAlgorithm::Sha384WithEcdsa => "SHA384withECDSA",
            SignatureAlgorithm::Sha512WithEcdsa => "SHA512withECDSA",
            SignatureAlgorithm::Ed25519 => "Ed25519",
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRsa => const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRsa => const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithEcdsa => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithEcdsa => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sha512WithEcdsa => const_oid::db::rfc5912::ECDSA_WITH_SHA_512,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }

    /// The key family able to produce this signature.
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        match self {
            SignatureAlgorithm::Sha256WithRsa
            | SignatureAlgorithm::Sha384WithRsa
            | SignatureAlgorithm::Sha512WithRsa => KeyAlgorithm::Rsa,
            SignatureAlgorithm::Sha256WithEcdsa
            | SignatureAlgorithm::Sha384WithEcdsa
            | SignatureAlgorithm::Sha512WithEcdsa => KeyAlgorithm::Ec,
            SignatureAlgorithm::Ed25519 => KeyAlgorithm::Ed25519,
        }
    }

    /// The algorithm used when a configuration leaves `signatureAlgorithm` empty.
    pub fn default_for(key: &KeyPair) -> Self {
        match key {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRsa,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithEcdsa,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithEcdsa,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// RSA identifiers carry an explicit NULL parameter (RFC 4055); ECDSA and
    /// Ed25519 identifiers carry none.
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value.key_algorithm() {
            KeyAlgorithm::Rsa => Some(der::Any::null()),
            KeyAlgorithm::Ec | KeyAlgorithm::Ed25519 => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats
/// and to read the metadata shown for keystore entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Parses a DER-encoded certificate.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        CertificateInner::from_der(der_bytes)
            .map(|inner| Certificate { inner })
            .map_err(|e| CertDeskError::CertificateDecode(e.to_string()))
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CertDeskError::Encoding(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CertDeskError::Encoding(e.to_string()))
    }

    pub fn subject(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    /// Serial number as upper-case hex without leading zeros.
    pub fn serial_number_hex(&self) -> String {
        let bytes = self.inner.tbs_certificate.serial_number.as_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        match hex::encode_upper(&bytes[first..]) {
            s if s.is_empty() => "0".to_string(),
            s => s.trim_start_matches('0').to_string(),
        }
    }

    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(self.inner.signature_algorithm.oid)
    }

    /// JCA name of the signature algorithm, or its dotted OID when unknown.
    pub fn signature_algorithm_name(&self) -> String {
        self.signature_algorithm()
            .map(|alg| alg.name().to_string())
            .unwrap_or_else(|| self.inner.signature_algorithm.oid.to_string())
    }

    pub fn not_before(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_before.to_system_time())
    }

    pub fn not_after(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_after.to_system_time())
    }

    pub fn validity(&self) -> Validity {
        Validity {
            not_before: self.not_before(),
            not_after: self.not_after(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.not_after() < OffsetDateTime::now_utc()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Name of the subject key algorithm (`RSA`, `EC`, `Ed25519`), or its OID.
    pub fn public_key_algorithm_name(&self) -> String {
        match self.public_key() {
            Ok(key) => key.algorithm().to_string(),
            Err(_) => self
                .inner
                .tbs_certificate
                .subject_public_key_info
                .algorithm
                .oid
                .to_string(),
        }
    }

    /// Finds and decodes an extension by type.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension::<BasicConstraints>(),
            Ok(Some(BasicConstraints { is_ca: true, .. }))
        )
    }

    /// Checks the signature over the TBS certificate against `issuer_key`.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        let algorithm = self.signature_algorithm().ok_or_else(|| {
            CertDeskError::UnsupportedAlgorithm(self.inner.signature_algorithm.oid.to_string())
        })?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CertDeskError::CertificateDecode("signature has unused bits".to_string())
        })?;
        crate::pki::verify_signature(&tbs, signature, issuer_key, algorithm)
    }

    /// True when issuer equals subject and the certificate verifies with its own key.
    pub fn is_self_signed(&self) -> bool {
        self.inner.tbs_certificate.subject == self.inner.tbs_certificate.issuer
            && self
                .public_key()
                .and_then(|key| self.verify_signed_by(&key))
                .is_ok()
    }

    /// SHA-256 fingerprint of the DER encoding, colon-separated upper-case hex.
    pub fn fingerprint_sha256(&self) -> Result<String> {
        let digest = Sha256::digest(self.to_der()?);
        Ok(digest
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":"))
    }

    /// One-line summary: subject, issuer, validity and serial.
    pub fn summary(&self) -> String {
        format!(
            "Subject: {}, Issuer: {}, Valid: {} - {}, Serial: {}",
            self.subject(),
            self.issuer(),
            self.not_before().date(),
            self.not_after().date(),
            self.serial_number_hex()
        )
    }

    /// Multi-line detail view of the certificate.
    pub fn details(&self) -> String {
        CertificateDetails(self).to_string()
    }

    /// Creates a new self-signed certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `validity` - The validity window written into the certificate.
    /// * `signature_algorithm` - Must belong to the same family as `key`.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.clone(),
            key,
        };
        self_issuer.issue(cert_info, validity, signature_algorithm)
    }
}

struct CertificateDetails<'a>(&'a Certificate);

impl fmt::Display for CertificateDetails<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cert = self.0;
        let version = cert.inner.tbs_certificate.version as u8 + 1;
        writeln!(f, "Version: V{version}")?;
        writeln!(f, "Serial Number: {}", cert.serial_number_hex())?;
        writeln!(
            f,
            "Signature Algorithm: {} ({})",
            cert.signature_algorithm_name(),
            cert.inner.signature_algorithm.oid
        )?;
        writeln!(f, "Issuer: {}", cert.issuer())?;
        writeln!(f, "Subject: {}", cert.subject())?;
        writeln!(f, "Not Before: {}", cert.not_before())?;
        writeln!(f, "Not After: {}", cert.not_after())?;
        writeln!(f, "Public Key Algorithm: {}", cert.public_key_algorithm_name())?;
        if let Ok(Some(san)) = cert.extension::<extensions::SubjectAltName>() {
            let names = san
                .names
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "Subject Alternative Names: {names}")?;
        }
        if let Ok(fingerprint) = cert.fingerprint_sha256() {
            writeln!(f, "SHA-256 Fingerprint: {fingerprint}")?;
        }
        Ok(())
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: DistinguishedName,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> DistinguishedName {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn authority_key_identifier(&self) -> Result<Option<extensions::AuthorityKeyIdentifier>> {
        Ok(None)
    }
}

/// A certificate together with the private key matching its public key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> DistinguishedName {
        // The name of the issuer is the subject of the certificate
        self.cert.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn authority_key_identifier(&self) -> Result<Option<extensions::AuthorityKeyIdentifier>> {
        crate::issuer::authority_key_identifier_for(&self.cert).map(Some)
    }
}
