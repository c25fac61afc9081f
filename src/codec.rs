//! Decoding and encoding of keys and certificates in PEM, DER, PKCS#7 and
//! legacy key-pair containers.

use cms::cert::CertificateChoices;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{CertificateSet, EncapsulatedContentInfo, SignedData, SignerInfos};
use der::asn1::SetOfVec;
use der::{Decode, Encode};
use p256::ecdsa::SigningKey as P256SigningKey;
use p384::ecdsa::SigningKey as P384SigningKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use crate::cert::Certificate;
use crate::error::{CertDeskError, Result};
use crate::key::{KeyPair, PublicKey};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
const PKCS7_LABELS: [&str; 2] = ["PKCS7", "CMS"];

/// Convert DER-encoded data into a PEM-encoded string with the provided label.
///
/// Lines end with `\n`.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Convert the first block of a PEM-encoded string to DER-encoded bytes.
pub fn pem_to_der(pem_str: &str) -> Result<Vec<u8>> {
    let pem = pem::parse(pem_str).map_err(|e| CertDeskError::Encoding(e.to_string()))?;
    Ok(pem.contents().to_vec())
}

/// True when `data` looks like PEM text (has both BEGIN and END markers).
pub fn is_pem_format(data: &[u8]) -> bool {
    std::str::from_utf8(data)
        .map(|text| text.contains("-----BEGIN") && text.contains("-----END"))
        .unwrap_or(false)
}

fn parse_pem_blocks(data: &[u8]) -> Option<Vec<pem::Pem>> {
    if !is_pem_format(data) {
        return None;
    }
    pem::parse_many(data).ok()
}

type KeyDecodeStrategy = fn(&[u8]) -> Result<KeyPair>;

/// Tried in order by [`decode_private_key`]; the first success wins.
const KEY_DECODE_STRATEGIES: [(&str, KeyDecodeStrategy); 3] = [
    ("pkcs8-pem", decode_pkcs8_pem),
    ("legacy-pem", decode_legacy_pem),
    ("pkcs8-der", decode_pkcs8_der),
];

/// Decodes a private key from PEM text or raw bytes.
///
/// Accepts a PKCS#8 `PRIVATE KEY` block, a legacy `RSA PRIVATE KEY` (PKCS#1) or
/// `EC PRIVATE KEY` (SEC1) block, or raw PKCS#8 DER. Failures of individual
/// strategies are logged at debug level; only exhaustion of all of them is an error.
pub fn decode_private_key(data: &[u8]) -> Result<KeyPair> {
    let mut failures = Vec::with_capacity(KEY_DECODE_STRATEGIES.len());
    for (name, strategy) in KEY_DECODE_STRATEGIES {
        match strategy(data) {
            Ok(key) => {
                debug!(strategy = name, algorithm = %key.algorithm(), "Decoded private key");
                return Ok(key);
            }
            Err(e) => {
                debug!(strategy = name, error = %e, "Private key decode strategy failed");
                failures.push(format!("{name}: {e}"));
            }
        }
    }
    Err(CertDeskError::KeyDecode(format!(
        "no decoding strategy accepted the input ({})",
        failures.join("; ")
    )))
}

fn decode_pkcs8_pem(data: &[u8]) -> Result<KeyPair> {
    let blocks = parse_pem_blocks(data)
        .ok_or_else(|| CertDeskError::KeyDecode("not PEM text".to_string()))?;
    if blocks.iter().any(|b| b.tag() == "ENCRYPTED PRIVATE KEY") {
        return Err(CertDeskError::KeyDecode(
            "encrypted PKCS#8 keys are not supported".to_string(),
        ));
    }
    let block = blocks
        .iter()
        .find(|b| b.tag() == PRIVATE_KEY_LABEL)
        .ok_or_else(|| CertDeskError::KeyDecode("no PRIVATE KEY block".to_string()))?;
    KeyPair::from_pkcs8_der(block.contents())
}

fn decode_legacy_pem(data: &[u8]) -> Result<KeyPair> {
    let blocks = parse_pem_blocks(data)
        .ok_or_else(|| CertDeskError::KeyDecode("not PEM text".to_string()))?;
    let block = blocks
        .iter()
        .find(|b| matches!(b.tag(), "RSA PRIVATE KEY" | "EC PRIVATE KEY"))
        .ok_or_else(|| CertDeskError::KeyDecode("no legacy key-pair block".to_string()))?;
    if block.headers().get("Proc-Type").is_some() {
        return Err(CertDeskError::KeyDecode(
            "password-protected legacy PEM is not supported".to_string(),
        ));
    }

    match block.tag() {
        "RSA PRIVATE KEY" => {
            let private = RsaPrivateKey::from_pkcs1_der(block.contents())
                .map_err(|e| CertDeskError::KeyDecode(e.to_string()))?;
            let public = RsaPublicKey::from(&private);
            Ok(KeyPair::Rsa {
                private: Box::new(private),
                public,
            })
        }
        _ => decode_sec1(block.contents()),
    }
}

fn decode_sec1(der_bytes: &[u8]) -> Result<KeyPair> {
    let decode_err = |e: p256::elliptic_curve::Error| CertDeskError::KeyDecode(e.to_string());
    let ec_key = sec1::EcPrivateKey::from_der(der_bytes)
        .map_err(|e| CertDeskError::KeyDecode(e.to_string()))?;
    let curve = ec_key.parameters.and_then(|p| p.named_curve());

    match (curve, ec_key.private_key.len()) {
        (Some(const_oid::db::rfc5912::SECP_256_R_1), _) | (None, 32) => {
            let secret = p256::SecretKey::from_sec1_der(der_bytes).map_err(decode_err)?;
            let signing_key = P256SigningKey::from(secret);
            let verifying_key = signing_key.verifying_key().to_owned();
            Ok(KeyPair::EcdsaP256 {
                signing_key,
                verifying_key,
            })
        }
        (Some(const_oid::db::rfc5912::SECP_384_R_1), _) | (None, 48) => {
            let secret = p384::SecretKey::from_sec1_der(der_bytes).map_err(decode_err)?;
            let signing_key = P384SigningKey::from(secret);
            let verifying_key = signing_key.verifying_key().to_owned();
            Ok(KeyPair::EcdsaP384 {
                signing_key,
                verifying_key,
            })
        }
        (Some(other), _) => Err(CertDeskError::KeyDecode(format!(
            "unsupported EC curve {other}"
        ))),
        (None, len) => Err(CertDeskError::KeyDecode(format!(
            "cannot infer EC curve from a {len}-byte private key"
        ))),
    }
}

fn decode_pkcs8_der(data: &[u8]) -> Result<KeyPair> {
    KeyPair::from_pkcs8_der(data)
}

/// Decodes a single certificate from PEM text (first `CERTIFICATE` block) or DER.
pub fn decode_certificate(data: &[u8]) -> Result<Certificate> {
    match parse_pem_blocks(data) {
        Some(blocks) => {
            let block = blocks
                .iter()
                .find(|b| b.tag() == CERTIFICATE_LABEL)
                .ok_or_else(|| {
                    CertDeskError::CertificateDecode("no CERTIFICATE block".to_string())
                })?;
            Certificate::from_der(block.contents())
        }
        None => Certificate::from_der(data),
    }
}

/// Decodes every `CERTIFICATE` block of a PEM bundle, in file order.
///
/// Blank input yields an empty list. Non-certificate blocks are skipped, but
/// text holding no certificate at all is an error.
pub fn decode_certificate_chain(text: &str) -> Result<Vec<Certificate>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let blocks =
        pem::parse_many(text).map_err(|e| CertDeskError::CertificateDecode(e.to_string()))?;
    let chain = blocks
        .iter()
        .filter(|b| b.tag() == CERTIFICATE_LABEL)
        .map(|b| Certificate::from_der(b.contents()))
        .collect::<Result<Vec<_>>>()?;
    if chain.is_empty() {
        return Err(CertDeskError::CertificateDecode(
            "no CERTIFICATE block found".to_string(),
        ));
    }
    Ok(chain)
}

/// Builds a degenerate (certificates-only) PKCS#7 `SignedData` bundle.
///
/// The certificates are stored as a DER `SET OF`, so their order in the
/// output is canonical rather than the input order. Duplicates are dropped.
pub fn encode_pkcs7(certificates: &[Certificate]) -> Result<Vec<u8>> {
    let mut unique: Vec<x509_cert::Certificate> = Vec::with_capacity(certificates.len());
    for cert in certificates {
        if !unique.contains(&cert.inner) {
            unique.push(cert.inner.clone());
        }
    }
    let encode_err = |e: der::Error| CertDeskError::Encoding(e.to_string());

    let choices = unique
        .into_iter()
        .map(CertificateChoices::Certificate)
        .collect::<Vec<_>>();
    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::new(),
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: const_oid::db::rfc5911::ID_DATA,
            econtent: None,
        },
        certificates: Some(CertificateSet(
            SetOfVec::try_from(choices).map_err(encode_err)?,
        )),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::new()),
    };
    let content_info = ContentInfo {
        content_type: const_oid::db::rfc5911::ID_SIGNED_DATA,
        content: der::Any::encode_from(&signed_data).map_err(encode_err)?,
    };
    content_info.to_der().map_err(encode_err)
}

/// Reads the certificates out of a PKCS#7 bundle given as PEM (`PKCS7`/`CMS`) or DER.
pub fn decode_pkcs7(data: &[u8]) -> Result<Vec<Certificate>> {
    let der_bytes = match parse_pem_blocks(data) {
        Some(blocks) => blocks
            .into_iter()
            .find(|b| PKCS7_LABELS.contains(&b.tag()))
            .map(|b| b.into_contents())
            .ok_or_else(|| CertDeskError::CertificateDecode("no PKCS7 block".to_string()))?,
        None => data.to_vec(),
    };
    let decode_err = |e: der::Error| CertDeskError::CertificateDecode(e.to_string());

    let content_info = ContentInfo::from_der(&der_bytes).map_err(decode_err)?;
    if content_info.content_type != const_oid::db::rfc5911::ID_SIGNED_DATA {
        return Err(CertDeskError::CertificateDecode(format!(
            "PKCS#7 content type {} is not signedData",
            content_info.content_type
        )));
    }
    let signed_data = content_info
        .content
        .decode_as::<SignedData>()
        .map_err(decode_err)?;

    let Some(cert_set) = signed_data.certificates else {
        return Ok(Vec::new());
    };
    Ok(cert_set
        .0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(inner) => Some(Certificate {
                inner: inner.clone(),
            }),
            _ => {
                debug!("Skipping non-X.509 certificate choice in PKCS#7 bundle");
                None
            }
        })
        .collect())
}

/// Objects with a canonical DER encoding and a PEM label.
pub trait PemEncodable {
    const PEM_LABEL: &'static str;

    fn encode_to_der(&self) -> Result<Vec<u8>>;

    fn encode_to_pem(&self) -> Result<String> {
        Ok(der_to_pem(&self.encode_to_der()?, Self::PEM_LABEL))
    }
}

impl PemEncodable for Certificate {
    const PEM_LABEL: &'static str = CERTIFICATE_LABEL;

    fn encode_to_der(&self) -> Result<Vec<u8>> {
        self.to_der()
    }
}

impl PemEncodable for KeyPair {
    const PEM_LABEL: &'static str = PRIVATE_KEY_LABEL;

    fn encode_to_der(&self) -> Result<Vec<u8>> {
        self.to_pkcs8_der()
    }
}

impl PemEncodable for PublicKey {
    const PEM_LABEL: &'static str = PUBLIC_KEY_LABEL;

    fn encode_to_der(&self) -> Result<Vec<u8>> {
        self.to_spki()?
            .to_der()
            .map_err(|e| CertDeskError::Encoding(e.to_string()))
    }
}
