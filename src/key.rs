use std::fmt;

use const_oid::ObjectIdentifier;
use const_oid::db::{rfc5912, rfc8410};
use der::Decode;
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::{DecodePrivateKey, EncodePrivateKey, PrivateKeyInfo};
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::spki::{DecodePublicKey, SubjectPublicKeyInfoOwned};

use crate::error::{CertDeskError, Result};

/// Key algorithm families understood by the key generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
    Ed25519,
}

impl KeyAlgorithm {
    /// Parses a JCA-style algorithm name (`RSA`, `EC`, `Ed25519`), ignoring case.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "RSA" => Ok(KeyAlgorithm::Rsa),
            "EC" | "ECDSA" => Ok(KeyAlgorithm::Ec),
            "ED25519" | "EDDSA" => Ok(KeyAlgorithm::Ed25519),
            "" => Err(CertDeskError::invalid_config("algorithm", "must not be blank")),
            other => Err(CertDeskError::UnsupportedAlgorithm(format!(
                "unknown key algorithm {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ec => "EC",
            KeyAlgorithm::Ed25519 => "Ed25519",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Algorithm family plus size parameter used to generate a key pair.
///
/// For RSA the size is the modulus length in bits, for EC it selects the curve
/// (256 or 384) and for Ed25519 it is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAlgorithmSpec {
    pub algorithm: KeyAlgorithm,
    pub key_size: u32,
}

impl KeyAlgorithmSpec {
    pub fn new(algorithm: KeyAlgorithm, key_size: u32) -> Self {
        Self {
            algorithm,
            key_size,
        }
    }

    /// Builds a spec from a configuration's algorithm name and `initializeSize`.
    pub fn parse(algorithm: &str, key_size: u32) -> Result<Self> {
        if key_size == 0 {
            return Err(CertDeskError::invalid_config(
                "initializeSize",
                "must be greater than zero",
            ));
        }
        Ok(Self::new(KeyAlgorithm::from_name(algorithm)?, key_size))
    }
}

/// Supported key types for certificate operations.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl KeyPair {
    /// Generates a key pair sized per `spec`.
    pub fn generate(spec: &KeyAlgorithmSpec) -> Result<Self> {
        match spec.algorithm {
            KeyAlgorithm::Rsa => Self::generate_rsa(spec.key_size as usize),
            KeyAlgorithm::Ec => match spec.key_size {
                256 => Ok(Self::generate_ecdsa_p256()),
                384 => Ok(Self::generate_ecdsa_p384()),
                other => Err(CertDeskError::UnsupportedAlgorithm(format!(
                    "no EC curve of size {other}"
                ))),
            },
            KeyAlgorithm::Ed25519 => Ok(Self::generate_ed25519()),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let signing_key = P256SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let signing_key = P384SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut rand_core::OsRng);
        KeyPair::Ed25519 { signing_key }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            KeyPair::Rsa { .. } => KeyAlgorithm::Rsa,
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } => KeyAlgorithm::Ec,
            KeyPair::Ed25519 { .. } => KeyAlgorithm::Ed25519,
        }
    }

    /// Encodes the private key as PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der(),
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_der(),
            KeyPair::EcdsaP384 { signing_key, .. } => signing_key.to_pkcs8_der(),
            KeyPair::Ed25519 { signing_key } => signing_key.to_pkcs8_der(),
        }
        .map_err(|e| CertDeskError::Encoding(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Encodes the private key as a `PRIVATE KEY` PEM block.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        Ok(crate::codec::der_to_pem(&self.to_pkcs8_der()?, "PRIVATE KEY"))
    }

    /// Decodes a PKCS#8 `PrivateKeyInfo`, dispatching on the declared algorithm.
    pub fn from_pkcs8_der(der_bytes: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::from_der(der_bytes)
            .map_err(|e| CertDeskError::KeyDecode(e.to_string()))?;
        let decode_err = |e: pkcs8::Error| CertDeskError::KeyDecode(e.to_string());

        match info.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => {
                let private = RsaPrivateKey::from_pkcs8_der(der_bytes).map_err(decode_err)?;
                let public = RsaPublicKey::from(&private);
                Ok(KeyPair::Rsa {
                    private: Box::new(private),
                    public,
                })
            }
            rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = info
                    .algorithm
                    .parameters_oid()
                    .map_err(|e| CertDeskError::KeyDecode(e.to_string()))?;
                match curve {
                    rfc5912::SECP_256_R_1 => {
                        let signing_key =
                            P256SigningKey::from_pkcs8_der(der_bytes).map_err(decode_err)?;
                        let verifying_key = signing_key.verifying_key().to_owned();
                        Ok(KeyPair::EcdsaP256 {
                            signing_key,
                            verifying_key,
                        })
                    }
                    rfc5912::SECP_384_R_1 => {
                        let signing_key =
                            P384SigningKey::from_pkcs8_der(der_bytes).map_err(decode_err)?;
                        let verifying_key = signing_key.verifying_key().to_owned();
                        Ok(KeyPair::EcdsaP384 {
                            signing_key,
                            verifying_key,
                        })
                    }
                    other => Err(CertDeskError::KeyDecode(format!(
                        "unsupported EC curve {other}"
                    ))),
                }
            }
            rfc8410::ID_ED_25519 => {
                let signing_key =
                    Ed25519SigningKey::from_pkcs8_der(der_bytes).map_err(decode_err)?;
                Ok(KeyPair::Ed25519 { signing_key })
            }
            other => Err(CertDeskError::KeyDecode(format!(
                "unsupported key algorithm {other}"
            ))),
        }
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_pkcs8_der(), other.to_pkcs8_der()) {
            (Ok(lhs), Ok(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .field("public_key", &PublicKey::from_key_pair(self))
            .finish_non_exhaustive()
    }
}

/// Public half of a [`KeyPair`], or a key read from a certificate.
#[derive(Clone, Debug, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(verifying_key.clone()),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(verifying_key.clone()),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
            PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) => KeyAlgorithm::Ec,
            PublicKey::Ed25519(_) => KeyAlgorithm::Ed25519,
        }
    }

    /// Converts the key into a `SubjectPublicKeyInfo`.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(verifying_key.clone())
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(verifying_key.clone())
            }
            PublicKey::Ed25519(verifying_key) => SubjectPublicKeyInfoOwned::from_key(*verifying_key),
        };
        spki.map_err(|e| CertDeskError::Encoding(e.to_string()))
    }

    /// Reads a public key out of a certificate's `SubjectPublicKeyInfo`.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der_bytes = der::Encode::to_der(spki)?;
        let decode_err = |e: x509_cert::spki::Error| CertDeskError::CertificateDecode(e.to_string());

        match spki.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => Ok(PublicKey::Rsa(
                RsaPublicKey::from_public_key_der(&der_bytes).map_err(decode_err)?,
            )),
            rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|params| params.decode_as::<ObjectIdentifier>().ok());
                match curve {
                    Some(rfc5912::SECP_256_R_1) => Ok(PublicKey::EcdsaP256(
                        P256VerifyingKey::from_public_key_der(&der_bytes).map_err(decode_err)?,
                    )),
                    Some(rfc5912::SECP_384_R_1) => Ok(PublicKey::EcdsaP384(
                        P384VerifyingKey::from_public_key_der(&der_bytes).map_err(decode_err)?,
                    )),
                    _ => Err(CertDeskError::UnsupportedAlgorithm(
                        "unsupported EC curve in public key".to_string(),
                    )),
                }
            }
            rfc8410::ID_ED_25519 => Ok(PublicKey::Ed25519(
                Ed25519VerifyingKey::from_public_key_der(&der_bytes).map_err(decode_err)?,
            )),
            other => Err(CertDeskError::UnsupportedAlgorithm(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }

    /// Key identifier per RFC 5280 section 4.2.1.2, method 1: SHA-1 of the key bits.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let spki = self.to_spki()?;
        Ok(<sha1::Sha1 as sha1::Digest>::digest(spki.subject_public_key.raw_bytes()).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_algorithm_names() {
        assert_eq!(KeyAlgorithm::from_name("rsa").unwrap(), KeyAlgorithm::Rsa);
        assert_eq!(KeyAlgorithm::from_name("ECDSA").unwrap(), KeyAlgorithm::Ec);
        assert_eq!(KeyAlgorithm::from_name("EdDSA").unwrap(), KeyAlgorithm::Ed25519);
        assert!(matches!(
            KeyAlgorithm::from_name("DSA"),
            Err(CertDeskError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            KeyAlgorithmSpec::parse("RSA", 0),
            Err(CertDeskError::InvalidConfig { field, .. }) if field == "initializeSize"
        ));
    }

    #[test]
    fn test_unknown_ec_curve_rejected() {
        let spec = KeyAlgorithmSpec::new(KeyAlgorithm::Ec, 521);
        assert!(matches!(
            KeyPair::generate(&spec),
            Err(CertDeskError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_pkcs8_round_trip() {
        for key in [
            KeyPair::generate_ecdsa_p256(),
            KeyPair::generate_ecdsa_p384(),
            KeyPair::generate_ed25519(),
        ] {
            let der_bytes = key.to_pkcs8_der().unwrap();
            let decoded = KeyPair::from_pkcs8_der(&der_bytes).unwrap();
            assert_eq!(key, decoded);
            assert_eq!(key.algorithm(), decoded.algorithm());
        }
    }

    #[test]
    fn test_spki_round_trip() {
        let key = KeyPair::generate_ecdsa_p384();
        let public = PublicKey::from_key_pair(&key);
        let spki = public.to_spki().unwrap();
        assert_eq!(PublicKey::from_spki(&spki).unwrap(), public);
        assert_eq!(public.key_identifier().unwrap().len(), 20);
    }
}
