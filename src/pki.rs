use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::pkcs1v15::{
    Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey,
};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::cert::SignatureAlgorithm;
use crate::error::{CertDeskError, Result};
use crate::key::{KeyPair, PublicKey};

fn prehash(algorithm: SignatureAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        SignatureAlgorithm::Sha384WithRsa | SignatureAlgorithm::Sha384WithEcdsa => {
            Sha384::digest(data).to_vec()
        }
        SignatureAlgorithm::Sha512WithRsa | SignatureAlgorithm::Sha512WithEcdsa => {
            Sha512::digest(data).to_vec()
        }
        _ => Sha256::digest(data).to_vec(),
    }
}

fn mismatch(algorithm: SignatureAlgorithm, key: &str) -> CertDeskError {
    CertDeskError::UnsupportedAlgorithm(format!("{algorithm} cannot be used with an {key} key"))
}

/// Signs `data` with `key` using `algorithm`.
///
/// ECDSA signatures are returned DER-encoded, as X.509 and PKCS#7 expect.
pub fn sign_data(data: &[u8], key: &KeyPair, algorithm: SignatureAlgorithm) -> Result<Vec<u8>> {
    if algorithm.key_algorithm() != key.algorithm() {
        return Err(mismatch(algorithm, key.algorithm().name()));
    }
    let sign_err = |e: ecdsa::Error| CertDeskError::CertificateBuild(e.to_string());

    match key {
        KeyPair::Rsa { private, .. } => {
            let private = private.as_ref().clone();
            let signature = match algorithm {
                SignatureAlgorithm::Sha384WithRsa => {
                    RsaSigningKey::<Sha384>::new(private).try_sign(data)
                }
                SignatureAlgorithm::Sha512WithRsa => {
                    RsaSigningKey::<Sha512>::new(private).try_sign(data)
                }
                _ => RsaSigningKey::<Sha256>::new(private).try_sign(data),
            }
            .map_err(|e| CertDeskError::CertificateBuild(e.to_string()))?;
            Ok(signature.to_vec())
        }
        KeyPair::EcdsaP256 { signing_key, .. } => {
            let signature: p256::ecdsa::DerSignature = signing_key
                .sign_prehash(&prehash(algorithm, data))
                .map_err(sign_err)?;
            Ok(signature.as_bytes().to_vec())
        }
        KeyPair::EcdsaP384 { signing_key, .. } => {
            let signature: p384::ecdsa::DerSignature = signing_key
                .sign_prehash(&prehash(algorithm, data))
                .map_err(sign_err)?;
            Ok(signature.as_bytes().to_vec())
        }
        KeyPair::Ed25519 { signing_key } => Ok(signing_key.sign(data).to_bytes().to_vec()),
    }
}

/// Verifies `signature` over `data` with `public_key` using `algorithm`.
pub fn verify_signature(
    data: &[u8],
    signature: &[u8],
    public_key: &PublicKey,
    algorithm: SignatureAlgorithm,
) -> Result<()> {
    if algorithm.key_algorithm() != public_key.algorithm() {
        return Err(mismatch(algorithm, public_key.algorithm().name()));
    }
    let invalid = |reason: String| CertDeskError::IssuanceVerification(reason);

    match public_key {
        PublicKey::Rsa(public) => {
            let signature =
                RsaSignature::try_from(signature).map_err(|e| invalid(e.to_string()))?;
            let public = public.clone();
            match algorithm {
                SignatureAlgorithm::Sha384WithRsa => {
                    RsaVerifyingKey::<Sha384>::new(public).verify(data, &signature)
                }
                SignatureAlgorithm::Sha512WithRsa => {
                    RsaVerifyingKey::<Sha512>::new(public).verify(data, &signature)
                }
                _ => RsaVerifyingKey::<Sha256>::new(public).verify(data, &signature),
            }
            .map_err(|e| invalid(e.to_string()))
        }
        PublicKey::EcdsaP256(verifying_key) => {
            let signature = p256::ecdsa::DerSignature::try_from(signature)
                .map_err(|e| invalid(e.to_string()))?;
            verifying_key
                .verify_prehash(&prehash(algorithm, data), &signature)
                .map_err(|e| invalid(e.to_string()))
        }
        PublicKey::EcdsaP384(verifying_key) => {
            let signature = p384::ecdsa::DerSignature::try_from(signature)
                .map_err(|e| invalid(e.to_string()))?;
            verifying_key
                .verify_prehash(&prehash(algorithm, data), &signature)
                .map_err(|e| invalid(e.to_string()))
        }
        PublicKey::Ed25519(verifying_key) => {
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|e| invalid(e.to_string()))?;
            verifying_key
                .verify(data, &signature)
                .map_err(|e| invalid(e.to_string()))
        }
    }
}
