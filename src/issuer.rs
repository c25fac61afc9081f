use der::Encode;
use der::flagset::FlagSet;
use tracing::{debug, info};
use x509_cert::certificate::CertificateInner;

use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity};
use crate::cert::{Certificate, CertificateWithPrivateKey, SignatureAlgorithm};
use crate::codec;
use crate::config::{CertificateProfile, SelfSignConfig};
use crate::error::{CertDeskError, Result};
use crate::key::{KeyAlgorithm, KeyAlgorithmSpec, KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> DistinguishedName;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the Authority Key Identifier written into issued certificates, if any.
    fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>>;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// Emits basic constraints (critical), the subject key identifier, the authority
    /// key identifier when the issuer has one, and key usage, extended key usage and
    /// subject alternative names when the request asks for them.
    ///
    /// # Arguments
    /// * `cert_request` - The certification request information containing details about the certificate to be issued.
    /// * `validity` - The validity window of the new certificate.
    /// * `signature_algorithm` - Must belong to the family of the issuer's signing key.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Certificate> {
        let signing_key = self.signing_key();
        if signature_algorithm.key_algorithm() != signing_key.algorithm() {
            return Err(CertDeskError::UnsupportedAlgorithm(format!(
                "{signature_algorithm} cannot be produced by an {} issuer key",
                signing_key.algorithm()
            )));
        }

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: None,
        };
        let mut extensions = vec![ExtensionParam::from_extension(basic_constraints, true)?];

        if let Some(authority_key_id) = self.authority_key_identifier()? {
            extensions.push(ExtensionParam::from_extension(authority_key_id, false)?);
        }

        let subject_key_id =
            SubjectKeyIdentifier(cert_request.subject_public_key.key_identifier()?);
        extensions.push(ExtensionParam::from_extension(subject_key_id, false)?);

        if let Some(key_usage) = cert_request.key_usage {
            extensions.push(ExtensionParam::from_extension(key_usage, false)?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        if !cert_request.hosts.is_empty() {
            let san = SubjectAltName::from_hosts(&cert_request.hosts);
            debug!(names = ?san.names, "Adding subject alternative names");
            extensions.push(ExtensionParam::from_extension(san, false)?);
        }

        let combined_extensions = extensions
            .into_iter()
            .chain(cert_request.extensions.iter().cloned())
            .collect();

        let tbs_cert = TbsCertificate {
            serial_number: cert_request.serial_number.clone(),
            signature_algorithm,
            issuer: self.issuer_name(),
            validity,
            subject: cert_request.subject.clone(),
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions: combined_extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature =
            crate::pki::sign_data(&tbs_cert_inner.to_der()?, signing_key, signature_algorithm)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.into(),
            signature: der::asn1::BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// AKI pointing at `ca`: its key identifier, its issuer name and its serial number.
pub(crate) fn authority_key_identifier_for(ca: &Certificate) -> Result<AuthorityKeyIdentifier> {
    let key_identifier = match ca.extension::<SubjectKeyIdentifier>()? {
        Some(ski) => ski.0,
        None => ca.public_key()?.key_identifier()?,
    };
    Ok(AuthorityKeyIdentifier {
        key_identifier,
        authority_cert_issuer: Some(ca.issuer()),
        authority_cert_serial_number: Some(ca.serial_number().to_vec()),
    })
}

struct CaIssuer<'a> {
    cert: &'a Certificate,
    key: &'a KeyPair,
}

impl Issuer for CaIssuer<'_> {
    fn issuer_name(&self) -> DistinguishedName {
        self.cert.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn authority_key_identifier(&self) -> Result<Option<AuthorityKeyIdentifier>> {
        authority_key_identifier_for(self.cert).map(Some)
    }
}

/// Picks the configured signature algorithm, or the key's default when none is set.
pub fn resolve_signature_algorithm(
    configured: Option<&str>,
    signing_key: &KeyPair,
) -> Result<SignatureAlgorithm> {
    Ok(parse_signature_algorithm(configured, signing_key.algorithm())?
        .unwrap_or_else(|| SignatureAlgorithm::default_for(signing_key)))
}

/// Parses a configured name and checks it belongs to `family`. Blank means unset.
fn parse_signature_algorithm(
    configured: Option<&str>,
    family: KeyAlgorithm,
) -> Result<Option<SignatureAlgorithm>> {
    let Some(name) = configured.map(str::trim).filter(|name| !name.is_empty()) else {
        return Ok(None);
    };
    let algorithm = SignatureAlgorithm::from_name(name)?;
    if algorithm.key_algorithm() != family {
        return Err(CertDeskError::UnsupportedAlgorithm(format!(
            "{algorithm} cannot be produced by an {family} key"
        )));
    }
    Ok(Some(algorithm))
}

/// Generates a root key pair and a self-signed CA certificate.
///
/// The certificate carries `basicConstraints(CA=true)` (critical), a subject key
/// identifier and `keyUsage {keyCertSign, cRLSign}`. Validity starts one day
/// before now and lasts `validity_year` years.
pub fn generate_ca(
    spec: &KeyAlgorithmSpec,
    ca: &CertificateProfile,
) -> Result<CertificateWithPrivateKey> {
    if spec.key_size == 0 {
        return Err(CertDeskError::invalid_config(
            "initializeSize",
            "must be greater than zero",
        ));
    }
    let subject = ca.validate()?;
    let validity = Validity::for_years(ca.validity_years()?)?;

    let configured = parse_signature_algorithm(ca.signature_algorithm.as_deref(), spec.algorithm)?;

    let key = KeyPair::generate(spec)?;
    let signature_algorithm =
        configured.unwrap_or_else(|| SignatureAlgorithm::default_for(&key));

    let request = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(PublicKey::from_key_pair(&key))
        .is_ca(true)
        .key_usage(KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign))
        .build();

    let cert = Certificate::new_self_signed(&request, &key, validity, signature_algorithm)?;
    info!(
        subject = %cert.subject(),
        algorithm = %spec.algorithm,
        key_size = spec.key_size,
        serial = %cert.serial_number_hex(),
        "Generated CA certificate"
    );
    Ok(CertificateWithPrivateKey { cert, key })
}

/// Issues a leaf certificate for a freshly generated key, signed by the given CA.
///
/// The leaf carries `basicConstraints(CA=false)`, authority and subject key
/// identifiers, `keyUsage {digitalSignature, keyEncipherment}`,
/// `extendedKeyUsage {clientAuth, serverAuth}` and, when `leaf.hosts` is not
/// empty, a subject alternative name extension. The result is verified against
/// the CA certificate's public key before it is returned.
pub fn issue_certificate(
    leaf: &CertificateProfile,
    algo: &KeyAlgorithmSpec,
    ca_certificate: Option<&Certificate>,
    ca_private_key: Option<&KeyPair>,
) -> Result<CertificateWithPrivateKey> {
    let ca_certificate = ca_certificate
        .ok_or_else(|| CertDeskError::MissingCa("no CA certificate supplied".to_string()))?;
    let ca_private_key = ca_private_key
        .ok_or_else(|| CertDeskError::MissingCa("no CA private key supplied".to_string()))?;
    if algo.key_size == 0 {
        return Err(CertDeskError::invalid_config(
            "initializeSize",
            "must be greater than zero",
        ));
    }
    let subject = leaf.validate()?;
    let validity = Validity::for_years(leaf.validity_years()?)?;
    let signature_algorithm =
        resolve_signature_algorithm(leaf.signature_algorithm.as_deref(), ca_private_key)?;

    let key = KeyPair::generate(algo)?;
    let key_usage: FlagSet<KeyUsages> = KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment;
    let request = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(PublicKey::from_key_pair(&key))
        .usages(vec![
            ExtendedKeyUsageOption::ClientAuth,
            ExtendedKeyUsageOption::ServerAuth,
        ])
        .key_usage(KeyUsage(key_usage))
        .hosts(leaf.hosts.clone())
        .build();

    let issuer = CaIssuer {
        cert: ca_certificate,
        key: ca_private_key,
    };
    let cert = issuer.issue(&request, validity, signature_algorithm)?;

    let ca_public_key = ca_certificate.public_key()?;
    cert.verify_signed_by(&ca_public_key).map_err(|e| {
        CertDeskError::IssuanceVerification(format!(
            "certificate for {} does not verify against CA {}: {e}",
            cert.subject(),
            ca_certificate.subject()
        ))
    })?;

    info!(
        subject = %cert.subject(),
        issuer = %cert.issuer(),
        hosts = ?leaf.hosts,
        serial = %cert.serial_number_hex(),
        "Issued certificate"
    );
    Ok(CertificateWithPrivateKey { cert, key })
}

/// Same as [`issue_certificate`], reading the CA certificate and key from PEM text.
pub fn issue_certificate_from_pem(
    leaf: &CertificateProfile,
    algo: &KeyAlgorithmSpec,
    ca_certificate_pem: &str,
    ca_private_key_pem: &str,
) -> Result<CertificateWithPrivateKey> {
    if ca_certificate_pem.trim().is_empty() {
        return Err(CertDeskError::MissingCa("CA certificate is empty".to_string()));
    }
    if ca_private_key_pem.trim().is_empty() {
        return Err(CertDeskError::MissingCa("CA private key is empty".to_string()));
    }
    let ca_certificate = codec::decode_certificate(ca_certificate_pem.as_bytes())?;
    let ca_private_key = codec::decode_private_key(ca_private_key_pem.as_bytes())?;
    issue_certificate(leaf, algo, Some(&ca_certificate), Some(&ca_private_key))
}

/// A CA and a leaf certificate issued by it.
#[derive(Debug, Clone)]
pub struct SelfSignedPair {
    pub ca: CertificateWithPrivateKey,
    pub certificate: CertificateWithPrivateKey,
}

/// Validates both sections of `config`, generates the CA, then issues the leaf from it.
pub fn generate_self_signed_pair(config: &SelfSignConfig) -> Result<SelfSignedPair> {
    config.validate_ca()?;
    config.validate_certificate()?;
    let (ca_profile, ca_spec) = config.ca_profile()?;
    let (leaf_profile, leaf_spec) = config.certificate_profile()?;

    let ca = generate_ca(&ca_spec, ca_profile)?;
    let certificate = issue_certificate(leaf_profile, &leaf_spec, Some(&ca.cert), Some(&ca.key))?;
    Ok(SelfSignedPair { ca, certificate })
}
