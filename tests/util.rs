#![allow(dead_code)]

use certdesk::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use certdesk::cert::{Certificate, CertificateWithPrivateKey, SignatureAlgorithm};
use certdesk::config::CertificateProfile;
use certdesk::issuer;
use certdesk::key::{KeyAlgorithm, KeyAlgorithmSpec, KeyPair, PublicKey};

pub fn profile(dn: &str, validity_year: i32, hosts: &[&str]) -> CertificateProfile {
    CertificateProfile::builder()
        .dn(dn)
        .validity_year(validity_year)
        .initialize_size(256)
        .hosts(hosts.iter().map(|h| h.to_string()).collect())
        .build()
}

pub fn ec256() -> KeyAlgorithmSpec {
    KeyAlgorithmSpec::new(KeyAlgorithm::Ec, 256)
}

pub fn generate_ca_cert() -> CertificateWithPrivateKey {
    issuer::generate_ca(&ec256(), &profile("CN=myca.local,O=CertDesk Test", 5, &[])).unwrap()
}

pub fn issue_server_cert(
    ca: &CertificateWithPrivateKey,
    hosts: &[&str],
) -> CertificateWithPrivateKey {
    issuer::issue_certificate(
        &profile("CN=server.myca.local", 1, hosts),
        &ec256(),
        Some(&ca.cert),
        Some(&ca.key),
    )
    .unwrap()
}

/// A self-signed Ed25519 certificate with an explicit validity window.
pub fn self_signed_with_validity(cn: &str, validity: Validity) -> CertificateWithPrivateKey {
    let key = KeyPair::generate_ed25519();
    let request = CertificationRequestInfo::builder()
        .subject(DistinguishedName::parse(&format!("CN={cn}")).unwrap())
        .subject_public_key(PublicKey::from_key_pair(&key))
        .build();
    let cert =
        Certificate::new_self_signed(&request, &key, validity, SignatureAlgorithm::Ed25519)
            .unwrap();
    CertificateWithPrivateKey { cert, key }
}
