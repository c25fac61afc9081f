//! Declarative configuration for generating a CA and a certificate issued by it.
//!
//! ```yaml
//! algorithm: RSA
//! ca:
//!   dn: CN=Example Root CA,O=Example,C=US
//!   validityYear: 10
//!   initializeSize: 2048
//!   signatureAlgorithm: SHA256withRSA
//! certificate:
//!   dn: CN=example.com,O=Example,C=US
//!   validityYear: 1
//!   initializeSize: 2048
//!   hosts:
//!     - example.com
//!     - 127.0.0.1
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::cert::params::DistinguishedName;
use crate::error::{CertDeskError, Result};
use crate::key::KeyAlgorithmSpec;

/// Starting point handed to users who have no configuration yet.
pub const SELF_SIGN_TEMPLATE: &str = "\
algorithm: RSA
ca:
  dn: CN=CertDesk Root CA,OU=Development,O=CertDesk,L=Shanghai,ST=Shanghai,C=CN
  validityYear: 10
  initializeSize: 2048
  signatureAlgorithm: SHA256withRSA
certificate:
  dn: CN=localhost,OU=Development,O=CertDesk,L=Shanghai,ST=Shanghai,C=CN
  validityYear: 1
  initializeSize: 2048
  signatureAlgorithm: SHA256withRSA
  hosts:
    - localhost
    - 127.0.0.1
";

/// One certificate section (`ca` or `certificate`) of a [`SelfSignConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateProfile {
    /// Subject distinguished name, RFC 4514 form.
    #[builder(into)]
    pub dn: String,
    pub validity_year: i32,
    /// RSA modulus bits, EC curve size (256/384); ignored for Ed25519.
    pub initialize_size: i32,
    /// JCA name; the signing key's default is used when absent.
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_algorithm: Option<String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
}

impl CertificateProfile {
    /// Checks the section and returns the parsed subject.
    pub fn validate(&self) -> Result<DistinguishedName> {
        let subject = DistinguishedName::parse(&self.dn)?;
        self.validity_years()?;
        self.key_size()?;
        Ok(subject)
    }

    pub fn validity_years(&self) -> Result<u32> {
        positive(self.validity_year, "validityYear")
    }

    pub fn key_size(&self) -> Result<u32> {
        positive(self.initialize_size, "initializeSize")
    }

    /// Key generation parameters for this section under `algorithm`.
    pub fn key_spec(&self, algorithm: &str) -> Result<KeyAlgorithmSpec> {
        KeyAlgorithmSpec::parse(algorithm, self.key_size()?)
    }
}

fn positive(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            CertDeskError::invalid_config(field, format!("must be greater than zero, got {value}"))
        })
}

/// Configuration for the "generate CA, then issue a certificate" flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase", default)]
pub struct SelfSignConfig {
    /// Key algorithm shared by both sections (`RSA`, `EC`, `Ed25519`).
    #[builder(into)]
    pub algorithm: String,
    pub ca: CertificateProfile,
    pub certificate: CertificateProfile,
}

impl SelfSignConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(CertDeskError::invalid_config("config", "is empty"));
        }
        serde_yaml::from_str(text)
            .map_err(|e| CertDeskError::invalid_config("config", e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| CertDeskError::Encoding(e.to_string()))
    }

    /// Rejects a blank algorithm or an invalid `ca` section.
    pub fn validate_ca(&self) -> Result<()> {
        self.ca_profile().map(|_| ())
    }

    /// Rejects a blank algorithm or an invalid `certificate` section.
    pub fn validate_certificate(&self) -> Result<()> {
        self.certificate_profile().map(|_| ())
    }

    /// The validated `ca` section together with its key parameters.
    pub fn ca_profile(&self) -> Result<(&CertificateProfile, KeyAlgorithmSpec)> {
        self.section(&self.ca)
    }

    /// The validated `certificate` section together with its key parameters.
    pub fn certificate_profile(&self) -> Result<(&CertificateProfile, KeyAlgorithmSpec)> {
        self.section(&self.certificate)
    }

    fn section<'a>(
        &self,
        profile: &'a CertificateProfile,
    ) -> Result<(&'a CertificateProfile, KeyAlgorithmSpec)> {
        if self.algorithm.trim().is_empty() {
            return Err(CertDeskError::invalid_config("algorithm", "must not be blank"));
        }
        profile.validate()?;
        Ok((profile, profile.key_spec(&self.algorithm)?))
    }
}
