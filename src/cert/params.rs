use std::fmt;
use std::str::FromStr;

use bon::{Builder, bon};
use const_oid::ObjectIdentifier;
use time::Duration;
use time::OffsetDateTime;
use x509_cert::name::RdnSequence;

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::cert::extensions::KeyUsage;
use crate::error::CertDeskError;
use crate::key::PublicKey;

/// Parameters for building an X.509 certificate.
///
/// This struct contains the subject, public key, and optional extensions for the certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `usages` - A list of extended key usage options.
/// * `key_usage` - Key usage bits; no extension is emitted when absent.
/// * `hosts` - Subject alternative names, each an IP literal or a DNS name.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `serial_number` - Big-endian serial; a random 63-bit value unless given.
/// * `extensions` - Additional X.509 extensions.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    pub key_usage: Option<KeyUsage>,
    #[builder(default)]
    pub hosts: Vec<String>,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default = random_serial_number())]
    pub serial_number: Vec<u8>,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Returns a random non-negative 63-bit serial number, big-endian with leading zeros stripped.
pub fn random_serial_number() -> Vec<u8> {
    let value = match rand::random::<u64>() & (i64::MAX as u64) {
        0 => 1,
        v => v,
    };
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Subject or issuer name of a certificate.
///
/// Parsed from and rendered as an RFC 4514 string such as `CN=example.com,O=Example`.
/// Spaces around the `,` separators are accepted when parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistinguishedName(RdnSequence);

#[bon]
impl DistinguishedName {
    /// Assembles a name from its common attributes.
    ///
    /// ```
    /// use certdesk::cert::params::DistinguishedName;
    ///
    /// let dn = DistinguishedName::builder()
    ///     .common_name("example.com".to_string())
    ///     .organization("Example Corp".to_string())
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(dn.to_string(), "CN=example.com,O=Example Corp");
    /// ```
    #[builder]
    pub fn new(
        common_name: String,
        organization_unit: Option<String>,
        organization: Option<String>,
        locality: Option<String>,
        state: Option<String>,
        country: Option<String>,
    ) -> Result<Self, CertDeskError> {
        let parts = [
            ("CN", Some(common_name)),
            ("OU", organization_unit),
            ("O", organization),
            ("L", locality),
            ("ST", state),
            ("C", country),
        ];
        let rfc4514_name = parts
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| format!("{key}={}", escape_value(&v))))
            .collect::<Vec<_>>()
            .join(",");
        Self::parse(&rfc4514_name)
    }

    /// Parses an RFC 4514 / RFC 2253 name string.
    pub fn parse(name: &str) -> Result<Self, CertDeskError> {
        let normalized = split_unescaped(name, ',')
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        if normalized.is_empty() {
            return Err(CertDeskError::invalid_config("dn", "must not be blank"));
        }
        RdnSequence::from_str(&normalized)
            .map(Self)
            .map_err(|e| CertDeskError::invalid_config("dn", format!("`{name}`: {e}")))
    }

    /// Converts the distinguished name to an X.509-compatible format.
    pub fn as_x509_name(&self) -> x509_cert::name::Name {
        self.0.clone()
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    pub fn from_x509_name(x509dn: &x509_cert::name::Name) -> Self {
        Self(x509dn.clone())
    }

    /// First common name (CN) attribute, if any.
    pub fn common_name(&self) -> Option<String> {
        self.0.0.iter().find_map(|rdn| {
            rdn.0.iter().find_map(|attr| {
                if attr.oid == const_oid::db::rfc4519::CN {
                    std::str::from_utf8(attr.value.value())
                        .ok()
                        .map(str::to_string)
                } else {
                    None
                }
            })
        })
    }
}

impl FromStr for DistinguishedName {
    type Err = CertDeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn split_unescaped(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, ch) in input.char_indices() {
        match ch {
            '\\' if !escaped => escaped = true,
            c if c == separator && !escaped => {
                parts.push(&input[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => escaped = false,
        }
    }
    parts.push(&input[start..]);
    parts
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// A window starting one day before now (clock skew) and lasting `years` calendar years.
    pub fn for_years(years: u32) -> Result<Self, CertDeskError> {
        if years == 0 {
            return Err(CertDeskError::invalid_config(
                "validityYear",
                "must be greater than zero",
            ));
        }
        let not_before = backdated_now();
        let target_year = i32::try_from(years)
            .ok()
            .and_then(|y| not_before.year().checked_add(y))
            .ok_or_else(|| CertDeskError::invalid_config("validityYear", "too large"))?;
        // 29 February has no counterpart in a common year.
        let not_after = not_before
            .replace_year(target_year)
            .or_else(|_| {
                not_before
                    .replace_day(28)
                    .and_then(|d| d.replace_year(target_year))
            })
            .map_err(|e| CertDeskError::invalid_config("validityYear", e.to_string()))?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    /// A window starting one day before now and ending `days` days from now.
    pub fn for_days(days: i64) -> Result<Self, CertDeskError> {
        if days <= 0 {
            return Err(CertDeskError::invalid_config(
                "validityDays",
                "must be greater than zero",
            ));
        }
        let not_before = backdated_now();
        let not_after = days
            .checked_add(1)
            .and_then(|d| d.checked_mul(86_400))
            .map(Duration::seconds)
            .and_then(|span| not_before.checked_add(span))
            .ok_or_else(|| {
                CertDeskError::invalid_config("validityDays", format!("{days} is too large"))
            })?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

fn backdated_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond())) - Duration::days(1)
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, CertDeskError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, CertDeskError> {
        E::from_x509_extension_value(&self.value)
    }
}
