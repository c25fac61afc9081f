//! In-memory credential stores and their JKS / PKCS#12 persistence.

pub mod jks;
pub mod pkcs12;

use std::collections::BTreeMap;
use std::fmt;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::cert::Certificate;
use crate::error::{CertDeskError, Result};
use crate::key::{KeyPair, PublicKey};

/// Entries whose certificate ends within this window are reported as expiring soon.
pub const EXPIRING_SOON_DAYS: i64 = 30;
/// Verification reports add a notice for certificates ending within this window.
pub const EXPIRY_NOTICE_DAYS: i64 = 90;

/// Binary keystore formats a [`CredentialStore`] can be loaded from and saved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    Jks,
    Pkcs12,
}

impl StoreType {
    /// `p12`/`pfx` select PKCS#12; every other extension is read as JKS.
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim().trim_start_matches('.');
        if extension.eq_ignore_ascii_case("p12") || extension.eq_ignore_ascii_case("pfx") {
            StoreType::Pkcs12
        } else {
            StoreType::Jks
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StoreType::Jks => "jks",
            StoreType::Pkcs12 => "p12",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreType::Jks => "JKS",
            StoreType::Pkcs12 => "PKCS12",
        })
    }
}

/// An aliased store entry: a trusted certificate, or a private key with its chain.
///
/// Key entries always hold at least one certificate; the first one in the
/// chain is the certificate of the key itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    alias: String,
    private_key: Option<KeyPair>,
    chain: Vec<Certificate>,
}

impl Credential {
    pub fn trusted_certificate(alias: impl Into<String>, certificate: Certificate) -> Self {
        Self {
            alias: alias.into(),
            private_key: None,
            chain: vec![certificate],
        }
    }

    /// A key entry; `chain` is ordered leaf to root and must match `key`.
    pub fn key_entry(
        alias: impl Into<String>,
        key: KeyPair,
        chain: Vec<Certificate>,
    ) -> Result<Self> {
        let alias = alias.into();
        let leaf = chain.first().ok_or_else(|| {
            CertDeskError::invalid_config("chain", format!("key entry {alias} needs a certificate"))
        })?;
        if leaf.public_key()? != PublicKey::from_key_pair(&key) {
            return Err(CertDeskError::invalid_config(
                "chain",
                format!("first certificate of {alias} does not match its private key"),
            ));
        }
        Ok(Self {
            alias,
            private_key: Some(key),
            chain,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The entry's own certificate (the leaf, for key entries).
    pub fn certificate(&self) -> &Certificate {
        &self.chain[0]
    }

    pub fn private_key(&self) -> Option<&KeyPair> {
        self.private_key.as_ref()
    }

    /// Full chain for key entries, the single certificate for trusted entries.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub fn is_key_entry(&self) -> bool {
        self.private_key.is_some()
    }

    pub fn status(&self) -> DerivedStatus {
        DerivedStatus::at(self.certificate(), OffsetDateTime::now_utc())
    }
}

/// Expiry state of an entry, computed from its certificate's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedStatus {
    Valid,
    ExpiringSoon { days_remaining: i64 },
    Expired,
}

impl DerivedStatus {
    pub fn at(certificate: &Certificate, now: OffsetDateTime) -> Self {
        let not_after = certificate.not_after();
        if not_after < now {
            DerivedStatus::Expired
        } else if not_after - now <= Duration::days(EXPIRING_SOON_DAYS) {
            DerivedStatus::ExpiringSoon {
                days_remaining: (not_after - now).whole_days(),
            }
        } else {
            DerivedStatus::Valid
        }
    }
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedStatus::Valid => f.write_str("valid"),
            DerivedStatus::ExpiringSoon { days_remaining } => {
                write!(f, "expiring soon ({days_remaining} days)")
            }
            DerivedStatus::Expired => f.write_str("expired"),
        }
    }
}

/// A row of [`CredentialStore::list_entries`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListedEntry<'a> {
    pub credential: &'a Credential,
    pub status: DerivedStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub total: usize,
    pub expired: usize,
    pub expiring_soon: usize,
}

/// Where `now` falls relative to a certificate's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityState {
    Valid { days_remaining: i64 },
    Expired { days_expired: i64 },
    NotYetValid { days_until_valid: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryNotice {
    /// Ends within [`EXPIRING_SOON_DAYS`].
    Warning,
    /// Ends within [`EXPIRY_NOTICE_DAYS`].
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryVerification {
    pub alias: String,
    pub subject: String,
    pub issuer: String,
    pub state: ValidityState,
    pub notice: Option<ExpiryNotice>,
    pub signature_algorithm: String,
    pub self_signed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub entries: Vec<EntryVerification>,
    pub valid: usize,
    pub expired: usize,
    pub not_yet_valid: usize,
}

impl EntryVerification {
    fn of(credential: &Credential, now: OffsetDateTime) -> Self {
        let cert = credential.certificate();
        let (not_before, not_after) = (cert.not_before(), cert.not_after());
        let state = if now > not_after {
            ValidityState::Expired {
                days_expired: (now - not_after).whole_days(),
            }
        } else if now < not_before {
            ValidityState::NotYetValid {
                days_until_valid: (not_before - now).whole_days(),
            }
        } else {
            ValidityState::Valid {
                days_remaining: (not_after - now).whole_days(),
            }
        };
        let notice = match state {
            ValidityState::Valid { days_remaining } if days_remaining <= EXPIRING_SOON_DAYS => {
                Some(ExpiryNotice::Warning)
            }
            ValidityState::Valid { days_remaining } if days_remaining <= EXPIRY_NOTICE_DAYS => {
                Some(ExpiryNotice::Notice)
            }
            _ => None,
        };
        Self {
            alias: credential.alias().to_string(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            state,
            notice,
            signature_algorithm: cert.signature_algorithm_name(),
            self_signed: cert.is_self_signed(),
        }
    }
}

/// Aliased credentials ordered by alias, plus the password used to persist them.
///
/// Aliases are case-sensitive. The same password protects the store and every
/// key entry in it.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialStore {
    store_type: StoreType,
    password: String,
    entries: BTreeMap<String, Credential>,
}

impl CredentialStore {
    /// An empty store with an empty password.
    pub fn new(store_type: StoreType) -> Self {
        Self {
            store_type,
            password: String::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Parses a password-protected store. Nothing is returned unless every entry decodes.
    pub fn load_from_bytes(bytes: &[u8], store_type: StoreType, password: &str) -> Result<Self> {
        let credentials = match store_type {
            StoreType::Jks => jks::decode(bytes, password)?,
            StoreType::Pkcs12 => pkcs12::decode(bytes, password)?,
        };
        let mut store = Self::new(store_type);
        store.password = password.to_string();
        for credential in credentials {
            if store.entries.contains_key(credential.alias()) {
                return Err(CertDeskError::StoreLoad(format!(
                    "alias {} appears more than once",
                    credential.alias()
                )));
            }
            store
                .entries
                .insert(credential.alias().to_string(), credential);
        }
        info!(store_type = %store_type, entries = store.len(), "Loaded credential store");
        Ok(store)
    }

    /// Serializes the store in its own format, protected by its password.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = encode_entries(self.store_type, self.entries.values(), &self.password)?;
        info!(store_type = %self.store_type, entries = self.len(), "Serialized credential store");
        Ok(bytes)
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn add_trusted_certificate(
        &mut self,
        alias: &str,
        certificate: Certificate,
        replace: bool,
    ) -> Result<()> {
        self.insert(Credential::trusted_certificate(alias, certificate), replace)
    }

    /// Adds a private key entry.
    ///
    /// `entry_password`, when given, must equal the store password: key entries
    /// are always protected with the store password.
    pub fn add_key_entry(
        &mut self,
        alias: &str,
        key: KeyPair,
        chain: Vec<Certificate>,
        entry_password: Option<&str>,
        replace: bool,
    ) -> Result<()> {
        if entry_password.is_some_and(|p| p != self.password) {
            return Err(CertDeskError::invalid_config(
                "entryPassword",
                "key entries are protected with the store password",
            ));
        }
        self.insert(Credential::key_entry(alias, key, chain)?, replace)
    }

    /// Inserts `credential` under its alias, refusing to overwrite unless `replace` is set.
    pub fn insert(&mut self, credential: Credential, replace: bool) -> Result<()> {
        let alias = credential.alias().to_string();
        if alias.trim().is_empty() {
            return Err(CertDeskError::invalid_config("alias", "must not be blank"));
        }
        if self.entries.contains_key(&alias) {
            if !replace {
                return Err(CertDeskError::DuplicateAlias(alias));
            }
            warn!(alias = %alias, "Replacing existing store entry");
        }
        self.entries.insert(alias, credential);
        Ok(())
    }

    /// Removes and returns the entry stored under `alias`.
    pub fn delete_entry(&mut self, alias: &str) -> Result<Credential> {
        self.entries
            .remove(alias)
            .ok_or_else(|| CertDeskError::AliasNotFound(alias.to_string()))
    }

    pub fn get(&self, alias: &str) -> Option<&Credential> {
        self.entries.get(alias)
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn credentials(&self) -> impl Iterator<Item = &Credential> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every entry in alias order with its current status.
    pub fn list_entries(&self) -> Vec<ListedEntry<'_>> {
        let now = OffsetDateTime::now_utc();
        self.entries
            .values()
            .map(|credential| ListedEntry {
                credential,
                status: DerivedStatus::at(credential.certificate(), now),
            })
            .collect()
    }

    pub fn summary(&self) -> StoreSummary {
        self.list_entries()
            .iter()
            .fold(StoreSummary::default(), |mut summary, entry| {
                summary.total += 1;
                match entry.status {
                    DerivedStatus::Expired => summary.expired += 1,
                    DerivedStatus::ExpiringSoon { .. } => summary.expiring_soon += 1,
                    DerivedStatus::Valid => {}
                }
                summary
            })
    }

    /// Checks the validity window of each named entry.
    pub fn verify_entries(&self, aliases: &[&str]) -> Result<VerificationReport> {
        let now = OffsetDateTime::now_utc();
        let mut report = VerificationReport::default();
        for alias in aliases {
            let credential = self
                .get(alias)
                .ok_or_else(|| CertDeskError::AliasNotFound(alias.to_string()))?;
            let verification = EntryVerification::of(credential, now);
            match verification.state {
                ValidityState::Valid { .. } => report.valid += 1,
                ValidityState::Expired { .. } => report.expired += 1,
                ValidityState::NotYetValid { .. } => report.not_yet_valid += 1,
            }
            report.entries.push(verification);
        }
        Ok(report)
    }
}

/// Serializes `credentials` as a keystore of `store_type` protected by `password`.
pub(crate) fn encode_entries<'a>(
    store_type: StoreType,
    credentials: impl IntoIterator<Item = &'a Credential>,
    password: &str,
) -> Result<Vec<u8>> {
    match store_type {
        StoreType::Jks => jks::encode(credentials, password),
        StoreType::Pkcs12 => pkcs12::encode(credentials, password),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
    use crate::cert::{CertificateWithPrivateKey, SignatureAlgorithm};

    fn self_signed(cn: &str, validity: Validity) -> CertificateWithPrivateKey {
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

    fn expired() -> Validity {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        Validity {
            not_before: now - Duration::days(40),
            not_after: now - Duration::days(1),
        }
    }

    #[test]
    fn test_derived_status() {
        let now = OffsetDateTime::now_utc();
        let soon = self_signed("soon", Validity::for_days(10).unwrap());
        assert!(matches!(
            DerivedStatus::at(&soon.cert, now),
            DerivedStatus::ExpiringSoon { days_remaining } if (9..=10).contains(&days_remaining)
        ));
        let later = self_signed("later", Validity::for_days(40).unwrap());
        assert_eq!(DerivedStatus::at(&later.cert, now), DerivedStatus::Valid);
        let past = self_signed("past", expired());
        assert_eq!(DerivedStatus::at(&past.cert, now), DerivedStatus::Expired);
    }

    #[test]
    fn test_duplicate_alias_requires_replace() {
        let mut store = CredentialStore::new(StoreType::Jks);
        let a = self_signed("a", Validity::for_days(100).unwrap());
        let b = self_signed("b", Validity::for_days(100).unwrap());
        store
            .add_trusted_certificate("ca", a.cert.clone(), false)
            .unwrap();
        assert_eq!(
            store.add_trusted_certificate("ca", b.cert.clone(), false),
            Err(CertDeskError::DuplicateAlias("ca".to_string()))
        );
        assert_eq!(store.get("ca").unwrap().certificate(), &a.cert);
        store.add_trusted_certificate("ca", b.cert.clone(), true).unwrap();
        assert_eq!(store.get("ca").unwrap().certificate(), &b.cert);
        // Aliases are case-sensitive.
        store.add_trusted_certificate("CA", a.cert, false).unwrap();
        assert_eq!(store.aliases(), vec!["CA", "ca"]);
    }

    #[test]
    fn test_key_entry_preconditions() {
        let mut store = CredentialStore::new(StoreType::Pkcs12);
        store.set_password("secret");
        let a = self_signed("a", Validity::for_days(100).unwrap());
        let b = self_signed("b", Validity::for_days(100).unwrap());

        let err = store
            .add_key_entry("k", a.key.clone(), vec![], None, false)
            .unwrap_err();
        assert!(matches!(err, CertDeskError::InvalidConfig { field, .. } if field == "chain"));

        let err = store
            .add_key_entry("k", a.key.clone(), vec![b.cert.clone()], None, false)
            .unwrap_err();
        assert!(matches!(err, CertDeskError::InvalidConfig { field, .. } if field == "chain"));

        let err = store
            .add_key_entry("k", a.key.clone(), vec![a.cert.clone()], Some("other"), false)
            .unwrap_err();
        assert!(
            matches!(err, CertDeskError::InvalidConfig { field, .. } if field == "entryPassword")
        );

        store
            .add_key_entry("k", a.key.clone(), vec![a.cert.clone()], Some("secret"), false)
            .unwrap();
        let entry = store.get("k").unwrap();
        assert!(entry.is_key_entry());
        assert_eq!(entry.private_key(), Some(&a.key));
    }

    #[test]
    fn test_delete_missing_alias() {
        let mut store = CredentialStore::new(StoreType::Jks);
        let a = self_signed("a", Validity::for_days(100).unwrap());
        store.add_trusted_certificate("a", a.cert, false).unwrap();
        assert_eq!(
            store.delete_entry("b"),
            Err(CertDeskError::AliasNotFound("b".to_string()))
        );
        assert_eq!(store.aliases(), vec!["a"]);
        store.delete_entry("a").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_summary_and_verification() {
        let mut store = CredentialStore::new(StoreType::Jks);
        for (alias, validity) in [
            ("expired", expired()),
            ("soon", Validity::for_days(5).unwrap()),
            ("notice", Validity::for_days(60).unwrap()),
            ("fine", Validity::for_days(365).unwrap()),
        ] {
            let pair = self_signed(alias, validity);
            store.add_trusted_certificate(alias, pair.cert, false).unwrap();
        }
        assert_eq!(
            store.summary(),
            StoreSummary {
                total: 4,
                expired: 1,
                expiring_soon: 1,
            }
        );
        let listed: Vec<_> = store
            .list_entries()
            .iter()
            .map(|e| e.credential.alias().to_string())
            .collect();
        assert_eq!(listed, vec!["expired", "fine", "notice", "soon"]);

        let report = store
            .verify_entries(&["soon", "notice", "fine", "expired"])
            .unwrap();
        assert_eq!((report.valid, report.expired, report.not_yet_valid), (3, 1, 0));
        let notices: Vec<_> = report.entries.iter().map(|e| e.notice).collect();
        assert_eq!(
            notices,
            vec![
                Some(ExpiryNotice::Warning),
                Some(ExpiryNotice::Notice),
                None,
                None
            ]
        );
        assert!(report.entries.iter().all(|e| e.self_signed));
        assert_eq!(report.entries[0].signature_algorithm, "Ed25519");

        assert!(matches!(
            store.verify_entries(&["missing"]),
            Err(CertDeskError::AliasNotFound(_))
        ));
    }

    #[test]
    fn test_store_type_from_extension() {
        assert_eq!(StoreType::from_extension("p12"), StoreType::Pkcs12);
        assert_eq!(StoreType::from_extension(".PFX"), StoreType::Pkcs12);
        assert_eq!(StoreType::from_extension("jks"), StoreType::Jks);
        assert_eq!(StoreType::from_extension("keystore"), StoreType::Jks);
    }
}
