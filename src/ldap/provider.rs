//! Trust material providers for chain validation.
//!
//! The chain validator depends on this small capability set, not on LDAP:
//! the directory session is the production implementation, an in-memory
//! map serves tests and offline tooling. Certificates cross the boundary
//! as DER bytes and are re-parsed by the consumer.

use {
    super::{gateway::DscConformance, DirectoryError, DirectorySession},
    crate::x509::{normalize_dn, CertificateInfo},
    std::collections::HashMap,
};

pub trait TrustSource {
    /// CSCAs whose subject matches the issuer DN (format-independent).
    fn find_cscas_by_issuer(
        &mut self,
        issuer_dn: &str,
        country: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError>;

    /// Every CSCA (including link certificates) for a country.
    fn find_all_cscas_by_country(
        &mut self,
        country: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError>;

    /// The country's current CRL, if one is published.
    fn find_crl_by_country(&mut self, country: &str)
        -> Result<Option<Vec<u8>>, DirectoryError>;

    /// Probe the non-conformant branch for a DSC fingerprint. Sources
    /// without an nc branch report a clean result.
    fn probe_nc_dsc(
        &mut self,
        _country: &str,
        _fingerprint: &str,
    ) -> Result<Option<DscConformance>, DirectoryError> {
        Ok(None)
    }
}

impl TrustSource for DirectorySession<'_> {
    fn find_cscas_by_issuer(
        &mut self,
        issuer_dn: &str,
        country: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError> {
        DirectorySession::find_cscas_by_issuer(self, issuer_dn, country)
    }

    fn find_all_cscas_by_country(
        &mut self,
        country: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError> {
        self.find_cscas_by_country(country)
    }

    fn find_crl_by_country(
        &mut self,
        country: &str,
    ) -> Result<Option<Vec<u8>>, DirectoryError> {
        DirectorySession::find_crl_by_country(self, country)
    }

    fn probe_nc_dsc(
        &mut self,
        country: &str,
        fingerprint: &str,
    ) -> Result<Option<DscConformance>, DirectoryError> {
        DirectorySession::probe_nc_dsc(self, country, fingerprint)
    }
}

/// In-memory trust source keyed by country.
#[derive(Clone, Debug, Default)]
pub struct MemoryTrustSource {
    cscas:   HashMap<String, Vec<Vec<u8>>>,
    crls:    HashMap<String, Vec<u8>>,
    nc_dscs: HashMap<String, DscConformance>,
}

impl MemoryTrustSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_csca(&mut self, country: &str, der: Vec<u8>) {
        self.cscas
            .entry(country.to_uppercase())
            .or_default()
            .push(der);
    }

    pub fn set_crl(&mut self, country: &str, der: Vec<u8>) {
        self.crls.insert(country.to_uppercase(), der);
    }

    pub fn remove_country(&mut self, country: &str) {
        self.cscas.remove(&country.to_uppercase());
        self.crls.remove(&country.to_uppercase());
    }

    /// Mark a DSC fingerprint as published non-conformant.
    pub fn set_nc_dsc(&mut self, fingerprint: &str, info: DscConformance) {
        self.nc_dscs.insert(fingerprint.to_lowercase(), info);
    }
}

impl TrustSource for MemoryTrustSource {
    fn find_cscas_by_issuer(
        &mut self,
        issuer_dn: &str,
        country: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError> {
        let needle = normalize_dn(issuer_dn);
        Ok(self
            .cscas
            .get(&country.to_uppercase())
            .map(|ders| {
                ders.iter()
                    .filter(|der| {
                        CertificateInfo::from_der(der)
                            .is_ok_and(|info| normalize_dn(&info.subject_dn) == needle)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_all_cscas_by_country(
        &mut self,
        country: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError> {
        Ok(self
            .cscas
            .get(&country.to_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    fn find_crl_by_country(
        &mut self,
        country: &str,
    ) -> Result<Option<Vec<u8>>, DirectoryError> {
        Ok(self.crls.get(&country.to_uppercase()).cloned())
    }

    fn probe_nc_dsc(
        &mut self,
        _country: &str,
        fingerprint: &str,
    ) -> Result<Option<DscConformance>, DirectoryError> {
        Ok(self.nc_dscs.get(&fingerprint.to_lowercase()).cloned())
    }
}
