//! Directory gateway: DN construction, idempotent writes,
//! conformance-aware search and entry counting.

use {
    super::{
        pool::{LdapHandle, LdapPool},
        DirectoryError, LdapKind, RC_ALREADY_EXISTS, RC_NO_SUCH_OBJECT,
    },
    crate::{
        store::{CertType, CertificateRecord, CrlRecord, TypeCounts},
        x509::{normalize_dn, CertificateInfo},
    },
    ldap3::{Scope, SearchEntry},
    std::collections::{HashMap, HashSet},
    tracing::{debug, info, warn},
};

/// Entry tallies from a full directory scan.
#[derive(Clone, Debug, Default)]
pub struct DirectoryCounts {
    pub counts:        TypeCounts,
    pub total_entries: i64,
    pub by_country:    HashMap<String, TypeCounts>,
}

/// Conformance annotation found in the `dc=nc-data` branch.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct DscConformance {
    pub code:        Option<String>,
    pub text:        Option<String>,
    pub pkd_version: Option<String>,
}

pub struct DirectoryGateway {
    pool:    LdapPool,
    base_dn: String,
}

impl DirectoryGateway {
    pub fn new(pool: LdapPool, base_dn: &str) -> Self {
        Self {
            pool,
            base_dn: base_dn.to_string(),
        }
    }

    /// Open a session holding one pooled connection; all lookups of one
    /// request reuse it, giving the request a consistent directory view.
    pub fn session(&self) -> Result<DirectorySession<'_>, DirectoryError> {
        Ok(DirectorySession {
            gateway: self,
            handle:  self.pool.acquire()?,
        })
    }

    // --- DN construction (pure) ---

    fn container(&self, conformant: bool) -> String {
        if conformant {
            format!("dc=data,{}", self.base_dn)
        } else {
            format!("dc=nc-data,{}", self.base_dn)
        }
    }

    pub fn country_dn(&self, country: &str, conformant: bool) -> String {
        format!("c={},{}", country, self.container(conformant))
    }

    pub fn kind_dn(&self, kind: LdapKind, country: &str, conformant: bool) -> String {
        format!("o={},{}", kind.as_str(), self.country_dn(country, conformant))
    }

    /// Leaf DN for a certificate: `cn=<fp>,o=<kind>,c=<CC>,<container>`.
    pub fn certificate_dn(&self, cert_type: CertType, country: &str, fingerprint: &str) -> String {
        let conformant = cert_type != CertType::DscNc;
        format!(
            "cn={},{}",
            fingerprint,
            self.kind_dn(LdapKind::for_cert_type(cert_type), country, conformant)
        )
    }

    /// Leaf DN for a CRL; the `cn` uses the fingerprint prefix.
    pub fn crl_dn(&self, country: &str, fingerprint: &str) -> String {
        let cn = &fingerprint[..fingerprint.len().min(32)];
        format!("cn={},{}", cn, self.kind_dn(LdapKind::Crl, country, true))
    }

    /// Attribute one directory entry to `(kind, country)` from its DN,
    /// relative to the given container.
    fn attribute_entry(dn: &str) -> Option<(LdapKind, String)> {
        let mut kind = None;
        let mut country = None;
        for rdn in dn.split(',') {
            let rdn = rdn.trim();
            if let Some(value) = rdn.strip_prefix("o=").or_else(|| rdn.strip_prefix("O=")) {
                if kind.is_none() {
                    kind = LdapKind::parse(&value.to_lowercase());
                }
            } else if let Some(value) = rdn.strip_prefix("c=").or_else(|| rdn.strip_prefix("C="))
            {
                if country.is_none() {
                    country = Some(value.to_uppercase());
                }
            }
        }
        Some((kind?, country?))
    }
}

/// One pooled connection plus the gateway's DN logic; lives for the span
/// of a request or a reconciliation batch.
pub struct DirectorySession<'a> {
    gateway: &'a DirectoryGateway,
    handle:  LdapHandle<'a>,
}

type Attrs = Vec<(Vec<u8>, HashSet<Vec<u8>>)>;

fn attr(name: &str, values: &[&[u8]]) -> (Vec<u8>, HashSet<Vec<u8>>) {
    (
        name.as_bytes().to_vec(),
        values.iter().map(|v| v.to_vec()).collect(),
    )
}

impl DirectorySession<'_> {
    pub fn gateway(&self) -> &DirectoryGateway {
        self.gateway
    }

    fn search_entries(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>, DirectoryError> {
        let outcome = self
            .handle
            .search(base, scope, filter, attrs.to_vec())
            .map_err(|e| self.fail(e))?
            .success();
        match outcome {
            Ok((entries, _)) => Ok(entries.into_iter().map(SearchEntry::construct).collect()),
            Err(e) => {
                let error = DirectoryError::from(e);
                if matches!(error, DirectoryError::Operation { rc: RC_NO_SUCH_OBJECT, .. }) {
                    Ok(Vec::new())
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Transport-level failure: poison the pooled connection so it is
    /// re-bound instead of reused.
    fn fail(&mut self, error: ldap3::LdapError) -> DirectoryError {
        self.handle.mark_unhealthy();
        DirectoryError::from(error)
    }

    /// `SCOPE_BASE` existence probe.
    pub fn entry_exists(&mut self, dn: &str) -> Result<bool, DirectoryError> {
        let entries = self.search_entries(dn, Scope::Base, "(objectClass=*)", &["1.1"])?;
        Ok(!entries.is_empty())
    }

    fn add_entry(&mut self, dn: &str, attrs: Attrs) -> Result<bool, DirectoryError> {
        let outcome = self.handle.add(dn, attrs).map_err(|e| self.fail(e))?.success();
        match outcome {
            Ok(_) => Ok(true),
            Err(e) => {
                let error = DirectoryError::from(e);
                if matches!(error, DirectoryError::Operation { rc: RC_ALREADY_EXISTS, .. }) {
                    // Idempotent add: an existing entry is success.
                    debug!(%dn, "entry already exists");
                    Ok(false)
                } else {
                    Err(error)
                }
            }
        }
    }

    fn create_entry_if_absent(&mut self, dn: &str, attrs: Attrs) -> Result<(), DirectoryError> {
        if self.entry_exists(dn)? {
            return Ok(());
        }
        self.add_entry(dn, attrs)?;
        debug!(%dn, "created container entry");
        Ok(())
    }

    /// Ensure `c=<CC>` and `o=<kind>` exist under the right container.
    /// Idempotent and safe under concurrent callers: a racing create
    /// collapses into `ALREADY_EXISTS`, which is success.
    pub fn ensure_parent_exists(
        &mut self,
        cert_type: CertType,
        country: &str,
    ) -> Result<(), DirectoryError> {
        let conformant = cert_type != CertType::DscNc;
        let kind = LdapKind::for_cert_type(cert_type);
        self.ensure_parent_kind_exists(kind, country, conformant)
    }

    pub fn ensure_parent_kind_exists(
        &mut self,
        kind: LdapKind,
        country: &str,
        conformant: bool,
    ) -> Result<(), DirectoryError> {
        let country_dn = self.gateway.country_dn(country, conformant);
        self.create_entry_if_absent(&country_dn, vec![
            attr("objectClass", &[b"top", b"country"]),
            attr("c", &[country.as_bytes()]),
        ])?;

        let kind_dn = self.gateway.kind_dn(kind, country, conformant);
        self.create_entry_if_absent(&kind_dn, vec![
            attr("objectClass", &[b"top", b"organization"]),
            attr("o", &[kind.as_str().as_bytes()]),
        ])?;
        Ok(())
    }

    /// Publish a certificate entry. Returns `false` when it already
    /// existed (still success).
    pub fn add_certificate(&mut self, record: &CertificateRecord) -> Result<bool, DirectoryError> {
        self.ensure_parent_exists(record.cert_type, &record.country_code)?;
        let dn = self.gateway.certificate_dn(
            record.cert_type,
            &record.country_code,
            &record.fingerprint_sha256,
        );
        let description = format!(
            "Reconciled: {} | Subject: {} | ID: {}",
            record.cert_type.as_str(),
            record.subject_dn,
            record.id
        );
        let created = self.add_entry(&dn, vec![
            attr("objectClass", &[
                b"top",
                b"person",
                b"organizationalPerson",
                b"inetOrgPerson",
                b"pkdDownload",
            ]),
            attr("cn", &[record.fingerprint_sha256.as_bytes()]),
            attr("sn", &[record.id.as_bytes()]),
            attr("description", &[description.as_bytes()]),
            attr("userCertificate;binary", &[&record.der]),
        ])?;
        if created {
            info!(%dn, "certificate published to directory");
        }
        Ok(created)
    }

    /// Publish a CRL entry. Returns `false` when it already existed.
    pub fn add_crl(&mut self, record: &CrlRecord) -> Result<bool, DirectoryError> {
        self.ensure_parent_kind_exists(LdapKind::Crl, &record.country_code, true)?;
        let dn = self
            .gateway
            .crl_dn(&record.country_code, &record.fingerprint_sha256);
        let cn = &record.fingerprint_sha256[..record.fingerprint_sha256.len().min(32)];
        let created = self.add_entry(&dn, vec![
            attr("objectClass", &[b"top", b"cRLDistributionPoint", b"pkdDownload"]),
            attr("cn", &[cn.as_bytes()]),
            attr("certificateRevocationList;binary", &[&record.der]),
        ])?;
        if created {
            info!(%dn, "CRL published to directory");
        }
        Ok(created)
    }

    /// Delete an entry; a missing entry is not an error.
    pub fn delete_entry(&mut self, dn: &str) -> Result<(), DirectoryError> {
        let outcome = self.handle.delete(dn).map_err(|e| self.fail(e))?.success();
        match outcome {
            Ok(_) => Ok(()),
            Err(e) => {
                let error = DirectoryError::from(e);
                if matches!(error, DirectoryError::Operation { rc: RC_NO_SUCH_OBJECT, .. }) {
                    Ok(())
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Count every PKD entry in both containers, attributing each to a
    /// kind by the first `o=` in its DN. Link certificates count as CSCA;
    /// `dc=nc-data` document signers count as `DSC_NC`.
    pub fn count_entries(&mut self) -> Result<DirectoryCounts, DirectoryError> {
        let mut result = DirectoryCounts::default();

        let data = self.gateway.container(true);
        for entry in
            self.search_entries(&data, Scope::Subtree, "(objectClass=pkdDownload)", &["1.1"])?
        {
            let Some((kind, country)) = DirectoryGateway::attribute_entry(&entry.dn) else {
                continue;
            };
            result.total_entries += 1;
            let per_country = result.by_country.entry(country).or_default();
            match kind {
                LdapKind::Csca | LdapKind::Lc => {
                    result.counts.csca += 1;
                    per_country.csca += 1;
                }
                LdapKind::Dsc => {
                    result.counts.dsc += 1;
                    per_country.dsc += 1;
                }
                LdapKind::Crl => {
                    result.counts.crl += 1;
                    per_country.crl += 1;
                }
                LdapKind::Mlsc => {
                    result.counts.mlsc += 1;
                    per_country.mlsc += 1;
                }
            }
        }

        let nc_data = self.gateway.container(false);
        for entry in self.search_entries(
            &nc_data,
            Scope::Subtree,
            "(objectClass=pkdDownload)",
            &["1.1"],
        )? {
            let Some((kind, country)) = DirectoryGateway::attribute_entry(&entry.dn) else {
                continue;
            };
            if kind == LdapKind::Dsc {
                result.total_entries += 1;
                result.counts.dsc_nc += 1;
                result.by_country.entry(country).or_default().dsc_nc += 1;
            }
        }

        Ok(result)
    }

    fn collect_certificates(
        &mut self,
        base: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError> {
        let entries = self.search_entries(
            base,
            Scope::Subtree,
            "(objectClass=pkdDownload)",
            &["userCertificate;binary"],
        )?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                entry
                    .bin_attrs
                    .get("userCertificate;binary")
                    .and_then(|values| values.first())
                    .cloned()
            })
            .collect())
    }

    /// All CSCAs for a country: the `o=csca` branch plus `o=lc` link
    /// certificates.
    pub fn find_cscas_by_country(&mut self, country: &str) -> Result<Vec<Vec<u8>>, DirectoryError> {
        let mut certs = Vec::new();
        for kind in [LdapKind::Csca, LdapKind::Lc] {
            let base = self.gateway.kind_dn(kind, country, true);
            certs.extend(self.collect_certificates(&base)?);
        }
        debug!(count = certs.len(), %country, "CSCAs loaded from directory");
        Ok(certs)
    }

    /// CSCAs whose subject matches `issuer_dn` under format-independent
    /// comparison.
    pub fn find_cscas_by_issuer(
        &mut self,
        issuer_dn: &str,
        country: &str,
    ) -> Result<Vec<Vec<u8>>, DirectoryError> {
        let needle = normalize_dn(issuer_dn);
        let mut matches = Vec::new();
        for der in self.find_cscas_by_country(country)? {
            match CertificateInfo::from_der(&der) {
                Ok(info) if normalize_dn(&info.subject_dn) == needle => matches.push(der),
                Ok(_) => {}
                Err(error) => warn!(%error, "skipping unparseable directory certificate"),
            }
        }
        Ok(matches)
    }

    /// First DSC found for a country; `dc=data` wins, `dc=nc-data` is the
    /// fallback and flips the non-conformance flag.
    pub fn find_dsc_by_country(
        &mut self,
        country: &str,
    ) -> Result<Option<(Vec<u8>, bool)>, DirectoryError> {
        let data = self.gateway.kind_dn(LdapKind::Dsc, country, true);
        if let Some(der) = self.collect_certificates(&data)?.into_iter().next() {
            return Ok(Some((der, false)));
        }
        let nc = self.gateway.kind_dn(LdapKind::Dsc, country, false);
        Ok(self
            .collect_certificates(&nc)?
            .into_iter()
            .next()
            .map(|der| (der, true)))
    }

    /// Latest CRL published for a country.
    pub fn find_crl_by_country(
        &mut self,
        country: &str,
    ) -> Result<Option<Vec<u8>>, DirectoryError> {
        let base = self.gateway.kind_dn(LdapKind::Crl, country, true);
        let entries = self.search_entries(
            &base,
            Scope::Subtree,
            "(objectClass=pkdDownload)",
            &["certificateRevocationList;binary"],
        )?;
        Ok(entries.into_iter().find_map(|entry| {
            entry
                .bin_attrs
                .get("certificateRevocationList;binary")
                .and_then(|values| values.first())
                .cloned()
        }))
    }

    /// Probe the `dc=nc-data` branch for a DSC fingerprint. A hit means
    /// the DSC was published as non-conformant; the entry's conformance
    /// attributes say why.
    pub fn probe_nc_dsc(
        &mut self,
        country: &str,
        fingerprint: &str,
    ) -> Result<Option<DscConformance>, DirectoryError> {
        let dn = format!(
            "cn={},{}",
            fingerprint,
            self.gateway.kind_dn(LdapKind::Dsc, country, false)
        );
        let entries = self.search_entries(&dn, Scope::Base, "(objectClass=*)", &[
            "pkdConformanceCode",
            "pkdConformanceText",
            "pkdVersion",
        ])?;
        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };
        let first = |name: &str| entry.attrs.get(name).and_then(|v| v.first()).cloned();
        Ok(Some(DscConformance {
            code:        first("pkdConformanceCode"),
            text:        first("pkdConformanceText"),
            pkd_version: first("pkdVersion"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> DirectoryGateway {
        let config = crate::config::LdapConfig {
            host:            "localhost".to_string(),
            port:            389,
            bind_dn:         "cn=admin".to_string(),
            bind_password:   "secret".to_string(),
            base_dn:         "dc=pkd,dc=example,dc=com".to_string(),
            network_timeout: std::time::Duration::from_secs(5),
            pool_size:       2,
        };
        DirectoryGateway::new(LdapPool::new(config.clone()), &config.base_dn)
    }

    #[test]
    fn certificate_dn_layout() {
        let gw = gateway();
        assert_eq!(
            gw.certificate_dn(CertType::Csca, "KR", "abc123"),
            "cn=abc123,o=csca,c=KR,dc=data,dc=pkd,dc=example,dc=com"
        );
        assert_eq!(
            gw.certificate_dn(CertType::DscNc, "KR", "abc123"),
            "cn=abc123,o=dsc,c=KR,dc=nc-data,dc=pkd,dc=example,dc=com"
        );
    }

    #[test]
    fn crl_dn_uses_fingerprint_prefix() {
        let gw = gateway();
        let fingerprint = "0123456789abcdef0123456789abcdef0123456789abcdef";
        let dn = gw.crl_dn("KR", fingerprint);
        assert_eq!(
            dn,
            "cn=0123456789abcdef0123456789abcdef,o=crl,c=KR,dc=data,dc=pkd,dc=example,dc=com"
        );
    }

    #[test]
    fn entry_attribution_from_dn() {
        let (kind, country) = DirectoryGateway::attribute_entry(
            "cn=ff00,o=lc,c=DE,dc=data,dc=pkd,dc=example,dc=com",
        )
        .unwrap();
        assert_eq!(kind, LdapKind::Lc);
        assert_eq!(country, "DE");

        assert!(DirectoryGateway::attribute_entry("c=DE,dc=data,dc=pkd").is_none());
    }
}
