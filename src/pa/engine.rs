//! The Passive Authentication engine.
//!
//! One call verifies one document end to end. No failure inside the
//! pipeline short-circuits the overall return: every failure class lands
//! as a structured field on the persisted verification record, and the
//! engine reports a single top-level status. Persistence always happens,
//! whatever the outcome.

use {
    super::{
        chain::{ChainValidation, ChainValidator},
        messages::{CrlStatus, StatusMessage},
        mrz,
    },
    crate::{
        asn1::SecurityObject,
        crypto,
        ldap::{DscConformance, TrustSource},
        store::{
            AuditLogStore, AuditRecord, CertType, CertificateStore, DataGroupRow,
            NewCertificate, PaVerificationRecord, SourceType, StoreError, VerificationStore,
        },
        x509::CertificateInfo,
    },
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::time::Instant,
    subtle::ConstantTimeEq,
    tracing::{error, info, warn},
};

/// One verification request.
#[derive(Clone, Debug, Default)]
pub struct PaRequest {
    pub sod:             Vec<u8>,
    /// `(dg_number, contents)` pairs, DG1..DG16.
    pub data_groups:     Vec<(u8, Vec<u8>)>,
    pub document_number: Option<String>,
    pub country_code:    Option<String>,
    /// Document signing moment for point-in-time validation. Falls back
    /// to the SOD's signing-time attribute when present.
    pub signing_time:    Option<DateTime<Utc>>,
    pub ip_address:      Option<String>,
    pub user_agent:      Option<String>,
    pub requested_by:    Option<String>,
}

/// Per-data-group verdict returned to the caller.
#[derive(Clone, Debug, Serialize)]
pub struct DataGroupOutcome {
    pub dg_number:  u8,
    pub hash_valid: bool,
    pub expected:   Option<String>,
    pub actual:     String,
}

/// Structured result of one verification.
#[derive(Debug, Serialize)]
pub struct PaOutcome {
    pub verification_id:    Option<String>,
    pub status:             String,
    pub country_code:       String,
    pub document_number:    Option<String>,
    pub chain:              ChainValidation,
    pub sod_signature_valid: bool,
    pub dg_hashes_valid:    bool,
    pub data_groups:        Vec<DataGroupOutcome>,
    pub crl_message:        StatusMessage,
    pub expiration_message: StatusMessage,
    pub dsc_non_conformant: bool,
    pub dsc_conformance:    Option<DscConformance>,
    pub processing_time_ms: i64,
    pub error:              Option<String>,
}

pub struct PaEngine {
    certificates:  CertificateStore,
    verifications: VerificationStore,
    audit:         AuditLogStore,
    validator:     ChainValidator,
}

impl PaEngine {
    pub fn new(
        certificates: CertificateStore,
        verifications: VerificationStore,
        audit: AuditLogStore,
    ) -> Self {
        Self {
            certificates,
            verifications,
            audit,
            validator: ChainValidator::new(),
        }
    }

    /// Pin the chain validator's clock (tests).
    pub fn with_validator(mut self, validator: ChainValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Run the full PA pipeline for one document.
    pub fn verify(
        &self,
        request: &PaRequest,
        trust: &mut dyn TrustSource,
    ) -> Result<PaOutcome, StoreError> {
        let started = Instant::now();
        let outcome = self.run_pipeline(request, trust, started);
        self.audit_outcome(request, &outcome);
        outcome
    }

    fn run_pipeline(
        &self,
        request: &PaRequest,
        trust: &mut dyn TrustSource,
        started: Instant,
    ) -> Result<PaOutcome, StoreError> {
        // MRZ salvage: recover document number and issuing state from DG1
        // when the caller did not supply them.
        let mut document_number = request.document_number.clone().filter(|v| !v.is_empty());
        let mut country_code = request
            .country_code
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(crate::country::normalize_to_alpha2);
        if document_number.is_none() || country_code.is_none() {
            if let Some((_, dg1)) = request.data_groups.iter().find(|(n, _)| *n == 1) {
                let salvage = mrz::salvage_from_dg1(dg1);
                if document_number.is_none() {
                    document_number = salvage.document_number;
                }
                if country_code.is_none() {
                    country_code = salvage.country_code;
                }
            }
        }

        // Step 1: parse the SOD. A malformed SOD is an ERROR outcome, not
        // a refusal; the attempt is still persisted.
        let sod = match SecurityObject::from_bytes(&request.sod) {
            Ok(sod) => sod,
            Err(parse_error) => {
                error!(%parse_error, "SOD parsing failed");
                return self.persist_error(
                    request,
                    started,
                    document_number,
                    country_code.unwrap_or_default(),
                    format!("SOD parsing failed: {parse_error}"),
                );
            }
        };

        // Step 2: extract the DSC.
        let dsc = match CertificateInfo::from_der(sod.dsc_der()) {
            Ok(dsc) => dsc,
            Err(parse_error) => {
                error!(%parse_error, "DSC does not parse");
                return self.persist_error(
                    request,
                    started,
                    document_number,
                    country_code.unwrap_or_default(),
                    format!("DSC parsing failed: {parse_error}"),
                );
            }
        };

        let effective_country = country_code
            .or_else(|| dsc.country_for_kind(false))
            .unwrap_or_default();

        // Conformance probe: a hit in dc=nc-data flags the DSC with the
        // portal-provided code and text.
        let dsc_conformance = trust
            .probe_nc_dsc(&effective_country, &dsc.fingerprint_sha256)
            .unwrap_or_else(|probe_error| {
                warn!(%probe_error, "nc-data conformance probe failed");
                None
            });

        // Step 3: auto-register a previously unseen DSC. LDAP publication
        // is deferred to the reconciliation engine.
        let registered_dsc = self.auto_register_dsc(&dsc, &effective_country);

        // Step 4: chain validation.
        let signing_time = request.signing_time.or_else(|| sod.signing_time());
        let chain = self.validator.validate(
            &dsc,
            Some(&effective_country).filter(|c| !c.is_empty()).map(String::as_str),
            signing_time,
            trust,
        );
        if let (Some(cert_id), true) = (&registered_dsc, chain.csca_found) {
            let _ = self.certificates.write_validation_result(
                &crate::store::ValidationOutcomeRow {
                    certificate_id:        cert_id.clone(),
                    trust_chain_valid:     chain.chain_valid,
                    csca_found:            chain.csca_found,
                    validity_period_valid: !chain.dsc_expired,
                    revocation_status:     match chain.crl_status {
                        CrlStatus::Valid => crate::store::RevocationStatus::Good,
                        CrlStatus::Revoked => crate::store::RevocationStatus::Revoked,
                        _ => crate::store::RevocationStatus::Unknown,
                    },
                },
            );
        }

        // Step 5: SOD signature under the DSC alone; the chain was
        // validated separately above.
        let sod_signature_valid = match sod.verify_signature() {
            Ok(()) => true,
            Err(signature_error) => {
                warn!(%signature_error, "SOD signature verification failed");
                false
            }
        };

        // Step 6: per-data-group hashes under the LDS hash algorithm,
        // compared in constant time.
        let hash_algorithm = sod.lds_security_object().hash_algorithm_name();
        let mut data_groups = Vec::new();
        let mut dg_rows = Vec::new();
        let mut dg_hashes_valid = true;
        for (dg_number, contents) in &request.data_groups {
            let expected = sod.lds_security_object().hash_for_dg(*dg_number);
            let actual = crypto::digest_by_name(hash_algorithm, contents)
                .unwrap_or_default();
            let hash_valid = expected
                .map(|expected| bool::from(expected.ct_eq(&actual)))
                .unwrap_or(false);
            dg_hashes_valid &= hash_valid;
            data_groups.push(DataGroupOutcome {
                dg_number:  *dg_number,
                hash_valid,
                expected:   expected.map(hex::encode),
                actual:     hex::encode(&actual),
            });
            dg_rows.push(DataGroupRow {
                verification_id: String::new(),
                dg_number:       i64::from(*dg_number),
                expected_hash:   expected.map(hex::encode),
                actual_hash:     Some(hex::encode(&actual)),
                hash_algorithm:  Some(hash_algorithm.to_string()),
                hash_valid,
                dg_binary:       Some(contents.clone()),
            });
        }

        // Overall verdict: valid only when the chain holds, the SOD
        // signature verifies, every DG hash matches and nothing is
        // revoked.
        let valid =
            chain.chain_valid && sod_signature_valid && dg_hashes_valid && !chain.revoked;
        let status = if valid { "VALID" } else { "INVALID" };
        let processing_time_ms = started.elapsed().as_millis() as i64;

        // Step 7: persist the verification and its data group results.
        let record = PaVerificationRecord {
            id: String::new(),
            issuing_country: chain.country_code.clone(),
            document_number: document_number.clone(),
            sod_binary: request.sod.clone(),
            sod_hash: crypto::sha256_hex(&request.sod),
            verification_status: status.to_string(),
            dsc_subject: Some(chain.dsc_subject.clone()),
            dsc_serial_number: Some(chain.dsc_serial_number.clone()),
            dsc_issuer: Some(chain.dsc_issuer.clone()),
            dsc_expired: chain.dsc_expired,
            csca_subject: chain.csca_subject.clone(),
            csca_serial_number: chain.csca_serial_number.clone(),
            csca_expired: chain.csca_expired,
            trust_chain_valid: chain.chain_valid,
            sod_signature_valid,
            dg_hashes_valid,
            crl_checked: chain.crl_checked,
            revoked: chain.revoked,
            crl_status: Some(chain.crl_status.as_str().to_string()),
            expiration_status: Some(chain.expiration_status.as_str().to_string()),
            validation_errors: chain.validation_errors.clone(),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
            processing_time_ms,
            request_timestamp: None,
        };
        let verification_id = self.verifications.insert(&record, &dg_rows)?;

        info!(
            %verification_id,
            status,
            country = %chain.country_code,
            "PA verification completed"
        );

        Ok(PaOutcome {
            verification_id: Some(verification_id),
            status: status.to_string(),
            country_code: chain.country_code.clone(),
            document_number,
            crl_message: chain.crl_status.message(),
            expiration_message: chain.expiration_status.message(),
            chain,
            sod_signature_valid,
            dg_hashes_valid,
            data_groups,
            dsc_non_conformant: dsc_conformance.is_some(),
            dsc_conformance,
            processing_time_ms,
            error: None,
        })
    }

    /// Insert an unknown DSC with `sourceType = PA_EXTRACTED` and
    /// `storedInLdap = false`; reconciliation publishes it later.
    fn auto_register_dsc(&self, dsc: &CertificateInfo, country: &str) -> Option<String> {
        match self
            .certificates
            .get_by_fingerprint(CertType::Dsc, &dsc.fingerprint_sha256)
        {
            Ok(Some(existing)) => Some(existing.id),
            Ok(None) => {
                let new_cert = NewCertificate::from_parsed(
                    CertType::Dsc,
                    dsc,
                    SourceType::PaExtracted,
                    (!country.is_empty()).then_some(country),
                );
                match self.certificates.put(&new_cert, &Default::default()) {
                    Ok(outcome) => {
                        info!(
                            fingerprint = %dsc.fingerprint_sha256,
                            "DSC auto-registered from SOD"
                        );
                        Some(outcome.id().to_string())
                    }
                    Err(store_error) => {
                        warn!(%store_error, "DSC auto-registration failed");
                        None
                    }
                }
            }
            Err(store_error) => {
                warn!(%store_error, "DSC lookup failed during auto-registration");
                None
            }
        }
    }

    fn persist_error(
        &self,
        request: &PaRequest,
        started: Instant,
        document_number: Option<String>,
        country_code: String,
        message: String,
    ) -> Result<PaOutcome, StoreError> {
        let processing_time_ms = started.elapsed().as_millis() as i64;
        let record = PaVerificationRecord {
            id: String::new(),
            issuing_country: country_code.clone(),
            document_number: document_number.clone(),
            sod_binary: request.sod.clone(),
            sod_hash: crypto::sha256_hex(&request.sod),
            verification_status: "ERROR".to_string(),
            dsc_subject: None,
            dsc_serial_number: None,
            dsc_issuer: None,
            dsc_expired: false,
            csca_subject: None,
            csca_serial_number: None,
            csca_expired: false,
            trust_chain_valid: false,
            sod_signature_valid: false,
            dg_hashes_valid: false,
            crl_checked: false,
            revoked: false,
            crl_status: Some(CrlStatus::NotChecked.as_str().to_string()),
            expiration_status: None,
            validation_errors: Some(message.clone()),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
            processing_time_ms,
            request_timestamp: None,
        };
        let verification_id = self.verifications.insert(&record, &[])?;

        Ok(PaOutcome {
            verification_id: Some(verification_id),
            status: "ERROR".to_string(),
            country_code,
            document_number,
            chain: ChainValidation::default(),
            sod_signature_valid: false,
            dg_hashes_valid: false,
            data_groups: Vec::new(),
            crl_message: CrlStatus::NotChecked.message(),
            expiration_message: super::messages::ExpirationStatus::Valid.message(),
            dsc_non_conformant: false,
            dsc_conformance: None,
            processing_time_ms,
            error: Some(message),
        })
    }

    fn audit_outcome(&self, request: &PaRequest, outcome: &Result<PaOutcome, StoreError>) {
        let mut audit = AuditRecord::new("PA_VERIFY");
        audit.subject = request.requested_by.clone();
        audit.ip_address = request.ip_address.clone();
        match outcome {
            Ok(result) => {
                audit.success = result.status == "VALID";
                audit.duration_ms = result.processing_time_ms;
                audit.error_message = result.error.clone();
                audit.metadata = Some(serde_json::json!({
                    "status": result.status,
                    "country": result.country_code,
                    "verificationId": result.verification_id,
                    "dataGroups": result.data_groups.len(),
                }));
            }
            Err(store_error) => {
                audit.success = false;
                audit.error_message = Some(store_error.to_string());
            }
        }
        self.audit.record(&audit);
    }
}
