//! Distinguished Name components and format-independent comparison.
//!
//! DN strings reach this system in at least two spellings: the OpenSSL
//! `oneline` form (`/C=KR/O=Government/CN=CSCA`) and RFC 2253
//! (`CN=CSCA,O=Government,C=KR`). Every comparison goes through
//! [`DnComponents::normalized`], which reduces both to the same canonical
//! string. Callers must never compare DNs by raw string equality.

use {
    crate::asn1::oids,
    der::asn1::{Ia5StringRef, PrintableStringRef, TeletexStringRef, Utf8StringRef},
    x509_cert::name::Name,
};

/// Structured DN attributes, one value per type (first wins).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DnComponents {
    pub common_name:         Option<String>,
    pub organization:        Option<String>,
    pub organizational_unit: Option<String>,
    pub locality:            Option<String>,
    pub state_or_province:   Option<String>,
    pub country:             Option<String>,
    pub email:               Option<String>,
    pub serial_number:       Option<String>,
}

/// Decode a directory string attribute value regardless of its ASN.1
/// string type.
fn any_to_string(value: &der::Any) -> String {
    if let Ok(s) = value.decode_as::<Utf8StringRef>() {
        return s.to_string();
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef>() {
        return s.to_string();
    }
    if let Ok(s) = value.decode_as::<Ia5StringRef>() {
        return s.to_string();
    }
    if let Ok(s) = value.decode_as::<TeletexStringRef>() {
        return s.to_string();
    }
    String::from_utf8_lossy(value.value()).into_owned()
}

impl DnComponents {
    /// Extract components from a parsed X.501 Name.
    pub fn from_name(name: &Name) -> Self {
        let mut components = Self::default();
        for rdn in name.0.iter() {
            for atv in rdn.0.iter() {
                let value = any_to_string(&atv.value);
                let slot = match atv.oid {
                    oids::ID_AT_COMMON_NAME => &mut components.common_name,
                    oids::ID_AT_ORGANIZATION_NAME => &mut components.organization,
                    oids::ID_AT_ORG_UNIT_NAME => &mut components.organizational_unit,
                    oids::ID_AT_LOCALITY_NAME => &mut components.locality,
                    oids::ID_AT_STATE_NAME => &mut components.state_or_province,
                    oids::ID_AT_COUNTRY_NAME => &mut components.country,
                    oids::ID_EMAIL_ADDRESS => &mut components.email,
                    oids::ID_AT_SERIAL_NUMBER => &mut components.serial_number,
                    _ => continue,
                };
                if slot.is_none() {
                    *slot = Some(value);
                }
            }
        }
        components
    }

    /// Parse a DN string in either `oneline` or RFC 2253 format.
    pub fn parse(dn: &str) -> Self {
        let mut components = Self::default();
        let parts: Vec<&str> = if dn.starts_with('/') {
            dn.split('/').collect()
        } else {
            split_unescaped(dn, ',')
        };

        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let value = value.trim().replace("\\,", ",");
            if value.is_empty() {
                continue;
            }
            let slot = match key.trim().to_ascii_uppercase().as_str() {
                "CN" => &mut components.common_name,
                "O" => &mut components.organization,
                "OU" => &mut components.organizational_unit,
                "L" => &mut components.locality,
                "ST" | "S" => &mut components.state_or_province,
                "C" => &mut components.country,
                "E" | "EMAILADDRESS" => &mut components.email,
                "SERIALNUMBER" => &mut components.serial_number,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        components
    }

    pub fn is_empty(&self) -> bool {
        self.common_name.is_none()
            && self.organization.is_none()
            && self.organizational_unit.is_none()
            && self.locality.is_none()
            && self.state_or_province.is_none()
            && self.country.is_none()
            && self.email.is_none()
            && self.serial_number.is_none()
    }

    /// Canonical comparison form: `c=..|o=..|ou=..|cn=..|sn=..|`, lowercase.
    ///
    /// The `oneline` and RFC 2253 spellings of the same DN normalize to the
    /// same string.
    pub fn normalized(&self) -> String {
        let mut out = String::new();
        let mut push = |prefix: &str, value: &Option<String>| {
            if let Some(v) = value {
                out.push_str(prefix);
                out.push('=');
                out.push_str(v);
                out.push('|');
            }
        };
        push("c", &self.country);
        push("o", &self.organization);
        push("ou", &self.organizational_unit);
        push("cn", &self.common_name);
        push("sn", &self.serial_number);
        out.to_lowercase()
    }

    /// RFC 2253-ordered display string.
    pub fn to_rfc2253(&self) -> String {
        let mut parts = Vec::new();
        let mut add = |name: &str, value: &Option<String>| {
            if let Some(v) = value {
                parts.push(format!("{name}={v}"));
            }
        };
        add("CN", &self.common_name);
        add("OU", &self.organizational_unit);
        add("O", &self.organization);
        add("L", &self.locality);
        add("ST", &self.state_or_province);
        add("C", &self.country);
        add("emailAddress", &self.email);
        add("serialNumber", &self.serial_number);
        parts.join(",")
    }

    /// Human-facing label: CN, then O, then email, then "Unknown".
    pub fn display_name(&self) -> &str {
        self.common_name
            .as_deref()
            .or(self.organization.as_deref())
            .or(self.email.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Normalize a DN string for comparison, whatever its format.
pub fn normalize_dn(dn: &str) -> String {
    let components = DnComponents::parse(dn);
    if components.is_empty() {
        // Unparseable input still gets a deterministic comparison form.
        return dn.to_lowercase();
    }
    components.normalized()
}

fn split_unescaped(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut previous_was_escape = false;
    for (index, ch) in input.char_indices() {
        if ch == separator && !previous_was_escape {
            parts.push(&input[start..index]);
            start = index + ch.len_utf8();
        }
        previous_was_escape = ch == '\\' && !previous_was_escape;
    }
    parts.push(&input[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oneline_and_rfc2253_normalize_equal() {
        let oneline = normalize_dn("/C=KR/O=Government of Korea/CN=CSCA-KOREA");
        let rfc2253 = normalize_dn("CN=CSCA-KOREA,O=Government of Korea,C=KR");
        assert_eq!(oneline, rfc2253);
        assert_eq!(oneline, "c=kr|o=government of korea|cn=csca-korea|");
    }

    #[test]
    fn case_differences_normalize_equal() {
        assert_eq!(
            normalize_dn("cn=Signer 7,o=Gov,c=kr"),
            normalize_dn("CN=SIGNER 7,O=GOV,C=KR"),
        );
    }

    #[test]
    fn escaped_comma_stays_in_value() {
        let dn = DnComponents::parse("CN=Printing\\, Works,O=Gov,C=KR");
        assert_eq!(dn.common_name.as_deref(), Some("Printing, Works"));
        assert_eq!(dn.organization.as_deref(), Some("Gov"));
    }

    #[test]
    fn display_name_priority() {
        let mut dn = DnComponents::parse("O=Gov,C=KR");
        assert_eq!(dn.display_name(), "Gov");
        dn.organization = None;
        assert_eq!(dn.display_name(), "Unknown");
    }
}
