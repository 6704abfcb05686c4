//! ISO 3166-1 country code handling.
//!
//! MRZs carry alpha-3 codes (ICAO 9303-3 uses a superset of ISO 3166-1);
//! the PKD directory tree and the relational store key everything by
//! alpha-2. `normalize_to_alpha2` accepts either form.

/// Map an ISO 3166-1 alpha-3 code to alpha-2, case insensitive.
///
/// Returns `None` for unknown codes, including ICAO-specific organization
/// codes (`UNO`, `UNA`, ...) which have no alpha-2 equivalent.
pub fn alpha3_to_alpha2(alpha3: &str) -> Option<&'static str> {
    let upper = alpha3.trim().to_ascii_uppercase();
    Some(match upper.as_str() {
        "ABW" => "AW",
        "AFG" => "AF",
        "AGO" => "AO",
        "AIA" => "AI",
        "ALA" => "AX",
        "ALB" => "AL",
        "AND" => "AD",
        "ARE" => "AE",
        "ARG" => "AR",
        "ARM" => "AM",
        "ASM" => "AS",
        "ATA" => "AQ",
        "ATF" => "TF",
        "ATG" => "AG",
        "AUS" => "AU",
        "AUT" => "AT",
        "AZE" => "AZ",
        "BDI" => "BI",
        "BEL" => "BE",
        "BEN" => "BJ",
        "BES" => "BQ",
        "BFA" => "BF",
        "BGD" => "BD",
        "BGR" => "BG",
        "BHR" => "BH",
        "BHS" => "BS",
        "BIH" => "BA",
        "BLM" => "BL",
        "BLR" => "BY",
        "BLZ" => "BZ",
        "BMU" => "BM",
        "BOL" => "BO",
        "BRA" => "BR",
        "BRB" => "BB",
        "BRN" => "BN",
        "BTN" => "BT",
        "BVT" => "BV",
        "BWA" => "BW",
        "CAF" => "CF",
        "CAN" => "CA",
        "CCK" => "CC",
        "CHE" => "CH",
        "CHL" => "CL",
        "CHN" => "CN",
        "CIV" => "CI",
        "CMR" => "CM",
        "COD" => "CD",
        "COG" => "CG",
        "COK" => "CK",
        "COL" => "CO",
        "COM" => "KM",
        "CPV" => "CV",
        "CRI" => "CR",
        "CUB" => "CU",
        "CUW" => "CW",
        "CXR" => "CX",
        "CYM" => "KY",
        "CYP" => "CY",
        "CZE" => "CZ",
        "DEU" | "D" => "DE",
        "DJI" => "DJ",
        "DMA" => "DM",
        "DNK" => "DK",
        "DOM" => "DO",
        "DZA" => "DZ",
        "ECU" => "EC",
        "EGY" => "EG",
        "ERI" => "ER",
        "ESH" => "EH",
        "ESP" => "ES",
        "EST" => "EE",
        "ETH" => "ET",
        "FIN" => "FI",
        "FJI" => "FJ",
        "FLK" => "FK",
        "FRA" => "FR",
        "FRO" => "FO",
        "FSM" => "FM",
        "GAB" => "GA",
        "GBR" => "GB",
        "GEO" => "GE",
        "GGY" => "GG",
        "GHA" => "GH",
        "GIB" => "GI",
        "GIN" => "GN",
        "GLP" => "GP",
        "GMB" => "GM",
        "GNB" => "GW",
        "GNQ" => "GQ",
        "GRC" => "GR",
        "GRD" => "GD",
        "GRL" => "GL",
        "GTM" => "GT",
        "GUF" => "GF",
        "GUM" => "GU",
        "GUY" => "GY",
        "HKG" => "HK",
        "HMD" => "HM",
        "HND" => "HN",
        "HRV" => "HR",
        "HTI" => "HT",
        "HUN" => "HU",
        "IDN" => "ID",
        "IMN" => "IM",
        "IND" => "IN",
        "IOT" => "IO",
        "IRL" => "IE",
        "IRN" => "IR",
        "IRQ" => "IQ",
        "ISL" => "IS",
        "ISR" => "IL",
        "ITA" => "IT",
        "JAM" => "JM",
        "JEY" => "JE",
        "JOR" => "JO",
        "JPN" => "JP",
        "KAZ" => "KZ",
        "KEN" => "KE",
        "KGZ" => "KG",
        "KHM" => "KH",
        "KIR" => "KI",
        "KNA" => "KN",
        "KOR" => "KR",
        "KWT" => "KW",
        "LAO" => "LA",
        "LBN" => "LB",
        "LBR" => "LR",
        "LBY" => "LY",
        "LCA" => "LC",
        "LIE" => "LI",
        "LKA" => "LK",
        "LSO" => "LS",
        "LTU" => "LT",
        "LUX" => "LU",
        "LVA" => "LV",
        "MAC" => "MO",
        "MAF" => "MF",
        "MAR" => "MA",
        "MCO" => "MC",
        "MDA" => "MD",
        "MDG" => "MG",
        "MDV" => "MV",
        "MEX" => "MX",
        "MHL" => "MH",
        "MKD" => "MK",
        "MLI" => "ML",
        "MLT" => "MT",
        "MMR" => "MM",
        "MNE" => "ME",
        "MNG" => "MN",
        "MNP" => "MP",
        "MOZ" => "MZ",
        "MRT" => "MR",
        "MSR" => "MS",
        "MTQ" => "MQ",
        "MUS" => "MU",
        "MWI" => "MW",
        "MYS" => "MY",
        "MYT" => "YT",
        "NAM" => "NA",
        "NCL" => "NC",
        "NER" => "NE",
        "NFK" => "NF",
        "NGA" => "NG",
        "NIC" => "NI",
        "NIU" => "NU",
        "NLD" => "NL",
        "NOR" => "NO",
        "NPL" => "NP",
        "NRU" => "NR",
        "NZL" => "NZ",
        "OMN" => "OM",
        "PAK" => "PK",
        "PAN" => "PA",
        "PCN" => "PN",
        "PER" => "PE",
        "PHL" => "PH",
        "PLW" => "PW",
        "PNG" => "PG",
        "POL" => "PL",
        "PRI" => "PR",
        "PRK" => "KP",
        "PRT" => "PT",
        "PRY" => "PY",
        "PSE" => "PS",
        "PYF" => "PF",
        "QAT" => "QA",
        "REU" => "RE",
        "ROU" => "RO",
        "RUS" => "RU",
        "RWA" => "RW",
        "SAU" => "SA",
        "SDN" => "SD",
        "SEN" => "SN",
        "SGP" => "SG",
        "SGS" => "GS",
        "SHN" => "SH",
        "SJM" => "SJ",
        "SLB" => "SB",
        "SLE" => "SL",
        "SLV" => "SV",
        "SMR" => "SM",
        "SOM" => "SO",
        "SPM" => "PM",
        "SRB" => "RS",
        "SSD" => "SS",
        "STP" => "ST",
        "SUR" => "SR",
        "SVK" => "SK",
        "SVN" => "SI",
        "SWE" => "SE",
        "SWZ" => "SZ",
        "SXM" => "SX",
        "SYC" => "SC",
        "SYR" => "SY",
        "TCA" => "TC",
        "TCD" => "TD",
        "TGO" => "TG",
        "THA" => "TH",
        "TJK" => "TJ",
        "TKL" => "TK",
        "TKM" => "TM",
        "TLS" => "TL",
        "TON" => "TO",
        "TTO" => "TT",
        "TUN" => "TN",
        "TUR" => "TR",
        "TUV" => "TV",
        "TWN" => "TW",
        "TZA" => "TZ",
        "UGA" => "UG",
        "UKR" => "UA",
        "UMI" => "UM",
        "URY" => "UY",
        "USA" => "US",
        "UZB" => "UZ",
        "VAT" => "VA",
        "VCT" => "VC",
        "VEN" => "VE",
        "VGB" => "VG",
        "VIR" => "VI",
        "VNM" => "VN",
        "VUT" => "VU",
        "WLF" => "WF",
        "WSM" => "WS",
        "YEM" => "YE",
        "ZAF" => "ZA",
        "ZMB" => "ZM",
        "ZWE" => "ZW",
        _ => return None,
    })
}

/// Normalize a country code to uppercase alpha-2.
///
/// Alpha-2 inputs pass through uppercased; alpha-3 inputs are translated
/// where known, otherwise returned uppercased as-is so that lookups fail
/// loudly downstream instead of silently matching the wrong branch.
pub fn normalize_to_alpha2(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.len() != 2 {
        // Covers alpha-3 and the MRZ single-letter code for Germany.
        if let Some(alpha2) = alpha3_to_alpha2(trimmed) {
            return alpha2.to_string();
        }
    }
    trimmed.to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_alpha3_codes() {
        assert_eq!(alpha3_to_alpha2("KOR"), Some("KR"));
        assert_eq!(alpha3_to_alpha2("usa"), Some("US"));
        assert_eq!(alpha3_to_alpha2("D"), Some("DE"));
        assert_eq!(alpha3_to_alpha2("XXX"), None);
    }

    #[test]
    fn normalize_passes_alpha2_through() {
        assert_eq!(normalize_to_alpha2("kr"), "KR");
        assert_eq!(normalize_to_alpha2("KOR"), "KR");
        assert_eq!(normalize_to_alpha2("UNO"), "UNO");
    }
}
