//! MRZ salvage from DG1.
//!
//! When the caller supplies neither document number nor issuing country,
//! both can be recovered from the TD-3 MRZ inside DG1: ICAO tag `5F1F`,
//! BER length (short or long form), then two 44-character lines.

use crate::{asn1::read_ber_length, country};

/// Fields recovered from a TD-3 MRZ.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MrzSummary {
    pub document_number: Option<String>,
    pub country_code:    Option<String>,
}

const MRZ_TAG: [u8; 2] = [0x5f, 0x1f];
const TD3_LEN: usize = 88;

/// Scan DG1 for the `5F1F` MRZ tag and pull the document number (line 2,
/// positions 0..9) and issuing state (line 1, positions 2..5, alpha-3).
///
/// Filler `<` characters are stripped; the alpha-3 code is mapped to
/// alpha-2. Returns an empty summary when no TD-3 MRZ is found.
pub fn salvage_from_dg1(dg1: &[u8]) -> MrzSummary {
    let mut position = 0;
    while position + 2 < dg1.len() {
        if dg1[position..position + 2] != MRZ_TAG {
            position += 1;
            continue;
        }
        let after_tag = &dg1[position + 2..];
        let Ok((length, header_len)) = read_ber_length(after_tag) else {
            return MrzSummary::default();
        };
        let content = &after_tag[header_len..];
        if length < TD3_LEN || content.len() < length {
            return MrzSummary::default();
        }
        return parse_td3(&content[..length]);
    }
    MrzSummary::default()
}

fn parse_td3(mrz: &[u8]) -> MrzSummary {
    let strip = |raw: &[u8]| -> String {
        raw.iter()
            .map(|&b| b as char)
            .filter(|&c| c != '<')
            .collect()
    };

    // Line 1 carries the issuing state at positions 2..5, line 2 starts at
    // offset 44 with the document number in positions 0..9.
    let issuing_state = strip(&mrz[2..5]);
    let document_number = strip(&mrz[44..53]);

    MrzSummary {
        document_number: (!document_number.is_empty()).then_some(document_number),
        country_code:    (!issuing_state.is_empty())
            .then(|| country::normalize_to_alpha2(&issuing_state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad44(line: &str) -> String {
        format!("{line:<<44}")
    }

    fn td3(line1: &str, line2: &str) -> Vec<u8> {
        let mrz = pad44(line1) + &pad44(line2);
        let mut dg1 = vec![0x61, 0x5b, 0x5f, 0x1f, 0x58];
        dg1.extend_from_slice(mrz.as_bytes());
        dg1
    }

    #[test]
    fn salvages_document_number_and_country() {
        let dg1 = td3("P<KORDOE<<JOHN", "M12345678<KOR8001014M2501017");
        let summary = salvage_from_dg1(&dg1);
        assert_eq!(summary.document_number.as_deref(), Some("M12345678"));
        assert_eq!(summary.country_code.as_deref(), Some("KR"));
    }

    #[test]
    fn long_form_length_is_accepted() {
        let mrz = pad44("P<D<<MUSTERMANN<<ERIKA") + &pad44("C01X00T478D<<6408125F2702283");
        let mut dg1 = vec![0x5f, 0x1f, 0x81, 0x58];
        dg1.extend_from_slice(mrz.as_bytes());
        let summary = salvage_from_dg1(&dg1);
        assert_eq!(summary.document_number.as_deref(), Some("C01X00T47"));
        assert_eq!(summary.country_code.as_deref(), Some("DE"));
    }

    #[test]
    fn short_mrz_is_rejected() {
        let mut dg1 = vec![0x5f, 0x1f, 0x10];
        dg1.extend_from_slice(&[b'P'; 16]);
        assert_eq!(salvage_from_dg1(&dg1), MrzSummary::default());
        assert_eq!(salvage_from_dg1(b"no tag here"), MrzSummary::default());
    }
}
