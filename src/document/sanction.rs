//! Sanction lists and the country codes they cover
//!
//! Each list maps to a fixed, statically known set of ISO 3166-1 alpha-2
//! codes. Lists travel in contract documents as string tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Countries covered by the OFAC sanctions programs
pub const OFEC_COUNTRIES: &[&str] = &[
    "AF", "BY", "BA", "BI", "CF", "CN", "KM", "CU", "CY", "CD", "GN", "GW", "HT", "IR", "IQ", "KG",
    "LA", "LB", "LY", "ML", "MR", "MD", "ME", "MM", "NI", "KP", "PS", "RU", "RW", "RS", "SO", "SS",
    "SD", "SY", "TN", "UA", "VE", "YE", "ZW",
];

/// Countries covered by United Nations sanctions
pub const UN_COUNTRIES: &[&str] = &[
    "AF", "CF", "CD", "GW", "IR", "IQ", "LB", "LY", "ML", "ME", "KP", "RS", "SO", "SS", "SD", "SY",
    "YE",
];

/// Countries covered by European Union sanctions
pub const EU_COUNTRIES: &[&str] = &[
    "BY", "BA", "BI", "CF", "CN", "CD", "GN", "GW", "HT", "IR", "LB", "LY", "MD", "ME", "MM", "NI",
    "KP", "RU", "RS", "SS", "SD", "SY", "TN", "UA", "VE", "ZW",
];

/// Legacy token for blocking the United States alone
const BLOCK_USA_TOKEN: &str = "BLOCKUSA";

/// A named set of jurisdictions barred from accepting a contract
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SanctionList {
    /// OFAC list (spelled "OFEC" on the wire)
    Ofec,
    /// European Union list
    Eu,
    /// United Nations list
    Un,
    /// A single country
    BlockSpecificCountry {
        /// Alpha-2 code of the barred country
        code: String,
        /// Token the issuer wrote, kept so re-encoding is byte-exact
        token: String,
    },
}

impl SanctionList {
    /// A list barring only `code`, written as the code itself
    pub fn country(code: impl Into<String>) -> Self {
        let code = code.into();
        SanctionList::BlockSpecificCountry {
            token: code.clone(),
            code,
        }
    }

    /// Country codes covered by this list
    pub fn countries(&self) -> Vec<&str> {
        match self {
            SanctionList::Ofec => OFEC_COUNTRIES.to_vec(),
            SanctionList::Eu => EU_COUNTRIES.to_vec(),
            SanctionList::Un => UN_COUNTRIES.to_vec(),
            SanctionList::BlockSpecificCountry { code, .. } => vec![code.as_str()],
        }
    }

    /// Whether `country_code` is on this list
    pub fn contains(&self, country_code: &str) -> bool {
        match self {
            SanctionList::Ofec => OFEC_COUNTRIES.contains(&country_code),
            SanctionList::Eu => EU_COUNTRIES.contains(&country_code),
            SanctionList::Un => UN_COUNTRIES.contains(&country_code),
            SanctionList::BlockSpecificCountry { code, .. } => code == country_code,
        }
    }

    /// The token this list is written as inside a contract document
    ///
    /// A decoded list re-encodes to the token it was decoded from.
    pub fn token(&self) -> String {
        match self {
            SanctionList::Ofec => "OFEC".to_string(),
            SanctionList::Eu => "EU".to_string(),
            SanctionList::Un => "UN".to_string(),
            SanctionList::BlockSpecificCountry { token, .. } => token.clone(),
        }
    }

    /// Decode a document token
    ///
    /// Returns `None` for anything that is neither a known list, the legacy
    /// `BLOCKUSA` token, nor an upper-case alpha-2 code.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "OFEC" => Some(SanctionList::Ofec),
            "EU" => Some(SanctionList::Eu),
            "UN" => Some(SanctionList::Un),
            BLOCK_USA_TOKEN => Some(SanctionList::BlockSpecificCountry {
                code: "US".to_string(),
                token: BLOCK_USA_TOKEN.to_string(),
            }),
            code if is_alpha2(code) => Some(SanctionList::country(code)),
            _ => None,
        }
    }
}

impl fmt::Display for SanctionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl TryFrom<String> for SanctionList {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SanctionList::from_token(&value).ok_or_else(|| format!("unknown sanction list: {value}"))
    }
}

impl From<SanctionList> for String {
    fn from(list: SanctionList) -> Self {
        list.token()
    }
}

fn is_alpha2(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase())
}
