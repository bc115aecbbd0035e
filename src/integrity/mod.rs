//! Contract integrity hashing
//!
//! The contract hash commits to the legal text and every term that governs
//! acceptance. Fields are joined in a fixed order, ABI-encoded as a single
//! `string` parameter and hashed with keccak-256 (the function Ethereum
//! tooling calls "sha3"; it is not NIST SHA-3).
//!
//! The field order and joining scheme are a wire contract: every signature
//! already issued depends on them.

use alloy_primitives::{keccak256, B256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::document::ContractDocument;

/// How canonical fields are joined before hashing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashScheme {
    /// Version 1: plain concatenation with no delimiters
    ///
    /// Adjacent fields can alias (`"2024" + "0101"` equals `"20240" + "101"`).
    #[default]
    Legacy,
    /// Version 2: every field is prefixed with `<byte length>:`
    LengthPrefixed,
}

impl HashScheme {
    /// Numeric version of this scheme
    pub fn version(&self) -> u32 {
        match self {
            HashScheme::Legacy => 1,
            HashScheme::LengthPrefixed => 2,
        }
    }
}

/// Computes and verifies contract hashes
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegrityHasher {
    scheme: HashScheme,
}

impl IntegrityHasher {
    /// Create a hasher using the given scheme
    pub fn new(scheme: HashScheme) -> Self {
        IntegrityHasher { scheme }
    }

    /// The scheme in use
    pub fn scheme(&self) -> HashScheme {
        self.scheme
    }

    /// Canonical fields of a contract, in hashing order
    pub fn canonical_fields(doc: &ContractDocument, body_html: &str) -> Vec<String> {
        vec![
            body_html.to_string(),
            doc.created_at.clone(),
            doc.expires_at.clone(),
            doc.redirect_to.clone(),
            doc.version.clone(),
            doc.issuer.clone(),
            to_json(&doc.blocked_country_sanction_lists),
            to_json(&doc.blocked_addresses),
            doc.network.clone(),
            doc.smart_contract_address.clone(),
            to_json(&doc.token_address),
        ]
    }

    /// The string that gets ABI-encoded and hashed
    pub fn canonical_string(&self, doc: &ContractDocument, body_html: &str) -> String {
        let fields = Self::canonical_fields(doc, body_html);
        match self.scheme {
            HashScheme::Legacy => fields.concat(),
            HashScheme::LengthPrefixed => fields
                .iter()
                .map(|field| format!("{}:{}", field.len(), field))
                .collect(),
        }
    }

    /// Compute the contract hash
    pub fn compute_hash(&self, doc: &ContractDocument, body_html: &str) -> B256 {
        hash_string(self.canonical_string(doc, body_html))
    }

    /// Verify that a contract matches an expected hash
    pub fn verify(&self, doc: &ContractDocument, body_html: &str, expected: &B256) -> bool {
        let computed = self.compute_hash(doc, body_html);
        constant_time_eq(computed.as_slice(), expected.as_slice())
    }
}

/// ABI-encode `message` as a single dynamic string parameter
pub fn abi_encode_string(message: String) -> Vec<u8> {
    (message,).abi_encode_params()
}

/// keccak-256 over the ABI encoding of `message`
pub fn hash_string(message: String) -> B256 {
    keccak256(abi_encode_string(message))
}

/// Compact JSON, matching what issuers embed in the page
fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    // Strings, options and sequences of strings always serialize.
    serde_json::to_string(value).unwrap_or_default()
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
