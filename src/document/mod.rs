//! Ricardian contract documents
//!
//! A contract is published as an HTML page. The machine-readable terms live
//! in `data-*` attributes on the `#page` element and the human-readable legal
//! text lives inside `#contract-display`.
//!
//! # Example
//!
//! ```rust
//! use ricardian::document::{parse, SanctionList};
//!
//! let page = r#"<div id="page"
//!     data-contracttype="acceptable" data-version="0.0.1"
//!     data-created="2024-01-01T00:00:00.000Z" data-expires="NEVER"
//!     data-redirectto="" data-network="arweave" data-issuer="0xabc"
//!     data-issuersignature="0x00" data-smartcontract="" data-erc20='""'
//!     data-blockedaddresses='[]' data-blockedcountries='["OFEC"]'
//!     data-relatedtrail="" data-trailaddress="">
//!     <div id="contract-display"><p>Terms</p></div>
//! </div>"#;
//!
//! let parsed = parse(page).unwrap();
//! assert_eq!(parsed.body_html, "<p>Terms</p>");
//! assert_eq!(parsed.document.blocked_country_sanction_lists, vec![SanctionList::Ofec]);
//! ```

mod error;
pub mod sanction;

pub use error::{ParseError, ParseResult};
pub use sanction::SanctionList;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

/// Id of the element carrying the contract attributes
pub const ROOT_ELEMENT_ID: &str = "page";

/// Id of the element holding the legal text
pub const DISPLAY_ELEMENT_ID: &str = "contract-display";

/// Expiry sentinel for contracts that never expire
pub const NEVER_EXPIRES: &str = "NEVER";

/// The encoded form of an empty token address
const EMPTY_TOKEN_ADDRESS: &str = r#""""#;

/// Machine-readable terms of a Ricardian contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    /// Kind of contract (e.g. "acceptable")
    pub contract_type: String,
    /// Contract format version
    pub version: String,
    /// Creation timestamp as issued
    pub created_at: String,
    /// `"NEVER"` or an ISO 8601 timestamp
    pub expires_at: String,
    /// Where the host should send the user after accepting
    pub redirect_to: String,
    /// Chain identifier, or the storage network for storage-native contracts
    pub network: String,
    /// Issuer address
    pub issuer: String,
    /// Issuer signature over the contract hash
    pub issuer_signature: String,
    /// Address of the acceptance smart contract
    pub smart_contract_address: String,
    /// Optional ERC-20 token address
    pub token_address: Option<String>,
    /// Accounts that may not accept, in document order
    pub blocked_addresses: Vec<String>,
    /// Sanction lists restricting acceptance, in document order
    pub blocked_country_sanction_lists: Vec<SanctionList>,
    /// Related trail identifier
    pub related_trail: String,
    /// Trail address
    pub trail_address: String,
}

impl ContractDocument {
    /// Whether this contract lives only on `storage_network` with no
    /// on-chain acceptance
    pub fn is_storage_native(&self, storage_network: &str) -> bool {
        self.network == storage_network
    }

    /// Whether the contract carries the "never expires" sentinel
    pub fn never_expires(&self) -> bool {
        self.expires_at == NEVER_EXPIRES
    }
}

/// A parsed contract: the verbatim legal markup and its terms
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedContract {
    /// Serialized inner markup of the display element, used for both
    /// display and hashing
    pub body_html: String,
    /// The contract terms
    pub document: ContractDocument,
}

/// Parse a raw contract page
pub fn parse(raw_html: &str) -> ParseResult<ParsedContract> {
    let html = Html::parse_document(raw_html);

    let page = find_by_id(&html, ROOT_ELEMENT_ID).ok_or(ParseError::MissingRoot)?;
    let display = find_by_id(&html, DISPLAY_ELEMENT_ID).ok_or(ParseError::MissingDisplay)?;

    let attrs = Attributes(page);
    let document = ContractDocument {
        contract_type: attrs.required("contracttype")?,
        version: attrs.required("version")?,
        created_at: attrs.required("created")?,
        expires_at: attrs.required("expires")?,
        redirect_to: attrs.required("redirectto")?,
        network: attrs.required("network")?,
        issuer: attrs.required("issuer")?,
        issuer_signature: attrs.required("issuersignature")?,
        smart_contract_address: attrs.required("smartcontract")?,
        token_address: attrs.token_address("erc20")?,
        blocked_addresses: attrs.json("blockedaddresses")?,
        blocked_country_sanction_lists: attrs.json("blockedcountries")?,
        related_trail: attrs.required("relatedtrail")?,
        trail_address: attrs.required("trailaddress")?,
    };

    Ok(ParsedContract {
        body_html: display.inner_html(),
        document,
    })
}

/// First element in document order with the given id
fn find_by_id<'a>(html: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// `data-*` attribute reader over the root element
struct Attributes<'a>(ElementRef<'a>);

impl Attributes<'_> {
    fn raw(&self, name: &'static str) -> Option<&str> {
        self.0.value().attr(&format!("data-{name}"))
    }

    fn required(&self, name: &'static str) -> ParseResult<String> {
        self.raw(name)
            .map(str::to_string)
            .ok_or(ParseError::MissingField(name))
    }

    fn json<T: serde::de::DeserializeOwned>(&self, name: &'static str) -> ParseResult<T> {
        let raw = self.raw(name).ok_or(ParseError::MissingField(name))?;
        serde_json::from_str(raw).map_err(|_| ParseError::MalformedField(name))
    }

    /// The token address is optional; the literal `""` means "empty"
    fn token_address(&self, name: &'static str) -> ParseResult<Option<String>> {
        match self.raw(name) {
            None => Ok(None),
            Some(EMPTY_TOKEN_ADDRESS) => Ok(Some(String::new())),
            Some(raw) => serde_json::from_str(raw).map_err(|_| ParseError::MalformedField(name)),
        }
    }
}
