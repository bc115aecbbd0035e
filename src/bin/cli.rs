//! Ricardian CLI tool
//!
//! Inspect, hash and geo-check Ricardian contracts, and walk through the
//! acceptance flow against an in-memory chain.

use alloy_primitives::B256;
use clap::{Parser, Subcommand};
use ricardian::{
    chain::{memory::MemoryChain, parse_address},
    document::{self, ParsedContract, SanctionList},
    gate::{AcceptanceGate, FnCallbacks, RecordingCallbacks, SigningCallbacks},
    geo::{self, GeoRecord, Position},
    integrity::abi_encode_string,
    session::{ContractSession, SessionStatus},
    store::memory::MemoryStore,
    Config, IntegrityHasher,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ricardian: integrity checks and acceptance gating for Ricardian contracts
#[derive(Parser)]
#[command(name = "ricardian")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.ricardian/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a contract and show its terms
    Inspect {
        /// Transaction id of the contract
        #[arg(required_unless_present = "file")]
        transaction: Option<String>,

        /// Read the contract page from a local file instead
        #[arg(short, long, conflicts_with = "transaction")]
        file: Option<PathBuf>,

        /// Print the terms as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute a contract's integrity hash
    Hash {
        /// Transaction id of the contract
        #[arg(required_unless_present = "file")]
        transaction: Option<String>,

        /// Read the contract page from a local file instead
        #[arg(short, long, conflicts_with = "transaction")]
        file: Option<PathBuf>,

        /// Expected hash (hex); exit non-zero on mismatch
        #[arg(short, long)]
        expected: Option<String>,

        /// Also print the ABI-encoded preimage
        #[arg(long)]
        show_encoding: bool,
    },

    /// Check a country code against sanction lists
    CheckCountry {
        /// ISO 3166-1 alpha-2 country code
        code: String,

        /// Comma-separated sanction lists (e.g. OFEC,EU,UN,BLOCKUSA)
        #[arg(short, long, value_delimiter = ',')]
        lists: Vec<String>,
    },

    /// Resolve a coordinate with the geocoding dataset
    Locate {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Comma-separated sanction lists to evaluate
        #[arg(short, long, value_delimiter = ',')]
        lists: Vec<String>,
    },

    /// Run the acceptance flow against an in-memory chain
    Demo,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "ricardian=info"
                    .parse()
                    .unwrap_or_else(|e| exit_with(&format!("Invalid log directive: {}", e))),
            ),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Inspect {
            transaction,
            file,
            json,
        } => cmd_inspect(&config, transaction, file, json).await,
        Commands::Hash {
            transaction,
            file,
            expected,
            show_encoding,
        } => cmd_hash(&config, transaction, file, expected, show_encoding).await,
        Commands::CheckCountry { code, lists } => cmd_check_country(&code, &lists),
        Commands::Locate { lat, lon, lists } => cmd_locate(&config, lat, lon, &lists).await,
        Commands::Demo => cmd_demo().await,
    }
}

fn exit_with(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ricardian").join("config.toml"))
}

fn load_config(path: Option<&Path>) -> Config {
    let result = match (path, default_config_path()) {
        (Some(path), _) => Config::from_file(path),
        (None, Some(default)) => Config::from_file_or_default(&default),
        (None, None) => Ok(Config::default()),
    };
    result.unwrap_or_else(|e| exit_with(&e.to_string()))
}

fn parse_lists(tokens: &[String]) -> Vec<SanctionList> {
    tokens
        .iter()
        .map(|token| {
            SanctionList::from_token(token.trim())
                .unwrap_or_else(|| exit_with(&format!("Unknown sanction list: {}", token)))
        })
        .collect()
}

/// Load a contract from a file or from the configured gateway
async fn load_contract(
    config: &Config,
    transaction: Option<String>,
    file: Option<PathBuf>,
) -> ParsedContract {
    if let Some(path) = file {
        let raw = fs::read_to_string(&path)
            .unwrap_or_else(|e| exit_with(&format!("Error reading {:?}: {}", path, e)));
        return document::parse(&raw).unwrap_or_else(|e| exit_with(&e.to_string()));
    }

    let store = config.store().unwrap_or_else(|e| exit_with(&e.to_string()));
    let callbacks = FnCallbacks::new(|| {}, |message: &str| eprintln!("Error: {}", message));
    let session =
        ContractSession::open(transaction.unwrap_or_default(), Arc::new(store), &callbacks).await;

    match session.status() {
        SessionStatus::Success(contract) => contract,
        _ => std::process::exit(1),
    }
}

async fn cmd_inspect(config: &Config, transaction: Option<String>, file: Option<PathBuf>, json: bool) {
    let contract = load_contract(config, transaction, file).await;
    let doc = &contract.document;
    let hasher = IntegrityHasher::new(config.hash_scheme);

    if json {
        let output = serde_json::json!({
            "document": doc,
            "bodyHtml": contract.body_html,
            "hash": hasher.compute_hash(doc, &contract.body_html),
            "hashScheme": config.hash_scheme,
        });
        let pretty = serde_json::to_string_pretty(&output)
            .unwrap_or_else(|e| exit_with(&e.to_string()));
        println!("{}", pretty);
        return;
    }

    println!("=== Ricardian Contract ===");
    println!();
    println!("Type:           {}", doc.contract_type);
    println!("Version:        {}", doc.version);
    println!("Created:        {}", doc.created_at);
    println!("Expires:        {}", doc.expires_at);
    println!("Network:        {}", doc.network);
    println!("Issuer:         {}", doc.issuer);
    println!("Smart contract: {}", doc.smart_contract_address);
    println!(
        "Token:          {}",
        doc.token_address.as_deref().filter(|t| !t.is_empty()).unwrap_or("-")
    );
    println!("Redirect:       {}", doc.redirect_to);
    println!();
    println!("--- Restrictions ---");
    let lists: Vec<String> = doc
        .blocked_country_sanction_lists
        .iter()
        .map(|l| l.token())
        .collect();
    println!("Sanction lists:    {}", if lists.is_empty() { "-".to_string() } else { lists.join(", ") });
    println!("Blocked addresses: {}", doc.blocked_addresses.len());
    for address in &doc.blocked_addresses {
        println!("  {}", address);
    }
    println!();
    println!("--- Status ---");
    let expired = ricardian::gate::did_expire(&doc.expires_at);
    println!("Expired:        {}", if expired { "YES" } else { "no" });
    println!(
        "On-chain:       {}",
        if doc.is_storage_native(&config.storage_network) {
            "no (storage-native)"
        } else {
            "yes"
        }
    );
    println!(
        "Hash (v{}):      {}",
        config.hash_scheme.version(),
        hasher.compute_hash(doc, &contract.body_html)
    );
}

async fn cmd_hash(
    config: &Config,
    transaction: Option<String>,
    file: Option<PathBuf>,
    expected: Option<String>,
    show_encoding: bool,
) {
    let contract = load_contract(config, transaction, file).await;
    let hasher = IntegrityHasher::new(config.hash_scheme);
    let hash = hasher.compute_hash(&contract.document, &contract.body_html);

    println!("{}", hash);

    if show_encoding {
        let preimage = hasher.canonical_string(&contract.document, &contract.body_html);
        println!("0x{}", hex::encode(abi_encode_string(preimage)));
    }

    if let Some(expected) = expected {
        let expected: B256 = expected
            .trim()
            .parse()
            .unwrap_or_else(|_| exit_with(&format!("Invalid hash: {}", expected)));

        if hasher.verify(&contract.document, &contract.body_html, &expected) {
            println!("MATCH: contract is unchanged");
        } else {
            println!("MISMATCH: contract differs from the expected hash");
            std::process::exit(2);
        }
    }
}

fn cmd_check_country(code: &str, tokens: &[String]) {
    let lists = parse_lists(tokens);
    let record = GeoRecord {
        country_code: code.trim().to_ascii_uppercase(),
    };

    for list in &lists {
        let status = if list.contains(&record.country_code) { "[LISTED]" } else { "[clear]" };
        println!("  {:<10} {}", list.token(), status);
    }

    if geo::is_country_blocked(&record, &lists) {
        println!("{}: BLOCKED", record.country_code);
    } else {
        println!("{}: allowed", record.country_code);
    }
}

async fn cmd_locate(config: &Config, lat: f64, lon: f64, tokens: &[String]) {
    let lists = parse_lists(tokens);
    let resolver = config.geo_resolver().unwrap_or_else(|e| exit_with(&e.to_string()));
    let position = Position::new(lat, lon);

    match resolver.resolve(position).await {
        Ok(Some(record)) => {
            println!("Country: {}", record.country_code);
            if !lists.is_empty() {
                let blocked = geo::is_country_blocked(&record, &lists);
                println!("Blocked: {}", if blocked { "YES" } else { "no" });
            }
        }
        Ok(None) => {
            println!("No country found for ({}, {}); acceptance would be blocked", lat, lon);
        }
        Err(e) => exit_with(&format!("{} (acceptance would be blocked)", e)),
    }
}

async fn cmd_demo() {
    println!("=== Ricardian Acceptance Demo ===");
    println!();
    println!("This demo walks a contract through the acceptance gate:");
    println!("1. Loading and parsing");
    println!("2. Integrity hashing");
    println!("3. Acceptance on chain");
    println!("4. Repeat acceptance");
    println!("5. Blocked account");
    println!();

    let signer = "0x4444444444444444444444444444444444444444";
    let blocked = "0x3333333333333333333333333333333333333333";
    let page = format!(
        "<!DOCTYPE html><html><body><div id=\"page\" data-contracttype=\"acceptable\" \
         data-version=\"0.0.1\" data-created=\"2024-01-01T00:00:00.000Z\" \
         data-expires=\"NEVER\" data-redirectto=\"https://example.com\" data-network=\"Polygon\" \
         data-issuer=\"0x1111111111111111111111111111111111111111\" data-issuersignature=\"0x00\" \
         data-smartcontract=\"0x2222222222222222222222222222222222222222\" data-erc20='\"\"' \
         data-blockedaddresses='[\"{}\"]' data-blockedcountries='[\"OFEC\"]' \
         data-relatedtrail=\"\" data-trailaddress=\"\">\
         <div id=\"contract-display\"><h1>Service Agreement</h1>\
         <p>The signer agrees to the terms.</p></div></div></body></html>",
        blocked
    );

    // Step 1
    println!("--- Step 1: Loading ---");
    let store = MemoryStore::new();
    store.insert("demo-tx", page);
    let callbacks = RecordingCallbacks::new();
    let session = ContractSession::open("demo-tx", Arc::new(store), &callbacks).await;
    let Some(contract) = session.contract() else {
        exit_with("demo contract failed to load");
    };
    println!("Loaded contract {} ({})", session.id(), contract.document.contract_type);
    println!("Body: {}", contract.body_html);
    println!();

    // Step 2
    println!("--- Step 2: Integrity Hash ---");
    let hash = IntegrityHasher::default().compute_hash(&contract.document, &contract.body_html);
    println!("Hash: {}", hash);
    println!();

    // Step 3
    println!("--- Step 3: Accepting ---");
    let account = parse_address(signer).unwrap_or_else(|e| exit_with(&e.to_string()));
    let chain = Arc::new(MemoryChain::new(account));
    let gate = AcceptanceGate::new(chain.clone());
    report(&session, &gate, &callbacks).await;
    println!("Submissions on chain: {}", chain.submissions().len());
    println!();

    // Step 4
    println!("--- Step 4: Accepting again ---");
    report(&session, &gate, &callbacks).await;
    println!("Submissions on chain: {}", chain.submissions().len());
    println!();

    // Step 5
    println!("--- Step 5: Blocked account ---");
    let blocked_account = parse_address(blocked).unwrap_or_else(|e| exit_with(&e.to_string()));
    let blocked_gate = AcceptanceGate::new(Arc::new(MemoryChain::new(blocked_account)));
    report(&session, &blocked_gate, &callbacks).await;
    println!();

    println!("=== Demo Complete ===");
    println!("Host notifications: {:?}", callbacks.events());
}

async fn report(session: &ContractSession, gate: &AcceptanceGate, callbacks: &dyn SigningCallbacks) {
    match session.accept(gate, callbacks).await {
        Ok(decision) => println!("Decision: {:?} (state {:?})", decision, gate.state()),
        Err(e) => println!("Error: {}", e),
    }
}
