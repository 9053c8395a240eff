//! Identity Gateway CLI: `igw` command.
//!
//! Manages local identities, their attributes and access rules, and runs the
//! verification protocol against the local gateway.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use identity_gateway::attributes::validate_segment;
use identity_gateway::time::{micros_to_rfc3339, now_micros};
use identity_gateway::{
    AccessRule, AttributeValue, Gateway, GatewayBuilder, GatewayConfig, GatewayError,
    IdentityRecord, LocalTransport, Permissions, RemoteAttribute, SourceAuthentication,
    VerifyRequest,
};

/// Seed phrase source for non-interactive use.
const ENV_SEED_PHRASE: &str = "IGW_SEED_PHRASE";

// ── Directory helpers ─────────────────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".igw")
}

// ── Seed phrase helper ────────────────────────────────────────────────────────

fn read_seed_phrase(prompt: &str) -> Result<String> {
    if let Ok(seed) = std::env::var(ENV_SEED_PHRASE) {
        return Ok(seed);
    }
    eprint!("{prompt}");
    let mut seed = String::new();
    std::io::stdin()
        .read_line(&mut seed)
        .context("failed to read seed phrase")?;
    Ok(seed.trim().to_string())
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

/// Parse a duration string like "24h", "7d", "1h30m", or a bare number of hours.
/// Returns the duration as microseconds.
fn parse_duration_to_micros(s: &str) -> Result<u64> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u64>() {
        return Ok(n * 3600 * 1_000_000);
    }

    let mut total_micros: u64 = 0;
    let mut current = String::new();

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else {
            let val: u64 = current
                .parse()
                .map_err(|_| anyhow!("invalid duration: {s}"))?;
            current.clear();
            total_micros += match ch {
                'd' => val * 86_400,
                'h' => val * 3_600,
                'm' => val * 60,
                's' => val,
                _ => return Err(anyhow!("unknown duration unit '{ch}' in '{s}'")),
            } * 1_000_000;
        }
    }

    if !current.is_empty() {
        return Err(anyhow!("duration '{s}' is missing a unit (d/h/m/s)"));
    }
    if total_micros == 0 {
        return Err(anyhow!("duration must be > 0"));
    }
    Ok(total_micros)
}

fn parse_value(raw: &str, json: bool) -> Result<AttributeValue> {
    if json {
        let value = serde_json::from_str(raw).with_context(|| format!("invalid JSON value: {raw}"))?;
        Ok(AttributeValue::Json(value))
    } else {
        Ok(AttributeValue::String(raw.to_string()))
    }
}

/// Attribute types and IDs become access path segments.
fn parse_segment(raw: &str) -> std::result::Result<String, GatewayError> {
    validate_segment("path segment", raw)?;
    Ok(raw.to_string())
}

fn print_value(value: &AttributeValue) {
    match value {
        AttributeValue::String(s) => println!("{s}"),
        AttributeValue::Json(v) => println!("{}", serde_json::to_string_pretty(v).unwrap_or_default()),
    }
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Identity Gateway CLI: manage identities, attributes, access rules and
/// attribute verifications.
#[derive(Parser, Debug)]
#[command(
    name = "igw",
    about = "Identity Gateway CLI",
    version,
    long_about = "igw: Identity Gateway CLI\n\nManage identities, typed attributes and their access rules,\nand verify or check attribute values across identities.\n\nSeed phrases are read from stdin, or from IGW_SEED_PHRASE when set."
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config and IGW_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, inspect and link identities
    Identity {
        #[command(subcommand)]
        subcommand: IdentityCommands,
    },

    /// Manage your attributes
    Attr {
        #[command(subcommand)]
        subcommand: AttrCommands,
    },

    /// Manage who may access your attributes
    Access {
        #[command(subcommand)]
        subcommand: AccessCommands,
    },

    /// Attest that another identity's attribute holds a value
    Verify {
        /// Your user name
        #[arg(long = "as")]
        user: String,

        /// Identity URL of the attribute owner
        target: String,

        /// Attribute type, e.g. email
        #[arg(value_parser = parse_segment)]
        attr_type: String,

        /// Attribute ID, e.g. primary
        #[arg(value_parser = parse_segment)]
        attr_id: String,

        /// The value you vouch for
        value: String,

        /// Parse the value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-validate the verifications stored on an attribute
    Check {
        /// Your user name
        #[arg(long = "as")]
        user: String,

        /// Identity URL of the attribute owner
        target: String,

        #[arg(value_parser = parse_segment)]
        attr_type: String,

        #[arg(value_parser = parse_segment)]
        attr_id: String,

        /// The value the verifications should cover
        value: String,

        /// Parse the value as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum IdentityCommands {
    /// Create a new identity
    Create { user_name: String },

    /// Display an identity
    Show { user_name: String },

    /// Link an alternate key system to your identity
    Link {
        user_name: String,
        /// Kind of linked identity, e.g. ethereum
        kind: String,
        identifier: String,
    },
}

#[derive(Subcommand, Debug)]
enum AttrCommands {
    /// Store an attribute value
    Set {
        user_name: String,
        #[arg(value_parser = parse_segment)]
        attr_type: String,
        #[arg(value_parser = parse_segment)]
        attr_id: String,
        value: String,
        /// Parse the value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print an attribute value
    Get {
        user_name: String,
        #[arg(value_parser = parse_segment)]
        attr_type: String,
        #[arg(value_parser = parse_segment)]
        attr_id: String,
    },

    /// Delete an attribute
    Delete {
        user_name: String,
        #[arg(value_parser = parse_segment)]
        attr_type: String,
        #[arg(value_parser = parse_segment)]
        attr_id: String,
    },

    /// List attribute types, or the IDs of one type
    List {
        user_name: String,
        #[arg(long = "type", value_parser = parse_segment)]
        attr_type: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AccessCommands {
    /// Grant access to identities matching a pattern
    Grant {
        user_name: String,
        /// Identity pattern, e.g. https://*.example.com
        #[arg(long)]
        identity: String,
        /// Path pattern, e.g. /identity/email/*
        #[arg(long)]
        path: String,
        #[arg(long)]
        read: bool,
        #[arg(long)]
        write: bool,
        /// Lifetime, e.g. 24h, 7d, 1h30m
        #[arg(long)]
        expires: Option<String>,
        /// Make the rule single-use, redeemable with this token
        #[arg(long)]
        token: Option<String>,
    },

    /// Revoke rules with exactly these patterns (no flags: delete them)
    Revoke {
        user_name: String,
        #[arg(long)]
        identity: String,
        #[arg(long)]
        path: String,
        #[arg(long)]
        read: bool,
        #[arg(long)]
        write: bool,
    },

    /// Show what a requester may do on a path
    Check {
        user_name: String,
        #[arg(long)]
        requester: String,
        #[arg(long)]
        path: String,
        #[arg(long)]
        token: Option<String>,
    },

    /// List live rules
    List {
        user_name: String,
        /// Only rules whose path pattern matches this pattern
        #[arg(long)]
        path: Option<String>,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let verbose = cli.verbose;
    let gateway = open_gateway(cli.config.as_deref(), cli.data_dir)?;

    match cli.command {
        Commands::Identity { subcommand } => match subcommand {
            IdentityCommands::Create { user_name } => cmd_identity_create(&gateway, &user_name, verbose),
            IdentityCommands::Show { user_name } => cmd_identity_show(&gateway, &user_name),
            IdentityCommands::Link {
                user_name,
                kind,
                identifier,
            } => cmd_identity_link(&gateway, &user_name, &kind, &identifier).await,
        },
        Commands::Attr { subcommand } => match subcommand {
            AttrCommands::Set {
                user_name,
                attr_type,
                attr_id,
                value,
                json,
            } => cmd_attr_set(&gateway, &user_name, &attr_type, &attr_id, &value, json).await,
            AttrCommands::Get {
                user_name,
                attr_type,
                attr_id,
            } => cmd_attr_get(&gateway, &user_name, &attr_type, &attr_id).await,
            AttrCommands::Delete {
                user_name,
                attr_type,
                attr_id,
            } => cmd_attr_delete(&gateway, &user_name, &attr_type, &attr_id).await,
            AttrCommands::List {
                user_name,
                attr_type,
            } => cmd_attr_list(&gateway, &user_name, attr_type.as_deref()).await,
        },
        Commands::Access { subcommand } => match subcommand {
            AccessCommands::Grant {
                user_name,
                identity,
                path,
                read,
                write,
                expires,
                token,
            } => {
                cmd_access_grant(
                    &gateway,
                    &user_name,
                    AccessRuleArgs {
                        identity,
                        path,
                        permissions: Permissions::new(read, write),
                        expires,
                        token,
                    },
                    verbose,
                )
                .await
            }
            AccessCommands::Revoke {
                user_name,
                identity,
                path,
                read,
                write,
            } => cmd_access_revoke(&gateway, &user_name, &identity, &path, read, write).await,
            AccessCommands::Check {
                user_name,
                requester,
                path,
                token,
            } => cmd_access_check(&gateway, &user_name, &requester, &path, token.as_deref()).await,
            AccessCommands::List { user_name, path } => {
                cmd_access_list(&gateway, &user_name, path.as_deref()).await
            }
        },
        Commands::Verify {
            user,
            target,
            attr_type,
            attr_id,
            value,
            json,
        } => {
            let value = parse_value(&value, json)?;
            cmd_verify(gateway, &user, RemoteAttribute::new(target, attr_type, attr_id), value).await
        }
        Commands::Check {
            user,
            target,
            attr_type,
            attr_id,
            value,
            json,
        } => {
            let value = parse_value(&value, json)?;
            cmd_check(gateway, &user, RemoteAttribute::new(target, attr_type, attr_id), value).await
        }
    }
}

fn open_gateway(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Arc<Gateway>> {
    let config = match config_path {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GatewayConfig::default(),
    }
    .apply_env();

    let data_dir = data_dir
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(default_data_dir);
    let config = config.with_data_dir(data_dir);

    let gateway = GatewayBuilder::from_config(config)
        .context("failed to open data directory")?
        .build();
    Ok(Arc::new(gateway))
}

/// Prove ownership of `user_name` with its seed phrase.
async fn unlock(gateway: &Gateway, user_name: &str) -> Result<(IdentityRecord, String)> {
    let owner = gateway
        .identities()
        .identity_by_user_name(user_name)?
        .ok_or_else(|| anyhow!("identity '{user_name}' not found: run `igw identity create` first"))?;
    let url = gateway.identity_url(user_name);

    let seed = read_seed_phrase(&format!("Seed phrase for '{user_name}': "))?;
    let auth = SourceAuthentication::sign(gateway.signer(), &url, &seed)
        .context("failed to unlock identity (wrong seed phrase?)")?;
    gateway
        .authenticate(&auth)
        .await
        .context("seed phrase does not belong to this identity")?;
    Ok((owner, seed))
}

// ── Identity commands ─────────────────────────────────────────────────────────

/// `igw identity create USER`
fn cmd_identity_create(gateway: &Gateway, user_name: &str, verbose: bool) -> Result<()> {
    let seed = read_seed_phrase("Enter seed phrase for new identity: ")?;
    if seed.is_empty() {
        return Err(anyhow!("seed phrase cannot be empty"));
    }

    let record = gateway
        .identity_creator()
        .create_identity(user_name, &seed)
        .context("failed to create identity")?;

    println!("Created identity '{user_name}'");
    println!("  URL:  {}", gateway.identity_url(user_name));
    println!("  ID:   {}", record.user_id);
    if verbose {
        println!("  Key:  {}", record.key_pair.public_key);
        println!("  Created: {}", micros_to_rfc3339(record.created_at));
    }
    Ok(())
}

/// `igw identity show USER`
fn cmd_identity_show(gateway: &Gateway, user_name: &str) -> Result<()> {
    let record = gateway
        .identities()
        .identity_by_user_name(user_name)?
        .ok_or_else(|| anyhow!("identity '{user_name}' not found"))?;

    println!("Identity: {user_name}");
    println!("  URL:        {}", gateway.identity_url(user_name));
    println!("  ID:         {}", record.user_id);
    println!("  Public Key: {}", record.key_pair.public_key);
    println!("  Created:    {}", micros_to_rfc3339(record.created_at));
    if record.linked_identities.is_empty() {
        println!("  Linked:     none");
    } else {
        for (kind, identifier) in &record.linked_identities {
            println!("  Linked:     {kind} = {identifier}");
        }
    }
    Ok(())
}

/// `igw identity link USER KIND IDENTIFIER`
async fn cmd_identity_link(gateway: &Gateway, user_name: &str, kind: &str, identifier: &str) -> Result<()> {
    let (owner, _) = unlock(gateway, user_name).await?;
    gateway
        .identities()
        .link_identity(&owner.user_id, kind, identifier)
        .context("failed to link identity")?;
    println!("Linked {kind} identity {identifier} to '{user_name}'");
    Ok(())
}

// ── Attribute commands ────────────────────────────────────────────────────────

async fn cmd_attr_set(
    gateway: &Gateway,
    user_name: &str,
    attr_type: &str,
    attr_id: &str,
    raw: &str,
    json: bool,
) -> Result<()> {
    let value = parse_value(raw, json)?;
    let (owner, _) = unlock(gateway, user_name).await?;
    let url = gateway.identity_url(user_name);
    let event = gateway.write_attribute(&url, &owner, attr_type, attr_id, &value, None)?;
    log::debug!("{event:?}");
    println!("Stored /identity/{attr_type}/{attr_id}");
    Ok(())
}

async fn cmd_attr_get(gateway: &Gateway, user_name: &str, attr_type: &str, attr_id: &str) -> Result<()> {
    let (owner, _) = unlock(gateway, user_name).await?;
    let url = gateway.identity_url(user_name);
    match gateway.read_attribute(&url, &owner, attr_type, attr_id, None)? {
        Some(value) => {
            print_value(&value);
            Ok(())
        }
        None => Err(anyhow!("attribute /identity/{attr_type}/{attr_id} not found")),
    }
}

async fn cmd_attr_delete(gateway: &Gateway, user_name: &str, attr_type: &str, attr_id: &str) -> Result<()> {
    let (owner, _) = unlock(gateway, user_name).await?;
    let url = gateway.identity_url(user_name);
    match gateway.delete_attribute(&url, &owner, attr_type, attr_id, None)? {
        Some(_) => println!("Deleted /identity/{attr_type}/{attr_id}"),
        None => println!("Nothing stored at /identity/{attr_type}/{attr_id}"),
    }
    Ok(())
}

async fn cmd_attr_list(gateway: &Gateway, user_name: &str, attr_type: Option<&str>) -> Result<()> {
    let (owner, _) = unlock(gateway, user_name).await?;
    let attributes = gateway.attributes();
    let entries = match attr_type {
        Some(t) => attributes.list_attributes(&owner.user_id, t)?,
        None => attributes.list_attribute_types(&owner.user_id)?,
    };
    if entries.is_empty() {
        println!("(none)");
    }
    for entry in entries {
        println!("{entry}");
    }
    Ok(())
}

// ── Access commands ───────────────────────────────────────────────────────────

struct AccessRuleArgs {
    identity: String,
    path: String,
    permissions: Permissions,
    expires: Option<String>,
    token: Option<String>,
}

async fn cmd_access_grant(gateway: &Gateway, user_name: &str, args: AccessRuleArgs, verbose: bool) -> Result<()> {
    if args.permissions.is_none() {
        return Err(anyhow!("grant needs --read, --write or both"));
    }
    let (owner, _) = unlock(gateway, user_name).await?;

    let mut rule = AccessRule::new(args.identity, args.path, args.permissions);
    if let Some(duration) = &args.expires {
        let micros = parse_duration_to_micros(duration)
            .with_context(|| format!("invalid --expires value: '{duration}'"))?;
        rule = rule.expires_at(now_micros() + micros);
    }
    if let Some(token) = args.token {
        rule = rule.one_time(token);
    }
    let expires_at = rule.expires_at;

    let id = gateway
        .access()
        .grant(&owner.user_id, rule)
        .context("failed to store access rule")?;

    println!("Granted access rule {id}");
    if verbose {
        if let Some(at) = expires_at {
            println!("  Expires: {}", micros_to_rfc3339(at));
        }
    }
    Ok(())
}

async fn cmd_access_revoke(
    gateway: &Gateway,
    user_name: &str,
    identity: &str,
    path: &str,
    read: bool,
    write: bool,
) -> Result<()> {
    let (owner, _) = unlock(gateway, user_name).await?;
    let affected = gateway
        .access()
        .revoke(&owner.user_id, identity, path, read, write)?;
    if read || write {
        println!("Updated {affected} rule(s)");
    } else {
        println!("Deleted {affected} rule(s)");
    }
    Ok(())
}

async fn cmd_access_check(
    gateway: &Gateway,
    user_name: &str,
    requester: &str,
    path: &str,
    token: Option<&str>,
) -> Result<()> {
    let (owner, _) = unlock(gateway, user_name).await?;
    let permissions = gateway
        .access()
        .check(&owner.user_id, requester, path, token)?;
    println!("read={} write={}", permissions.read, permissions.write);
    Ok(())
}

async fn cmd_access_list(gateway: &Gateway, user_name: &str, path: Option<&str>) -> Result<()> {
    let (owner, _) = unlock(gateway, user_name).await?;
    let rules = gateway.access().list(&owner.user_id, path)?;

    println!("Rules ({}):", rules.len());
    if rules.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    println!("  {:<40} {:<30} {:<4} {:<5} EXPIRES", "IDENTITY", "PATH", "READ", "WRITE");
    println!("  {}", "-".repeat(100));
    for rule in rules {
        let expires = rule
            .expires_at
            .map(micros_to_rfc3339)
            .unwrap_or_else(|| "never".to_string());
        let one_time = if rule.one_time { " [ONE-TIME]" } else { "" };
        println!(
            "  {:<40} {:<30} {:<4} {:<5} {}{}",
            rule.identity, rule.pattern, rule.read, rule.write, expires, one_time
        );
    }
    Ok(())
}

// ── Protocol commands ─────────────────────────────────────────────────────────

async fn cmd_verify(gateway: Arc<Gateway>, user_name: &str, target: RemoteAttribute, value: AttributeValue) -> Result<()> {
    let (me, seed) = unlock(&gateway, user_name).await?;
    let transport = Arc::new(LocalTransport::new(gateway.clone()));
    let request = VerifyRequest {
        source_identity: gateway.identity_url(user_name),
        source_user_id: me.user_id,
        passphrase: seed,
        target,
        claimed_value: value,
    };

    let id = gateway
        .verifier(transport)
        .verify_attribute(&request)
        .await
        .with_context(|| format!("failed to verify {}", request.target))?;
    println!("Stored verification #{id} on {}", request.target);
    Ok(())
}

async fn cmd_check(gateway: Arc<Gateway>, user_name: &str, target: RemoteAttribute, value: AttributeValue) -> Result<()> {
    let (_, seed) = unlock(&gateway, user_name).await?;
    let transport = Arc::new(LocalTransport::new(gateway.clone()));
    let results = gateway
        .checker(transport)
        .check_attribute(&gateway.identity_url(user_name), &seed, &target, &value)
        .await
        .with_context(|| format!("failed to check {target}"))?;

    println!("Verifications ({}):", results.len());
    for result in results {
        let status = match (result.valid, result.key_resolved) {
            (true, _) => "valid",
            (false, true) => "INVALID",
            (false, false) => "UNRESOLVED KEY",
        };
        println!("  #{:<4} {:<40} {status}", result.verification_id, result.verifier);
    }
    Ok(())
}
