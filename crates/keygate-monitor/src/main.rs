//! Keygate command-line binary.
//!
//! # Usage
//!
//! ```bash
//! # Create the salt once per store
//! KEYGATE_SECRET=... keygate --db keygate.redb init
//!
//! # Issue and consume a write token for a path
//! keygate token --path /srv/data/report.docx --op write
//! keygate validate --token <hex> --client-nonce <hex> --server-nonce <hex> \
//!     --path /srv/data/report.docx --op write
//!
//! # Gate a live event feed read from stdin
//! inotify-feed /srv/data | keygate monitor --scope /srv/data
//! ```
//!
//! The secret is read from the environment variable named by `--secret-env`
//! so it never appears in the process arguments.

use std::{
    error::Error,
    fmt::Display,
    io::Write,
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use keygate_core::{
    EntropyClass, Environment, Operation, ReadLimits, SessionConfig, SessionHandle, TokenRequest,
    TokenValidator, fingerprint_file, parse_feed_line,
};
use keygate_crypto::{
    KdfParams, MasterKey, Nonce, Proof, Token, create_proof, derive_master_key, validate_proof,
};
use keygate_monitor::{
    AuditStore, EventGate, GateConfig, Monitor, MonitorConfig, MonitorError, RedbAuditStore,
    SystemEnv,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Time-boxed write tokens and a ransomware heuristic for a watched file set
#[derive(Parser, Debug)]
#[command(name = "keygate")]
#[command(about = "Time-boxed single-use write tokens with an entropy-based event gate")]
#[command(version)]
struct Cli {
    /// Audit store database
    #[arg(long, default_value = "keygate.redb", global = true)]
    db: PathBuf,

    /// Environment variable holding the secret
    #[arg(long, default_value = "KEYGATE_SECRET", global = true)]
    secret_env: String,

    /// Argon2id iterations
    #[arg(long, default_value_t = KdfParams::default().time_cost, global = true)]
    time_cost: u32,

    /// Argon2id memory in KiB
    #[arg(long, default_value_t = KdfParams::default().memory_cost_kib, global = true)]
    memory_kib: u32,

    /// Token time-window size in seconds
    #[arg(long, default_value = "300", global = true)]
    window_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store and its salt
    Init,
    /// Issue a token for a path and operation
    Token(TargetArgs),
    /// Validate and consume a token
    Validate(ValidateArgs),
    /// Answer a challenge with a token
    Proof(ProofArgs),
    /// Check a challenge answer
    VerifyProof(VerifyProofArgs),
    /// Fingerprint a file
    Analyze(AnalyzeArgs),
    /// Show the audit trail
    Events(EventsArgs),
    /// Gate an event feed read from stdin
    Monitor(MonitorArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Target path
    #[arg(long)]
    path: String,

    /// Operation (read or write)
    #[arg(long, default_value = "write")]
    op: Operation,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Token (hex)
    #[arg(long)]
    token: String,

    /// Requester nonce (hex)
    #[arg(long)]
    client_nonce: String,

    /// Verifier nonce (hex)
    #[arg(long)]
    server_nonce: String,

    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args, Debug)]
struct ProofArgs {
    /// Token (hex)
    #[arg(long)]
    token: String,

    /// Challenge text
    #[arg(long)]
    challenge: String,
}

#[derive(Args, Debug)]
struct VerifyProofArgs {
    /// Expected token (hex)
    #[arg(long)]
    token: String,

    /// Challenge text
    #[arg(long)]
    challenge: String,

    /// Proof (hex)
    #[arg(long)]
    proof: String,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// File to fingerprint
    file: PathBuf,

    /// Bytes sampled for entropy
    #[arg(long, default_value_t = GateConfig::default().sample_bytes)]
    sample_bytes: usize,

    /// Most bytes read; longer files are digested by prefix and length
    #[arg(long, default_value_t = GateConfig::default().max_read_bytes)]
    max_read_bytes: u64,
}

#[derive(Args, Debug)]
struct EventsArgs {
    /// Only records for this path
    #[arg(long)]
    path: Option<String>,

    /// Maximum records, newest first
    #[arg(long, default_value = "20")]
    limit: usize,
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// Path bound into session tokens
    #[arg(long, default_value = "/")]
    scope: String,

    /// Session validity in seconds
    #[arg(long, default_value = "600")]
    validity_secs: u64,

    /// Entropy above which new content is flagged
    #[arg(long, default_value_t = GateConfig::default().encryption_threshold)]
    threshold: f64,

    /// Bytes sampled for entropy
    #[arg(long, default_value_t = GateConfig::default().sample_bytes)]
    sample_bytes: usize,

    /// Most bytes read per file; longer files are digested by prefix and length
    #[arg(long, default_value_t = GateConfig::default().max_read_bytes)]
    max_read_bytes: u64,

    /// Burst window in milliseconds
    #[arg(long, default_value = "1000")]
    burst_window_ms: u64,

    /// Events per burst window above which a burst is flagged
    #[arg(long, default_value_t = GateConfig::default().burst_threshold)]
    burst_threshold: usize,

    /// Event channel capacity
    #[arg(long, default_value = "1024")]
    capacity: usize,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let kdf = KdfParams { time_cost: cli.time_cost, memory_cost_kib: cli.memory_kib };
    kdf.validate()?;
    let granularity = Duration::from_secs(cli.window_secs);

    match &cli.command {
        Command::Init => {
            let store = RedbAuditStore::open(&cli.db)?;
            let env = SystemEnv::new();
            let salt = store.load_or_create_salt(|| {
                let mut salt = [0u8; 32];
                env.random_bytes(&mut salt);
                salt
            })?;
            // Derive once so a bad secret or cost fails here, not at first use.
            master_key(&cli, &store, kdf)?;
            tracing::info!(db = %cli.db.display(), "store initialised");
            emit(format_args!("salt {}", salt.to_hex()))?;
        },

        Command::Token(target) => {
            let store = RedbAuditStore::open(&cli.db)?;
            let master = master_key(&cli, &store, kdf)?;
            let validator = TokenValidator::new(SystemEnv::new(), granularity);
            let (request, token) = validator.issue(&master, &target.path, target.op);

            emit(format_args!("client_nonce {}", request.client_nonce))?;
            emit(format_args!("server_nonce {}", request.server_nonce))?;
            emit(format_args!("window {}", request.window))?;
            emit(format_args!("path {}", request.path))?;
            emit(format_args!("operation {}", request.operation))?;
            emit(format_args!("token {token}"))?;
        },

        Command::Validate(args) => {
            let store = RedbAuditStore::open(&cli.db)?;
            let master = master_key(&cli, &store, kdf)?;
            let validator = TokenValidator::new(SystemEnv::new(), granularity);
            let token = Token::from_hex(&args.token)?;
            let request = TokenRequest {
                client_nonce: Nonce::from_hex(&args.client_nonce)?,
                server_nonce: Nonce::from_hex(&args.server_nonce)?,
                window: validator.current_window(),
                path: args.target.path.clone(),
                operation: args.target.op,
            };

            match validator.validate(&token, &request, &master, &store) {
                Ok(granted) => {
                    tracing::info!(token = %token.log_prefix(), path = %request.path, "token granted");
                    emit(format_args!("GRANTED window {}", granted.window))?;
                },
                Err(reason) => {
                    tracing::warn!(token = %token.log_prefix(), reason = reason.as_str(), "token denied");
                    emit(format_args!("DENIED {}", reason.as_str()))?;
                    return Ok(ExitCode::FAILURE);
                },
            }
        },

        Command::Proof(args) => {
            let token = Token::from_hex(&args.token)?;
            emit(create_proof(&token, &args.challenge).to_hex())?;
        },

        Command::VerifyProof(args) => {
            let token = Token::from_hex(&args.token)?;
            let proof = Proof::from_hex(&args.proof)?;

            if validate_proof(&token, &args.challenge, &proof) {
                emit("VALID")?;
            } else {
                emit("INVALID")?;
                return Ok(ExitCode::FAILURE);
            }
        },

        Command::Analyze(args) => {
            let limits =
                ReadLimits { sample_bytes: args.sample_bytes, max_read_bytes: args.max_read_bytes };
            let fp = fingerprint_file(&args.file, limits)?;
            let class = EntropyClass::classify(fp.entropy);

            emit(format_args!("digest {}", fp.digest))?;
            emit(format_args!("size {}", fp.size_bytes))?;
            if fp.truncated {
                emit(format_args!("truncated at {} bytes", args.max_read_bytes))?;
            }
            emit(format_args!("entropy {:.4}", fp.entropy))?;
            emit(format_args!("class {}", class.label()))?;
        },

        Command::Events(args) => {
            let store = RedbAuditStore::open(&cli.db)?;
            for record in store.query_events(args.path.as_deref(), args.limit)? {
                let mut line = format!("{} {} {}", record.timestamp, record.kind, record.path);
                if let Some(src) = &record.previous_path {
                    line.push_str(&format!(" from={src}"));
                }
                if let Some(before) = record.entropy_before {
                    line.push_str(&format!(" entropy_before={before:.2}"));
                }
                if let Some(after) = record.entropy_after {
                    line.push_str(&format!(" entropy_after={after:.2}"));
                }
                if let Some(reason) = record.deny_reason {
                    line.push_str(&format!(" reason={}", reason.as_str()));
                }
                emit(line)?;
            }
        },

        Command::Monitor(args) => {
            let config = MonitorConfig {
                kdf,
                session: SessionConfig {
                    validity: Duration::from_secs(args.validity_secs),
                    window_granularity: granularity,
                    scope: args.scope.clone(),
                },
                gate: GateConfig {
                    encryption_threshold: args.threshold,
                    sample_bytes: args.sample_bytes,
                    max_read_bytes: args.max_read_bytes,
                    burst_window: Duration::from_millis(args.burst_window_ms),
                    burst_threshold: args.burst_threshold,
                },
                channel_capacity: args.capacity,
            };
            config.validate()?;

            let store = RedbAuditStore::open(&cli.db)?;
            let master = master_key(&cli, &store, config.kdf)?;
            run_monitor(&config, store, master).await?;
        },
    }

    Ok(ExitCode::SUCCESS)
}

/// Derive the master key from the secret and the store's salt.
fn master_key(
    cli: &Cli,
    store: &RedbAuditStore,
    kdf: KdfParams,
) -> Result<MasterKey, MonitorError> {
    let secret = std::env::var(&cli.secret_env).map_err(|_| {
        MonitorError::Config(format!("secret not set: export {} first", cli.secret_env))
    })?;
    if secret.is_empty() {
        return Err(MonitorError::Config(format!("{} is empty", cli.secret_env)));
    }

    let salt = store.require_salt()?;
    Ok(derive_master_key(secret.as_bytes(), salt.as_bytes(), kdf)?)
}

/// Feed stdin through the monitor until EOF or Ctrl-C.
async fn run_monitor(
    config: &MonitorConfig,
    store: RedbAuditStore,
    master: MasterKey,
) -> Result<(), Box<dyn Error>> {
    let session = SessionHandle::new(SystemEnv::new(), config.session.clone());
    let gate = EventGate::new(session, store, config.gate.clone());
    let (monitor, handle, mut reports) =
        Monitor::new(gate, master, config.effective_channel_capacity());

    let runner = tokio::spawn(monitor.run());
    let printer = tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            if emit(&report).is_err() {
                break;
            }
        }
    });

    tracing::info!(scope = %config.session.scope, "reading event feed from stdin");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                handle.shutdown();
                break;
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_feed_line(&line) {
                    Ok(parsed) => {
                        if handle.submit(parsed.into()).await.is_err() {
                            break;
                        }
                    },
                    Err(e) => tracing::warn!(line = %line, error = %e, "ignoring feed line"),
                }
            },
        }
    }

    drop(handle);
    let stats = runner.await?;
    printer.await?;

    emit(format_args!("final {stats}"))?;
    Ok(())
}

/// Write one line to stdout.
fn emit(line: impl Display) -> Result<(), MonitorError> {
    writeln!(std::io::stdout().lock(), "{line}")?;
    Ok(())
}
