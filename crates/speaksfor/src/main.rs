#![forbid(unsafe_code)]

//! speaksfor CLI — issue and verify speaks-for delegation credentials.

use base64::Engine;
use chrono::Utc;
use clap::{Parser, Subcommand};
use speaksfor_core::Error;
use speaksfor_credential::{IssueOptions, TailExpectation};
use speaksfor_keys::{loader, KeyFormat, ParsedCertificate};
use speaksfor_trust::TrustStore;
use std::path::PathBuf;
use std::process;

/// Default CA folder when `--ca` is not given.
const DEFAULT_CA_DIR: &str = "resources/ca";

#[derive(Parser)]
#[command(
    name = "speaksfor",
    about = "Speaks-For credentials — delegate a user's authority to a tool (sign, verify, encode)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a signed speaks-for credential
    Sign {
        /// The user's credential file (private key + certificate chain)
        #[arg(short = 'c', long)]
        credential: PathBuf,

        /// Credential file format
        #[arg(short = 'f', long, default_value = "pem")]
        format: String,

        /// Password for an encrypted credential file
        #[arg(short = 'p', long)]
        password: Option<String>,

        /// The tool's certificate (PEM or DER)
        #[arg(short = 't', long = "tool-cert")]
        tool_cert: PathBuf,

        /// Validity in whole days
        #[arg(short = 'd', long, default_value_t = 120)]
        days: i64,

        /// Write the credential to this file as well as stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Emit the raw XML instead of base64
        #[arg(long = "raw-xml")]
        raw_xml: bool,

        /// Verbose output (-v progress, -vv canonical buffers)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },

    /// Verify a speaks-for credential
    Verify {
        /// The credential file
        #[arg(short = 's', long)]
        credential: PathBuf,

        /// Credential input format
        #[arg(short = 'f', long, default_value = "base64")]
        format: String,

        /// CA folder with subject-hash indexed anchors
        #[arg(long = "ca", default_value = DEFAULT_CA_DIR)]
        ca_dir: PathBuf,

        /// The expected tool certificate (PEM or DER)
        #[arg(short = 't', long = "tool-cert", conflicts_with = "keyid")]
        tool_cert: Option<PathBuf>,

        /// The expected tool keyid (lowercase hex SHA-1)
        #[arg(short = 'k', long)]
        keyid: Option<String>,

        /// Verbose output (-v progress, -vv canonical buffers)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },

    /// Base64 URL-safe encode a file (RFC 4648 §5)
    Encode {
        /// Input file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sign {
            credential,
            format,
            password,
            tool_cert,
            days,
            output,
            raw_xml,
            verbose,
        } => cmd_sign(
            credential, &format, password, tool_cert, days, output, raw_xml, verbose,
        ),
        Commands::Verify {
            credential,
            format,
            ca_dir,
            tool_cert,
            keyid,
            verbose,
        } => cmd_verify(credential, &format, ca_dir, tool_cert, keyid, verbose),
        Commands::Encode { input, output } => cmd_encode(input, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_sign(
    credential: PathBuf,
    format: &str,
    password: Option<String>,
    tool_cert: PathBuf,
    days: i64,
    output: Option<PathBuf>,
    raw_xml: bool,
    verbose: u8,
) -> Result<(), Error> {
    let key_format = KeyFormat::parse(format)?;
    let key_bytes = read_file(&credential)?;
    let bundle = loader::load_bundle(&key_bytes, key_format, password.as_deref())?;

    let tool_bytes = read_file(&tool_cert)?;
    let tool = ParsedCertificate::load(&tool_bytes)?;
    match tool.public_id() {
        Some(public_id) => {
            if verbose > 0 {
                eprintln!("Tool publicId: {public_id}");
            }
        }
        None => eprintln!("note: tool certificate carries no urn:publicid SubjectAltName"),
    }

    if verbose > 0 {
        eprintln!("User keyid: {}", bundle.user_keyid()?);
        eprintln!("Tool keyid: {}", tool.keyid()?);
    }

    let options = IssueOptions {
        days,
        debug: verbose >= 2,
        ..Default::default()
    };
    let xml = speaksfor_credential::issue(&bundle, &tool, options, Utc::now())?;

    let out_bytes = if raw_xml {
        xml.into_bytes()
    } else {
        let mut encoded = speaksfor_keys::encode::wrap_base64(xml.as_bytes());
        encoded.push('\n');
        encoded.into_bytes()
    };

    if let Some(path) = &output {
        std::fs::write(path, &out_bytes)
            .map_err(|e| Error::Other(format!("{}: {e}", path.display())))?;
    }
    use std::io::Write;
    std::io::stdout()
        .write_all(&out_bytes)
        .map_err(|e| Error::Other(format!("stdout: {e}")))?;
    Ok(())
}

fn cmd_verify(
    credential: PathBuf,
    format: &str,
    ca_dir: PathBuf,
    tool_cert: Option<PathBuf>,
    keyid: Option<String>,
    verbose: u8,
) -> Result<(), Error> {
    let raw = read_file(&credential)?;
    let xml = match format {
        "xml" => String::from_utf8(raw)
            .map_err(|e| Error::InputParse(format!("credential is not UTF-8: {e}")))?,
        "base64" => {
            let text = String::from_utf8(raw)
                .map_err(|e| Error::InputParse(format!("credential is not UTF-8: {e}")))?;
            let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(&clean)
                .map_err(|e| Error::Base64(format!("credential: {e}")))?;
            String::from_utf8(decoded)
                .map_err(|e| Error::InputParse(format!("decoded credential is not UTF-8: {e}")))?
        }
        other => {
            return Err(Error::InputParse(format!(
                "unknown credential format: {other} (expected base64 or xml)"
            )))
        }
    };

    let tail = match (tool_cert, keyid) {
        (Some(path), None) => {
            let cert = ParsedCertificate::load(&read_file(&path)?)?;
            Some(TailExpectation::ToolCertificate(cert))
        }
        (None, Some(hex)) => Some(TailExpectation::KeyId(hex.to_lowercase())),
        (None, None) => None,
        // clap's conflicts_with already rejects this pairing.
        (Some(_), Some(_)) => {
            return Err(Error::UsageConflict(
                "--tool-cert and --keyid are mutually exclusive".into(),
            ))
        }
    };

    let store = TrustStore::open(&ca_dir)?;
    if verbose > 0 {
        eprintln!("Trust anchors: {} (from {})", store.len(), ca_dir.display());
    }

    match speaksfor_credential::verify(&xml, &store, tail.as_ref(), Utc::now(), verbose >= 2) {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            if verbose > 0 {
                eprintln!("Head keyid: {}", report.head_keyid);
                eprintln!("Tail keyid: {}", report.tail_keyid);
                eprintln!("Expires:    {}", report.expires.to_rfc3339());
                if let Some(public_id) = &report.tool_public_id {
                    eprintln!("Tool publicId: {public_id}");
                }
            }
            println!("OK");
            Ok(())
        }
        Err(e) => {
            eprintln!("INVALID: {e}");
            process::exit(1);
        }
    }
}

fn cmd_encode(input: PathBuf, output: Option<PathBuf>) -> Result<(), Error> {
    let data = read_file(&input)?;
    let mut encoded = base64::engine::general_purpose::URL_SAFE.encode(&data);
    encoded.push('\n');
    match output {
        Some(path) => std::fs::write(&path, encoded.as_bytes())
            .map_err(|e| Error::Other(format!("{}: {e}", path.display()))),
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(encoded.as_bytes())
                .map_err(|e| Error::Other(format!("stdout: {e}")))
        }
    }
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}
