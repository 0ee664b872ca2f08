//! Subcommands and their execution.
//!
//! Commands read from and write to caller-supplied streams so they can be
//! driven from tests without a terminal.

use std::{
    io::{Read, Write},
    path::PathBuf,
    sync::Arc,
};

use clap::{Args, Subcommand};
use hdcrypt_core::{CodecConfig, CurveContext, Envelope, MessageCodec, SystemEnv};
use hdcrypt_crypto::{HdKeyPair, KeyPath, gen_shared_key, path_from_int, path_to_int};

use crate::error::CliError;

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the extended public key for an extended private key
    PublicKey {
        /// Extended private key (xprv...)
        #[arg(long, env = "HDCRYPT_LOCAL_KEY", hide_env_values = true)]
        local_key: String,
    },

    /// Print the 64-hex shared secret at a derivation path
    SharedKey {
        /// Key pair
        #[command(flatten)]
        keys: KeyArgs,

        /// Non-hardened derivation path, e.g. m/0/1/2
        #[arg(long)]
        path: KeyPath,
    },

    /// Encrypt a message and print the envelope JSON
    Encrypt {
        /// Key pair
        #[command(flatten)]
        keys: KeyArgs,

        /// Session settings
        #[command(flatten)]
        session: SessionArgs,

        /// Message text; read from stdin when omitted
        message: Option<String>,
    },

    /// Decrypt envelope JSON and print the plaintext
    Decrypt {
        /// Key pair
        #[command(flatten)]
        keys: KeyArgs,

        /// Session settings
        #[command(flatten)]
        session: SessionArgs,

        /// Envelope JSON; read from stdin when omitted
        envelope: Option<String>,
    },

    /// Encode an integer as a multi-segment path
    PathFromInt {
        /// Value to encode
        value: u64,
    },

    /// Decode a multi-segment path back into an integer
    PathToInt {
        /// Path produced by path-from-int, e.g. /97678973/11354
        path: String,
    },
}

/// Our key and the peer's key.
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Our extended private key (xprv...)
    #[arg(long, env = "HDCRYPT_LOCAL_KEY", hide_env_values = true)]
    pub local_key: String,

    /// Peer's extended public key (xpub...)
    #[arg(long, env = "HDCRYPT_REMOTE_KEY")]
    pub remote_key: String,
}

/// Session settings; flags override values from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// JSON file with basePath, useRandomPath, useTimeBase, expiryMs
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base derivation path for this session
    #[arg(long)]
    pub base_path: Option<KeyPath>,

    /// Do not append a random offset to the base path
    #[arg(long)]
    pub no_random_path: bool,

    /// Embed the send time in every derivation path
    #[arg(long)]
    pub time_base: bool,

    /// Reject envelopes older than this many milliseconds
    #[arg(long)]
    pub expiry_ms: Option<u64>,
}

impl SessionArgs {
    /// Resolve the effective session configuration.
    pub fn codec_config(&self) -> Result<CodecConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => CodecConfig::default(),
        };

        if let Some(base_path) = &self.base_path {
            config.base_path = base_path.clone();
        }
        if self.no_random_path {
            config.use_random_path = false;
        }
        if self.time_base {
            config.use_time_base = true;
        }
        if let Some(expiry_ms) = self.expiry_ms {
            config.expiry_ms = Some(expiry_ms);
        }

        Ok(config)
    }
}

fn load_config(path: &std::path::Path) -> Result<CodecConfig, CliError> {
    let config_error =
        |reason: String| CliError::Config { path: path.display().to_string(), reason };

    let text = std::fs::read_to_string(path).map_err(|err| config_error(err.to_string()))?;
    CodecConfig::from_json(&text).map_err(|err| config_error(err.to_string()))
}

fn session(keys: &KeyArgs, args: &SessionArgs) -> Result<MessageCodec<SystemEnv>, CliError> {
    let config = args.codec_config()?;
    let curve = Arc::new(CurveContext::new());
    Ok(MessageCodec::from_extended_keys(
        SystemEnv::new(),
        curve,
        &keys.local_key,
        &keys.remote_key,
        config,
    )?)
}

fn argument_or_input(
    argument: Option<String>,
    input: &mut impl Read,
) -> Result<Vec<u8>, CliError> {
    match argument {
        Some(text) => Ok(text.into_bytes()),
        None => {
            let mut buffer = Vec::new();
            input.read_to_end(&mut buffer)?;
            Ok(buffer)
        },
    }
}

/// Execute `command`, reading stdin-style input from `input` and writing the
/// result to `output`.
pub fn run(
    command: Command,
    input: &mut impl Read,
    output: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::PublicKey { local_key } => {
            let pair = HdKeyPair::from_xprv(&CurveContext::new(), &local_key)?;
            writeln!(output, "{}", pair.extended_public_key())?;
        },
        Command::SharedKey { keys, path } => {
            let curve = CurveContext::new();
            let path = path.to_string();
            let shared = gen_shared_key(&curve, &keys.local_key, &keys.remote_key, &path)?;
            writeln!(output, "{shared}")?;
        },
        Command::Encrypt { keys, session: args, message } => {
            let plaintext = argument_or_input(message, input)?;
            let mut codec = session(&keys, &args)?;
            let envelope = codec.encrypt(&plaintext)?;

            tracing::info!(crypt_path = %envelope.crypt_path, "Encrypted");
            writeln!(output, "{}", envelope.to_json())?;
        },
        Command::Decrypt { keys, session: args, envelope } => {
            let json = argument_or_input(envelope, input)?;
            let envelope = Envelope::from_json(&String::from_utf8_lossy(&json))?;
            let mut codec = session(&keys, &args)?;
            let plaintext = codec.decrypt(&envelope)?;

            output.write_all(&plaintext)?;
            output.flush()?;
        },
        Command::PathFromInt { value } => {
            writeln!(output, "{}", path_from_int(value))?;
        },
        Command::PathToInt { path } => {
            writeln!(output, "{}", path_to_int(&path)?)?;
        },
    }

    Ok(())
}
