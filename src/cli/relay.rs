use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

use super::keys::KeyFile;
use super::{read_file, write_file, CliError};
use crate::crypto::{Ed25519Recovery, SignatureRecovery};
use crate::encoding::Call;
use crate::identity::{Identity, ModuleId};
use crate::modules::{GuardianCall, RecoveryCall};
use crate::relay::{RelayRequest, DEFAULT_GAS_LIMIT};

/// Relayable entry points of the standard modules.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    RequestAddition,
    ConfirmAddition,
    CancelAddition,
    RequestRevocation,
    ConfirmRevocation,
    CancelRevocation,
    ExecuteRecovery,
    FinalizeRecovery,
    CancelRecovery,
    TransferOwnership,
}

impl CallKind {
    /// Encode the payload; `target` is the guardian or new owner.
    pub fn to_call(self, account: Identity, target: Option<Identity>) -> Result<Call, CliError> {
        let require_target = || target.ok_or_else(|| CliError::Usage(format!("--target is required for {:?}", self)));
        let call = match self {
            CallKind::RequestAddition => GuardianCall::RequestAddition(require_target()?).to_call(account),
            CallKind::ConfirmAddition => GuardianCall::ConfirmAddition(require_target()?).to_call(account),
            CallKind::CancelAddition => GuardianCall::CancelAddition(require_target()?).to_call(account),
            CallKind::RequestRevocation => GuardianCall::RequestRevocation(require_target()?).to_call(account),
            CallKind::ConfirmRevocation => GuardianCall::ConfirmRevocation(require_target()?).to_call(account),
            CallKind::CancelRevocation => GuardianCall::CancelRevocation(require_target()?).to_call(account),
            CallKind::ExecuteRecovery => RecoveryCall::ExecuteRecovery(require_target()?).to_call(account),
            CallKind::FinalizeRecovery => RecoveryCall::FinalizeRecovery.to_call(account),
            CallKind::CancelRecovery => RecoveryCall::CancelRecovery.to_call(account),
            CallKind::TransferOwnership => RecoveryCall::TransferOwnership(require_target()?).to_call(account),
        };
        Ok(call?)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum RelayCommands {
    /// Build an unsigned relay request
    Build {
        #[arg(long)]
        module: ModuleId,
        #[arg(long)]
        account: Identity,
        #[arg(long, value_enum)]
        call: CallKind,
        /// Guardian or new owner the call acts on
        #[arg(long)]
        target: Option<Identity>,
        #[arg(long)]
        nonce: u64,
        #[arg(long, default_value_t = 0)]
        gas_price: u64,
        #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
        gas_limit: u64,
        #[arg(long)]
        refund_token: Option<String>,
        #[arg(long)]
        refund_address: Option<Identity>,
        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the signing digest of a request
    Digest {
        #[arg(long)]
        request: PathBuf,
    },
    /// Add signatures to a request file, keeping them in signer order
    Sign {
        #[arg(long)]
        request: PathBuf,
        #[arg(long = "key", required = true)]
        keys: Vec<PathBuf>,
    },
}

pub fn handle_relay_command(cmd: RelayCommands) -> Result<(), CliError> {
    match cmd {
        RelayCommands::Build {
            module,
            account,
            call,
            target,
            nonce,
            gas_price,
            gas_limit,
            refund_token,
            refund_address,
            out,
        } => {
            let payload = call.to_call(account, target)?;
            let mut request = RelayRequest::new(module, &payload, nonce);
            request.gas_price = gas_price;
            request.gas_limit = gas_limit;
            request.refund_token = refund_token;
            request.refund_address = refund_address;
            let json = serde_json::to_string_pretty(&request)?;
            match out {
                Some(path) => {
                    write_file(&path, &json)?;
                    println!("Request written to '{}'", path.display());
                }
                None => println!("{}", json),
            }
        }
        RelayCommands::Digest { request } => {
            let request: RelayRequest = serde_json::from_str(&read_file(&request)?)?;
            println!("0x{}", hex::encode(request.signing_digest()));
        }
        RelayCommands::Sign { request: path, keys } => {
            let mut request: RelayRequest = serde_json::from_str(&read_file(&path)?)?;
            let added = add_signatures(&mut request, &keys)?;
            write_file(&path, &serde_json::to_string_pretty(&request)?)?;
            println!(
                "Added {} signature(s), request now carries {}",
                added,
                request.signatures.len()
            );
        }
    }
    Ok(())
}

/// Merge signatures from `keys` with those already present, sorted by signer.
fn add_signatures(request: &mut RelayRequest, keys: &[PathBuf]) -> Result<usize, CliError> {
    let digest = request.signing_digest();
    let recovery = Ed25519Recovery;

    let mut signed: Vec<(Identity, Vec<u8>)> = Vec::with_capacity(request.signatures.len() + keys.len());
    for signature in &request.signatures {
        let signer = recovery
            .recover(&digest, signature)
            .ok_or_else(|| CliError::Usage("request carries a signature that does not verify".to_string()))?;
        signed.push((signer, signature.clone()));
    }

    let mut added = 0;
    for path in keys {
        let keypair = KeyFile::load(path)?;
        let signer = keypair.identity();
        if signed.iter().any(|(s, _)| *s == signer) {
            println!("Skipping {}: already signed", signer);
            continue;
        }
        signed.push((signer, keypair.sign_digest(&digest)));
        added += 1;
    }

    signed.sort_by_key(|(signer, _)| *signer);
    request.signatures = signed.into_iter().map(|(_, sig)| sig).collect();
    Ok(added)
}
