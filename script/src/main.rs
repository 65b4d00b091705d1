//! Price-discrepancy proof CLI.
//!
//! Subcommands:
//!   prices  - Read both pools and print the normalized prices and difference
//!   prove   - Generate a proof for {price1, price2, threshold} and write it as JSON
//!   submit  - Submit a proof file to the verifier contract
//!   serve   - Run the HTTP proof endpoint

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use price_discrepancy_lib::CalldataArgs;
use price_discrepancy_script::{
    config::private_key_from_env, fetch_snapshot, init_tracing, server, AlloyVerifierChain,
    PipelineConfig, PipelineError, ProofRequest, ProofResponse, ProofService, SnarkjsProver,
    SubmissionOutcome, Submitter,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "price-discrepancy")]
#[command(about = "Prove and submit a cross-pool price discrepancy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProverArgs {
    /// Compiled witness program (.wasm); overrides WASM_PATH
    #[arg(long)]
    wasm: Option<PathBuf>,
    /// Proving key (.zkey); overrides ZKEY_PATH
    #[arg(long)]
    zkey: Option<PathBuf>,
    /// snarkjs command; overrides SNARKJS_BIN
    #[arg(long)]
    snarkjs: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read both pools and print the snapshot
    Prices,
    /// Generate a proof
    Prove {
        /// First normalized price (integer)
        #[arg(long)]
        price1: String,
        /// Second normalized price (integer)
        #[arg(long)]
        price2: String,
        /// Minimum difference, in scaled units
        #[arg(long)]
        threshold: String,
        /// Path to write the proof JSON
        #[arg(long, default_value = "proof.json")]
        output: PathBuf,
        #[command(flatten)]
        prover: ProverArgs,
    },
    /// Submit a proof file written by `prove`
    Submit {
        /// Path to the proof JSON
        #[arg(long, default_value = "proof.json")]
        input: PathBuf,
        /// Overrides RPC_URL
        #[arg(long)]
        rpc_url: Option<String>,
        /// Overrides VERIFIER_ADDRESS
        #[arg(long)]
        verifier: Option<String>,
    },
    /// Serve POST /api/generate_proof
    Serve {
        #[arg(long, default_value = "127.0.0.1:3001")]
        bind: SocketAddr,
        #[command(flatten)]
        prover: ProverArgs,
    },
}

fn staged(err: PipelineError) -> anyhow::Error {
    anyhow!(err.describe())
}

fn apply_prover_args(config: &mut PipelineConfig, args: ProverArgs) {
    if let Some(wasm) = args.wasm {
        config.prover.wasm_path = wasm;
    }
    if let Some(zkey) = args.zkey {
        config.prover.zkey_path = zkey;
    }
    if let Some(snarkjs) = args.snarkjs {
        config.prover.snarkjs_bin = snarkjs;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env()?;

    match cli.command {
        Commands::Prices => {
            let snapshot = fetch_snapshot(&config).await.map_err(staged)?;
            println!("{:<12} {}", format!("{}:", config.pools[0].label), snapshot.price1);
            println!("{:<12} {}", format!("{}:", config.pools[1].label), snapshot.price2);
            println!("{:<12} {}", "difference:", snapshot.difference);
        }
        Commands::Prove {
            price1,
            price2,
            threshold,
            output,
            prover,
        } => {
            apply_prover_args(&mut config, prover);
            let service = ProofService::new(SnarkjsProver::new(&config.prover), config.scaling);
            println!("[prove] Generating PLONK proof...");
            let response = service
                .handle(&ProofRequest::new(price1, price2, threshold))
                .await
                .map_err(staged)?;
            std::fs::write(&output, serde_json::to_string_pretty(&response)?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "[prove] {} proof elements, {} public signals written to {}",
                response.proof.len(),
                response.public_signals.len(),
                output.display()
            );
        }
        Commands::Submit {
            input,
            rpc_url,
            verifier,
        } => {
            if let Some(url) = rpc_url {
                config.submit.rpc_url = url;
            }
            if let Some(verifier) = verifier {
                config.submit.verifier_address = verifier.parse().context("invalid --verifier")?;
            }
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let response: ProofResponse = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a proof file", input.display()))?;
            let args = CalldataArgs::from(response);

            let private_key = private_key_from_env()?;
            let chain = AlloyVerifierChain::connect(&config.submit, &private_key)?;
            println!("[submit] Wallet:   {}", chain.sender());
            println!("[submit] Verifier: {}", config.submit.verifier_address);
            let submitter = Submitter::new(chain, &config.submit);
            let outcome = submitter
                .submit_with_progress(&args, |progress| {
                    if let SubmissionOutcome::Pending { tx_hash } = progress {
                        println!("[submit] Pending:  {tx_hash}");
                    }
                })
                .await
                .map_err(|e| staged(e.into()))?;
            let receipt = outcome.into_result().map_err(staged)?;
            println!(
                "[submit] Confirmed {} in block {:?} (gas used {})",
                receipt.tx_hash, receipt.block_number, receipt.gas_used
            );
        }
        Commands::Serve { bind, prover } => {
            apply_prover_args(&mut config, prover);
            let service = Arc::new(ProofService::new(
                SnarkjsProver::new(&config.prover),
                config.scaling,
            ));
            server::serve(service, bind).await?;
        }
    }

    Ok(())
}
