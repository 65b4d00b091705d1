//! End-to-end run: read prices → gate on threshold → prove → submit.
//!
//! Runs the whole pipeline against live pools and the deployed verifier:
//!   1. Reads slot0 from both pools concurrently and normalizes the prices
//!   2. Checks the displayed difference against THRESHOLD (blocked below it)
//!   3. Generates a PLONK proof with snarkjs
//!   4. Formats the calldata export into verifier arguments
//!   5. Submits: network check, dry run, send, confirm
//!
//! Usage:
//!   cargo run --release -p price-discrepancy-script --bin e2e
//!
//! Required env vars (from .env):
//!   PRIVATE_KEY       - Funded wallet private key on the target chain
//!
//! Optional env vars:
//!   THRESHOLD         - Minimum difference in scaled units (default: 1)
//!   everything read by PipelineConfig (RPC_URL, VERIFIER_ADDRESS, POOL_A_*, ...)

use anyhow::{Context, Result};
use price_discrepancy_lib::check_threshold;
use price_discrepancy_script::{
    config::private_key_from_env, fetch_snapshot, init_tracing, AlloyVerifierChain,
    PipelineConfig, PipelineError, ProofService, SnarkjsProver, SubmissionOutcome, Submitter,
    ValidatedRequest,
};

fn staged(err: PipelineError) -> anyhow::Error {
    anyhow::anyhow!(err.describe())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // ── Step 0: Load config ────────────────────────────────────────────
    println!("\n=== Price Discrepancy E2E ===\n");

    let config = PipelineConfig::from_env()?;
    let threshold: u64 = std::env::var("THRESHOLD")
        .unwrap_or_else(|_| "1".to_string())
        .parse()
        .context("THRESHOLD must be a non-negative integer")?;
    let private_key = private_key_from_env()?;

    println!("Pool A:           {} ({})", config.pools[0].address, config.pools[0].label);
    println!("Pool B:           {} ({})", config.pools[1].address, config.pools[1].label);
    println!("Verifier:         {}", config.submit.verifier_address);
    println!("Chain id:         {}", config.submit.expected_chain_id);
    println!("Scaling factor:   {}", config.scaling.scaling_factor);
    println!("Threshold:        {threshold}\n");

    // ── Step 1: Read prices ────────────────────────────────────────────
    println!("[1] Reading pool prices...");
    let snapshot = fetch_snapshot(&config).await.map_err(staged)?;
    println!("    {}: {}", config.pools[0].label, snapshot.price1);
    println!("    {}: {}", config.pools[1].label, snapshot.price2);
    println!("    Difference:   {}", snapshot.difference);

    // ── Step 2: Threshold gate ─────────────────────────────────────────
    println!("[2] Checking threshold...");
    check_threshold(snapshot.difference, threshold)
        .map_err(|e| staged(PipelineError::from(e)))?;
    println!("    {} >= {threshold}: OK", snapshot.difference);

    // ── Step 3: Generate proof ─────────────────────────────────────────
    println!("[3] Generating PLONK proof...");
    let service = ProofService::new(SnarkjsProver::new(&config.prover), config.scaling);
    let args = service
        .prove(&ValidatedRequest {
            price1: snapshot.price1,
            price2: snapshot.price2,
            threshold,
        })
        .await
        .map_err(staged)?;

    // ── Step 4: Calldata ───────────────────────────────────────────────
    println!(
        "[4] Calldata: {} proof elements, {} public signals",
        args.proof_args.len(),
        args.signal_args.len()
    );

    // ── Step 5: Submit ─────────────────────────────────────────────────
    let chain = AlloyVerifierChain::connect(&config.submit, &private_key)?;
    println!("[5] Submitting from {}...", chain.sender());
    let submitter = Submitter::new(chain, &config.submit);
    let outcome = submitter
        .submit_with_progress(&args, |progress| {
            if let SubmissionOutcome::Pending { tx_hash } = progress {
                println!("    Pending tx: {tx_hash}");
            }
        })
        .await
        .map_err(|e| staged(e.into()))?;
    let receipt = outcome.into_result().map_err(staged)?;
    println!("    Confirmed in block {:?}", receipt.block_number);
    println!("    Gas used: {}", receipt.gas_used);

    println!("\n=== E2E Passed! ===\n");
    Ok(())
}
