#[cfg(test)]
mod tests {
    use alloy_primitives::TxHash;
    use price_discrepancy_lib::*;
    use price_discrepancy_script::{
        ChainError, PipelineError, ProofBundle, ProofError, ProofRequest, ProofService, Prover,
        ProverOutput, SubmissionOutcome, SubmitConfig, Submitter, TxReceiptSummary,
        ValidatedRequest, VerifierChain,
    };
    use rand::Rng;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Stands in for snarkjs: signals are `[1, price1, price2, threshold]`, the
    /// proof is 24 words, and the export uses the real back-to-back layout.
    #[derive(Default)]
    struct EchoProver {
        proofs: AtomicUsize,
    }

    impl Prover for EchoProver {
        async fn full_prove(&self, input: &ScaledInput) -> Result<ProverOutput, ProofError> {
            self.proofs.fetch_add(1, Ordering::SeqCst);
            Ok(ProverOutput {
                proof: json!({"protocol": "plonk", "curve": "bn128", "A": ["1", "2", "1"]}),
                public_signals: vec![
                    "1".into(),
                    input.price1.to_string(),
                    input.price2.to_string(),
                    input.threshold.to_string(),
                ],
            })
        }

        async fn export_calldata(&self, output: &ProverOutput) -> Result<String, ProofError> {
            let proof: Vec<String> = (1..=PLONK_PROOF_ELEMENTS)
                .map(|i| format!("\"0x{:064x}\"", i))
                .collect();
            let signals: Vec<String> = output
                .public_signals
                .iter()
                .map(|s| format!("\"0x{:064x}\"", s.parse::<u64>().unwrap()))
                .collect();
            Ok(format!("[{}][{}]", proof.join(","), signals.join(",")))
        }
    }

    struct FakeChain {
        chain_id: u64,
        accepts: bool,
        sent: Mutex<Vec<CalldataArgs>>,
    }

    impl FakeChain {
        fn new(chain_id: u64, accepts: bool) -> Self {
            Self {
                chain_id,
                accepts,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<CalldataArgs> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl VerifierChain for FakeChain {
        async fn chain_id(&self) -> Result<u64, ChainError> {
            Ok(self.chain_id)
        }

        async fn simulate(&self, args: &CalldataArgs, _block: Option<u64>) -> Result<(), ChainError> {
            if self.accepts && args.plonk_proof().is_some() {
                Ok(())
            } else {
                Err(ChainError::Reverted("PlonkVerifier: invalid proof".into()))
            }
        }

        async fn broadcast(&self, args: &CalldataArgs, _gas_limit: u64) -> Result<TxHash, ChainError> {
            self.sent.lock().unwrap().push(args.clone());
            Ok(TxHash::repeat_byte(0x11))
        }

        async fn confirm(&self, tx_hash: TxHash) -> Result<TxReceiptSummary, ChainError> {
            Ok(TxReceiptSummary {
                tx_hash,
                block_number: Some(1_234),
                gas_used: 410_000,
                success: self.accepts,
            })
        }
    }

    fn submit_config() -> SubmitConfig {
        SubmitConfig {
            rpc_url: "http://localhost:8545".into(),
            verifier_address: Default::default(),
            expected_chain_id: 84532,
            gas_limit: 1_000_000,
        }
    }

    /// The caller-side flow: gate, prove, format, submit.
    async fn run(
        service: &ProofService<EchoProver>,
        submitter: &Submitter<FakeChain>,
        request: ValidatedRequest,
    ) -> Result<SubmissionOutcome, PipelineError> {
        let difference = display_difference(request.price1, request.price2, service.scaling())?;
        check_threshold(difference, request.threshold)?;
        let args = service.prove(&request).await?;
        Ok(submitter.submit(&args).await?)
    }

    fn request(price1: u64, price2: u64, threshold: u64) -> ValidatedRequest {
        ValidatedRequest {
            price1: NormalizedPrice(U256::from(price1)),
            price2: NormalizedPrice(U256::from(price2)),
            threshold,
        }
    }

    // =========================================================================
    //                              END TO END
    // =========================================================================

    #[tokio::test]
    async fn test_end_to_end_confirmed() {
        let service = ProofService::new(EchoProver::default(), ScalingConfig::default());
        let submitter = Submitter::new(FakeChain::new(84532, true), &submit_config());

        let outcome = run(&service, &submitter, request(3_000_000_000_000, 3_150_000_000_000, 10))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmissionOutcome::Confirmed { .. }), "{outcome:?}");

        let sent = submitter.chain().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].proof_args.len(), PLONK_PROOF_ELEMENTS);
        assert_eq!(
            sent[0].signal_args,
            vec![U256::from(1u64), U256::from(300u64), U256::from(315u64), U256::from(10u64)]
        );
    }

    #[tokio::test]
    async fn test_end_to_end_reverted() {
        let service = ProofService::new(EchoProver::default(), ScalingConfig::default());
        let submitter = Submitter::new(FakeChain::new(84532, false), &submit_config());

        let outcome = run(&service, &submitter, request(3_000_000_000_000, 3_150_000_000_000, 10))
            .await
            .unwrap();
        match outcome {
            SubmissionOutcome::Reverted { reason, .. } => {
                assert_eq!(reason, "PlonkVerifier: invalid proof")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // The failed dry run did not stop the send.
        assert_eq!(submitter.chain().sent().len(), 1);
    }

    #[tokio::test]
    async fn test_eighteen_decimal_prices_scale_by_ten_to_the_tenth() {
        let service = ProofService::new(EchoProver::default(), ScalingConfig::default());
        let response = service
            .handle(&ProofRequest::new(
                "3000000000000000000",
                "3150000000000000000",
                "10",
            ))
            .await
            .unwrap();
        assert_eq!(
            response.public_signals,
            vec![
                U256::from(1u64),
                U256::from(300_000_000u64),
                U256::from(315_000_000u64),
                U256::from(10u64)
            ]
        );
    }

    #[tokio::test]
    async fn test_gate_blocks_before_proving() {
        let service = ProofService::new(EchoProver::default(), ScalingConfig::default());
        let submitter = Submitter::new(FakeChain::new(84532, true), &submit_config());

        // difference 10, threshold 15
        let err = run(&service, &submitter, request(3_000_000_000_000, 3_100_000_000_000, 15))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ThresholdNotMet(_)));

        // threshold 0 is never allowed
        let err = run(&service, &submitter, request(1, 3_100_000_000_000, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ThresholdNotMet(GateError::ZeroThreshold)));

        assert_eq!(service.requester().prover().proofs.load(Ordering::SeqCst), 0);
        assert!(submitter.chain().sent().is_empty());

        // difference 10, threshold 10
        let outcome = run(&service, &submitter, request(3_000_000_000_000, 3_100_000_000_000, 10))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmissionOutcome::Confirmed { .. }));
    }

    #[tokio::test]
    async fn test_wrong_network_sends_nothing() {
        let service = ProofService::new(EchoProver::default(), ScalingConfig::default());
        let submitter = Submitter::new(FakeChain::new(1, true), &submit_config());
        let outcome = run(&service, &submitter, request(3_000_000_000_000, 3_150_000_000_000, 10))
            .await
            .unwrap();
        let err = outcome.into_result().unwrap_err();
        assert_eq!(
            err,
            PipelineError::NetworkMismatch {
                expected: 84532,
                actual: 1
            }
        );
        assert!(submitter.chain().sent().is_empty());
    }

    #[tokio::test]
    async fn test_pool_snapshot_feeds_the_pipeline() {
        let q96 = U160::from(1u128 << 96);
        // USDC/WETH on one chain, WETH/USDC on the other, both near 3000.
        let usdc_weth = RawSlot0::new(q96 * U160::from(18_257_418u64) / U160::from(1_000u64));
        let weth_usdc = RawSlot0::new(q96 * U160::from(54_772u64) / U160::from(1_000_000_000u64));
        let snapshot = PriceSnapshot::compute(
            (
                &usdc_weth,
                &PriceFormula {
                    orientation: Orientation::QuotePerBase,
                    decimals_adjustment: -12,
                    output_decimals: 18,
                },
            ),
            (
                &weth_usdc,
                &PriceFormula {
                    orientation: Orientation::BasePerQuote,
                    decimals_adjustment: 12,
                    output_decimals: 18,
                },
            ),
            &ScalingConfig::default(),
        )
        .unwrap();
        assert!(snapshot.price1.value() > U256::ZERO);
        assert!(snapshot.price2.value() > U256::ZERO);

        let service = ProofService::new(EchoProver::default(), ScalingConfig::default());
        let args = service
            .prove(&ValidatedRequest {
                price1: snapshot.price1,
                price2: snapshot.price2,
                threshold: 1,
            })
            .await
            .unwrap();
        let scaling = ScalingConfig::default();
        assert_eq!(args.signal_args[1], snapshot.price1.scaled(&scaling).unwrap());
        assert_eq!(args.signal_args[2], snapshot.price2.scaled(&scaling).unwrap());
    }

    // =========================================================================
    //                          RANDOMIZED PROPERTIES
    // =========================================================================

    fn random_formula(rng: &mut impl Rng) -> PriceFormula {
        PriceFormula {
            orientation: if rng.gen() {
                Orientation::QuotePerBase
            } else {
                Orientation::BasePerQuote
            },
            decimals_adjustment: rng.gen_range(-18..=18),
            output_decimals: rng.gen_range(0..=18),
        }
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let slot0 = RawSlot0::new(U160::from(rng.gen::<u128>()));
            let formula = random_formula(&mut rng);
            assert_eq!(normalize(&slot0, &formula), normalize(&slot0, &formula));
        }
    }

    #[test]
    fn test_difference_is_symmetric_and_non_negative() {
        let mut rng = rand::thread_rng();
        let scaling = ScalingConfig::default();
        for _ in 0..1_000 {
            let a = NormalizedPrice(U256::from(rng.gen::<u128>()));
            let b = NormalizedPrice(U256::from(rng.gen::<u128>()));
            let forward = display_difference(a, b, &scaling).unwrap();
            let backward = display_difference(b, a, &scaling).unwrap();
            assert_eq!(forward, backward);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            assert_eq!(forward + lo.scaled(&scaling).unwrap(), hi.scaled(&scaling).unwrap());
        }
    }

    #[test]
    fn test_scaling_stays_within_one_factor() {
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let scaling = ScalingConfig {
                scaling_factor: rng.gen_range(1..=u64::MAX),
                circuit_input_bits: 64,
            };
            let factor = U256::from(scaling.scaling_factor);
            let price = NormalizedPrice(U256::from(rng.gen::<u128>()));
            let back = price.scaled(&scaling).unwrap() * factor;
            assert!(back <= price.value());
            assert!(price.value() - back < factor);
        }
    }

    #[test]
    fn test_proof_bundle_is_all_or_nothing() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let with_proof: bool = rng.gen();
            let with_signals: bool = rng.gen();
            let output = ProverOutput {
                proof: if with_proof {
                    json!({"protocol": "plonk"})
                } else {
                    serde_json::Value::Null
                },
                public_signals: if with_signals {
                    (0..rng.gen_range(1..5)).map(|_| rng.gen::<u32>().to_string()).collect()
                } else {
                    Vec::new()
                },
            };
            match ProofBundle::new(output) {
                Ok(bundle) => {
                    assert!(with_proof && with_signals);
                    assert!(bundle.proof().is_object());
                    assert!(!bundle.public_signals().is_empty());
                }
                Err(e) => {
                    assert!(!(with_proof && with_signals));
                    assert!(matches!(e, ProofError::ProverFailure(_)));
                }
            }
        }
    }

    #[test]
    fn test_random_signals_promote_either_way() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let value: u128 = rng.gen();
            assert_eq!(promote(&value.to_string()), Ok(U256::from(value)));
            assert_eq!(promote(&format!("0x{value:x}")), Ok(U256::from(value)));
        }
    }
}
