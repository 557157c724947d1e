use std::sync::Arc;

use onchain::{create_p2tr, derive_change_address, hash160, p2wpkh_script, Network, PSBT_MAGIC};
use sweeper_core::{KvStore, MemKv, PlanError, SpendOutput, Sweeper, TransactionPlan, Utxo, WeightedAddr};

fn utxo(txid_char: char, value_sats: i64, confirmed: bool) -> Utxo {
    Utxo {
        txid: txid_char.to_string().repeat(64),
        vout: 0,
        value_sats,
        address: "tb1in".into(),
        confirmed,
    }
}

fn test_sweeper() -> Sweeper {
    let mut s = Sweeper::new(vec![2u8; 33], Network::BitcoinTestnet);
    s.set_test_mode(true);
    s
}

#[test]
fn network_drives_the_derived_asset() {
    let mut s = test_sweeper();
    assert_eq!(s.network(), Network::BitcoinTestnet);
    assert_eq!(s.asset(), onchain::Asset::Btc);
    s.set_network(Network::LitecoinMainnet);
    assert_eq!(s.asset(), onchain::Asset::Ltc);
}

fn assert_conserved(plan: &TransactionPlan) {
    assert_eq!(
        plan.total_in(),
        plan.total_out() + plan.fee_sats,
        "inputs must equal outputs plus fee"
    );
    assert!(plan.fee_sats >= 0);
}

#[test]
fn three_utxo_spend_converges() {
    let mut s = test_sweeper();
    s.index(utxo('a', 80_000, true)).unwrap();
    s.index(utxo('b', 90_000, true)).unwrap();
    s.index(utxo('c', 120_000, true)).unwrap();

    let plan = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 150_000,
        }])
        .unwrap();

    assert!(plan.fee_sats > 0);
    assert_conserved(&plan);
    // Ascending selection: the two smallest cover 150k plus fee.
    assert_eq!(plan.inputs.len(), 2);
    assert_eq!(plan.inputs[0].value_sats, 80_000);
    assert_eq!(plan.inputs[1].value_sats, 90_000);
    assert_eq!(plan.fee_sats, 940);
    assert_eq!(plan.change_idxs, vec![1]);
    assert_eq!(plan.outputs[1].value_sats, 19_060);
    assert!(plan.psbt.serialize().starts_with(PSBT_MAGIC));
}

#[test]
fn dust_indexing_is_rejected() {
    let mut s = test_sweeper();
    s.set_dust_rate(600, 0.50, 55_000.0);
    // Effective floor is ceil(0.50 / 55_000 * 1e8) = 910.
    let err = s.index(utxo('d', 100, true)).unwrap_err();
    assert!(matches!(
        err,
        PlanError::DustBelowThreshold { value: 100, floor: 910 }
    ));

    // Idempotent: the same UTXO fails again regardless of what else landed.
    s.index(utxo('e', 80_000, true)).unwrap();
    assert!(matches!(
        s.index(utxo('d', 100, true)),
        Err(PlanError::DustBelowThreshold { .. })
    ));
}

#[test]
fn sub_dust_change_is_absorbed_into_the_fee() {
    let mut s = test_sweeper();
    s.index(utxo('a', 151_500, true)).unwrap();
    let plan = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 150_000,
        }])
        .unwrap();

    assert!(plan.change_idxs.is_empty());
    assert_eq!(plan.outputs.len(), 1);
    assert_eq!(plan.fee_sats, 1_500);
    assert_conserved(&plan);
}

#[test]
fn weighted_change_lands_on_the_configured_addresses() {
    let mut s = test_sweeper();
    s.set_allocation_weights(vec![
        WeightedAddr {
            address: "tb1walletA".into(),
            weight_bp: 7_000,
        },
        WeightedAddr {
            address: "tb1walletB".into(),
            weight_bp: 3_000,
        },
    ]);
    s.index(utxo('a', 300_000, true)).unwrap();

    let plan = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 150_000,
        }])
        .unwrap();

    assert_conserved(&plan);
    assert_eq!(plan.change_idxs, vec![1, 2]);
    assert_eq!(plan.outputs[1].address, "tb1walletA");
    assert_eq!(plan.outputs[2].address, "tb1walletB");
    // 70/30 of the fee-adjusted change, residual on the last entry.
    let change_sum = plan.outputs[1].value_sats + plan.outputs[2].value_sats;
    assert_eq!(change_sum, 300_000 - 150_000 - plan.fee_sats);
    assert!(plan.outputs[1].value_sats > plan.outputs[2].value_sats);
}

#[test]
fn split_change_produces_bounded_chunks() {
    let mut s = test_sweeper();
    s.set_change_split(3, 0, 20_000);
    s.index(utxo('a', 500_000, true)).unwrap();

    let plan = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 100_000,
        }])
        .unwrap();

    assert_conserved(&plan);
    assert_eq!(plan.change_idxs.len(), 3);
    for &idx in &plan.change_idxs {
        assert!(plan.outputs[idx].value_sats >= 20_000);
        assert_eq!(plan.outputs[idx].address, "tb1test_change_address");
    }
}

#[test]
fn target_chunk_size_overrides_the_part_count() {
    let mut s = test_sweeper();
    s.set_change_split(2, 60_000, 20_000);
    s.index(utxo('a', 500_000, true)).unwrap();

    let plan = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 100_000,
        }])
        .unwrap();

    // change of ~399k over 60k target chunks yields 6 parts, not 2.
    assert_eq!(plan.change_idxs.len(), 6);
    assert_conserved(&plan);
}

#[test]
fn unconfirmed_inputs_are_capped_per_plan() {
    let mut s = test_sweeper();
    s.set_unconfirmed_policy(true, 2, 5);
    for (i, c) in ['a', 'b', 'c', 'd'].iter().enumerate() {
        s.index(utxo(*c, 50_000 + i as i64, false)).unwrap();
    }
    s.index(utxo('e', 200_000, true)).unwrap();

    let plan = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 150_000,
        }])
        .unwrap();

    let unconf = plan.inputs.iter().filter(|u| !u.confirmed).count();
    assert!(unconf <= 2, "got {unconf} unconfirmed inputs");
    assert_conserved(&plan);
}

#[test]
fn unconfirmed_rejected_when_disallowed() {
    let mut s = test_sweeper();
    s.set_unconfirmed_policy(false, 0, 2);
    assert!(matches!(
        s.index(utxo('a', 50_000, false)),
        Err(PlanError::UnconfirmedNotAllowed)
    ));
}

#[test]
fn chain_depth_accumulates_and_gates_indexing() {
    let mut s = test_sweeper();
    s.set_unconfirmed_policy(true, 2, 2);
    s.index(utxo('a', 100_000, false)).unwrap();

    for _ in 0..2 {
        let plan = s
            .spend(vec![SpendOutput {
                address: "tb1dest".into(),
                value_sats: 50_000,
            }])
            .unwrap();
        assert!(!plan.inputs[0].confirmed);
    }
    assert_eq!(s.pending_chain_depth().get(&"a".repeat(64)), Some(&2));

    // Depth 2 reached: another child of the same txid must not index.
    let err = s
        .index(Utxo {
            vout: 1,
            ..utxo('a', 100_000, false)
        })
        .unwrap_err();
    assert!(matches!(
        err,
        PlanError::ChainDepthExceeded { depth: 2, max: 2 }
    ));
}

#[test]
fn failed_plans_leave_state_untouched() {
    let mut s = test_sweeper();
    s.index(utxo('f', 100_000, false)).unwrap();

    let err = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 200_000,
        }])
        .unwrap_err();
    assert!(matches!(err, PlanError::InsufficientFunds));
    assert!(s.pending_chain_depth().is_empty());
    assert_eq!(s.indexed_utxos().len(), 1);
}

#[test]
fn empty_index_reports_no_spendables() {
    let mut s = test_sweeper();
    assert!(matches!(
        s.spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 1_000,
        }]),
        Err(PlanError::NoSpendableUtxos)
    ));
}

#[test]
fn consolidation_sweeps_everything_into_one_output() {
    let mut s = test_sweeper();
    for c in ['a', 'b', 'c'] {
        s.index(utxo(c, 100_000, true)).unwrap();
    }

    let plan = s.consolidate_all("tb1dest").unwrap();
    assert_eq!(plan.inputs.len(), 3);
    assert_eq!(plan.outputs.len(), 1);
    // estimate(3 inputs, 1 output) = 215 vbytes at 5 sat/vB.
    assert_eq!(plan.fee_sats, 1_075);
    assert_eq!(plan.outputs[0].value_sats, 300_000 - 1_075);
    assert!(plan.change_idxs.is_empty());
    assert_conserved(&plan);
    assert!(plan.psbt.serialize().starts_with(PSBT_MAGIC));
}

#[test]
fn consolidation_fails_when_the_residual_is_dust() {
    let mut s = test_sweeper();
    s.index(utxo('a', 1_000, true)).unwrap();
    // 1_000 - 495 fee = 505, below the 910 effective floor.
    assert!(matches!(
        s.consolidate_all("tb1dest"),
        Err(PlanError::ConsolidationBelowDust)
    ));
}

#[test]
fn spend_even_distributes_across_destinations() {
    let mut s = test_sweeper();
    s.index(utxo('a', 500_000, true)).unwrap();

    let plan = s
        .spend_even(
            &["tb1x".to_string(), "tb1y".to_string()],
            100_000,
            10_000,
        )
        .unwrap();
    assert_eq!(plan.outputs[0].value_sats, 50_000);
    assert_eq!(plan.outputs[1].value_sats, 50_000);
    assert_eq!(plan.outputs[0].address, "tb1x");
    assert_eq!(plan.outputs[1].address, "tb1y");
    assert_conserved(&plan);
}

#[test]
fn spend_weighted_builds_fixed_outputs_from_weights() {
    let mut s = test_sweeper();
    s.index(utxo('a', 500_000, true)).unwrap();

    let weights = vec![
        WeightedAddr {
            address: "tb1x".into(),
            weight_bp: 7_000,
        },
        WeightedAddr {
            address: "tb1y".into(),
            weight_bp: 3_000,
        },
    ];
    let plan = s.spend_weighted(&weights, 100_000, 10).unwrap();
    assert_eq!(plan.outputs[0].value_sats, 70_000);
    assert_eq!(plan.outputs[1].value_sats, 30_000);
    assert_conserved(&plan);
}

struct SharedKv(Arc<MemKv>);

impl KvStore for SharedKv {
    fn put(&self, key: &[u8], value: &[u8]) -> anyhow::Result<()> {
        self.0.put(key, value)
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.0.get(key)
    }
}

#[test]
fn indexed_utxos_and_weights_are_persisted() {
    let store = Arc::new(MemKv::new());
    let mut s = Sweeper::with_store(
        vec![2u8; 33],
        Network::BitcoinTestnet,
        Box::new(SharedKv(store.clone())),
    );
    s.set_test_mode(true);

    s.index(utxo('a', 80_000, true)).unwrap();
    let key = format!("utxo:{}:0", "a".repeat(64));
    let doc = store.get(key.as_bytes()).unwrap();
    let restored: Utxo = serde_json::from_slice(&doc).unwrap();
    assert_eq!(restored.value_sats, 80_000);

    s.set_spending_wallets(vec![
        WeightedAddr {
            address: "tb1walletA".into(),
            weight_bp: 7_000,
        },
        WeightedAddr {
            address: "tb1walletB".into(),
            weight_bp: 3_000,
        },
    ])
    .unwrap();
    assert!(store.get(b"alloc:weights").is_ok());

    // A fresh instance over the same store restores the list and spends.
    let mut s2 = Sweeper::with_store(
        vec![2u8; 33],
        Network::BitcoinTestnet,
        Box::new(SharedKv(store.clone())),
    );
    s2.set_test_mode(true);
    s2.load_spending_wallets().unwrap();
    s2.index(utxo('b', 300_000, true)).unwrap();

    let plan = s2.spend_to_wallets(100_000, 10).unwrap();
    assert_eq!(plan.outputs[0].value_sats, 70_000);
    assert_eq!(plan.outputs[1].value_sats, 30_000);
    assert_conserved(&plan);
}

#[test]
fn spending_wallets_validation_catches_bad_weights() {
    let mut s = test_sweeper();
    assert!(matches!(
        s.spend_to_wallets(100_000, 10),
        Err(PlanError::EmptyWeights)
    ));
    assert!(matches!(
        s.set_spending_wallets(Vec::new()),
        Err(PlanError::EmptyWeights)
    ));
    assert!(matches!(
        s.set_spending_wallets(vec![WeightedAddr {
            address: "tb1x".into(),
            weight_bp: 0,
        }]),
        Err(PlanError::BadWeight(0))
    ));
}

#[test]
fn child_plans_spend_the_parent_change() {
    let mut s = test_sweeper();
    s.index(utxo('a', 500_000, true)).unwrap();
    let parent = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 100_000,
        }])
        .unwrap();
    assert_eq!(parent.change_idxs, vec![1]);

    let child = s
        .plan_child_from_change(
            &parent,
            vec![SpendOutput {
                address: "tb1dest".into(),
                value_sats: 50_000,
            }],
        )
        .unwrap();

    let parent_txid = hex::encode(parent.raw_tx.txid());
    assert_eq!(child.inputs.len(), 1);
    assert_eq!(child.inputs[0].txid, parent_txid);
    assert!(!child.inputs[0].confirmed);
    assert_conserved(&child);
    assert_eq!(s.pending_chain_depth().get(&parent_txid), Some(&1));
}

#[test]
fn child_planning_requires_parent_change() {
    let mut s = test_sweeper();
    s.index(utxo('a', 151_000, true)).unwrap();
    let parent = s
        .spend(vec![SpendOutput {
            address: "tb1dest".into(),
            value_sats: 150_000,
        }])
        .unwrap();
    assert!(parent.change_idxs.is_empty());
    assert!(matches!(
        s.plan_child_from_change(&parent, Vec::new()),
        Err(PlanError::NoParentChange)
    ));
}

#[test]
fn strict_mode_derives_change_and_fills_witness_utxos() {
    let pubkey = vec![2u8; 33];
    let change_addr = derive_change_address(&pubkey, Network::BitcoinTestnet).unwrap();
    let dest = create_p2tr(&[9u8; 32], Network::BitcoinTestnet).unwrap();

    let mut s = Sweeper::new(pubkey.clone(), Network::BitcoinTestnet);
    s.index(Utxo {
        txid: "a".repeat(64),
        vout: 0,
        value_sats: 300_000,
        address: change_addr.clone(),
        confirmed: true,
    })
    .unwrap();

    let plan = s
        .spend(vec![SpendOutput {
            address: dest,
            value_sats: 150_000,
        }])
        .unwrap();

    assert_eq!(plan.change_idxs.len(), 1);
    assert_eq!(plan.outputs[plan.change_idxs[0]].address, change_addr);
    assert_conserved(&plan);

    let hash = hash160(&pubkey);
    let witness_utxo = plan.psbt.inputs[0].witness_utxo.as_ref().unwrap();
    assert_eq!(witness_utxo.value, 300_000);
    assert_eq!(witness_utxo.pk_script, p2wpkh_script(&hash));
}

#[test]
fn taproot_change_key_switches_the_change_address() {
    let pubkey = vec![2u8; 33];
    let funding = derive_change_address(&pubkey, Network::BitcoinTestnet).unwrap();

    let mut s = Sweeper::new(pubkey, Network::BitcoinTestnet);
    s.set_taproot_change_key(&[7u8; 32]).unwrap();
    s.index(Utxo {
        txid: "a".repeat(64),
        vout: 0,
        value_sats: 300_000,
        address: funding,
        confirmed: true,
    })
    .unwrap();

    let plan = s
        .spend(vec![SpendOutput {
            address: create_p2tr(&[9u8; 32], Network::BitcoinTestnet).unwrap(),
            value_sats: 150_000,
        }])
        .unwrap();
    let change = &plan.outputs[plan.change_idxs[0]];
    assert!(change.address.starts_with("tb1p"), "got {}", change.address);

    assert!(matches!(
        s.set_taproot_change_key(&[1u8; 31]),
        Err(PlanError::BadTaprootKey(31))
    ));
}

#[test]
fn strict_mode_rejects_foreign_networks_and_keys() {
    let pubkey = vec![2u8; 33];
    let mainnet_addr = derive_change_address(&pubkey, Network::BitcoinMainnet).unwrap();
    let other_key_addr = derive_change_address(&[3u8; 33], Network::BitcoinTestnet).unwrap();

    let mut s = Sweeper::new(pubkey, Network::BitcoinTestnet);
    let mk = |address: String| Utxo {
        txid: "a".repeat(64),
        vout: 0,
        value_sats: 80_000,
        address,
        confirmed: true,
    };

    assert!(matches!(
        s.index(mk(mainnet_addr)),
        Err(PlanError::Address(onchain::AddressError::NetworkMismatch))
    ));
    assert!(matches!(
        s.index(mk(other_key_addr.clone())),
        Err(PlanError::Address(onchain::AddressError::PubkeyMismatch))
    ));

    // With pubkey enforcement off, a foreign same-network key is fine.
    s.set_pubkey_check(false);
    s.index(mk(other_key_addr)).unwrap();
}

#[test]
fn clear_index_drops_utxos_and_depths() {
    let mut s = test_sweeper();
    s.index(utxo('a', 100_000, false)).unwrap();
    s.spend(vec![SpendOutput {
        address: "tb1dest".into(),
        value_sats: 50_000,
    }])
    .unwrap();
    assert!(!s.pending_chain_depth().is_empty());

    s.clear_index();
    assert!(s.indexed_utxos().is_empty());
    assert!(s.pending_chain_depth().is_empty());
}
