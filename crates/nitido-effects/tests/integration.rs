//! Integration tests for the enhancement effects.
//!
//! Covers the full stage lineup the microphone pipeline assembles: a
//! pre-gain trim, the procedural reverb, the level gate, and an output
//! trim, wired through an [`EffectChain`]. Also pins down the response
//! regeneration contract observable from outside the reverb: renders
//! land only at block boundaries, and the previous response keeps
//! serving until the swap.

use std::sync::Arc;

use nitido_accel::BrokerConfig;
use nitido_core::{ChainError, Effect, EffectChain, NodeId, ParamWriteError};
use nitido_effects::{LevelGate, Reverb, ReverbParams, Trim, generate_impulse_response};

const RATE: f32 = 8000.0;
const BLOCK: usize = 64;

fn short_reverb() -> ReverbParams {
    ReverbParams {
        decay_time: 0.3,
        ..ReverbParams::default()
    }
}

fn sine_block(amplitude: f32) -> Vec<f32> {
    (0..BLOCK)
        .map(|i| (i as f32 * 0.35).sin() * amplitude)
        .collect()
}

// ============================================================================
// 1. Response length contract
// ============================================================================

#[test]
fn response_length_is_rate_times_decay() {
    // Two seconds at 48 kHz renders exactly 96000 samples per channel.
    let params = ReverbParams {
        decay_time: 2.0,
        ..ReverbParams::default()
    };
    let response = generate_impulse_response(&params, 48000.0, 2);
    assert_eq!(response.len(), 96000);
    assert_eq!(response.channel_count(), 2);
    assert!(response.is_finite());

    // Exact-arithmetic spot checks at other rates.
    let params = ReverbParams {
        decay_time: 3.5,
        ..ReverbParams::default()
    };
    assert_eq!(generate_impulse_response(&params, 8000.0, 1).len(), 28000);

    let params = ReverbParams {
        decay_time: 0.25,
        ..ReverbParams::default()
    };
    assert_eq!(generate_impulse_response(&params, 44100.0, 2).len(), 11025);
}

// ============================================================================
// 2. Regeneration visibility
// ============================================================================

#[test]
fn updated_response_serves_until_the_swap_lands() {
    let params = ReverbParams {
        decay_time: 0.1,
        ..ReverbParams::default()
    };
    let mut reverb = Reverb::new(RATE, BLOCK, params, BrokerConfig::default()).unwrap();
    let before = Arc::clone(reverb.broker().prepared_ir().unwrap());
    assert_eq!(before.taps_len(), 800);

    reverb.update_parameter("decay_time", 0.2).unwrap();

    // Swaps only happen inside a poll, which only runs at block
    // boundaries. However far the worker has got, the serving response
    // is still the old one.
    let serving = reverb.broker().prepared_ir().unwrap();
    assert!(Arc::ptr_eq(&before, serving));
    assert_eq!(serving.taps_len(), 800);

    reverb.flush_regeneration();
    assert_eq!(reverb.broker().prepared_ir().unwrap().taps_len(), 1600);
}

// ============================================================================
// 3. Chain-level behavior
// ============================================================================

/// Assemble the four-stage enhancement lineup on one chain.
fn enhancement_chain() -> (EffectChain, [NodeId; 4]) {
    let mut chain = EffectChain::new(RATE, BLOCK);
    let pre = chain.push("pre", Box::new(Trim::new(RATE)));
    let reverb = chain.push(
        "reverb",
        Box::new(Reverb::new(RATE, BLOCK, short_reverb(), BrokerConfig::default()).unwrap()),
    );
    let gate = chain.push("gate", Box::new(LevelGate::new(RATE)));
    let out = chain.push("output", Box::new(Trim::new(RATE)));
    (chain, [pre, reverb, gate, out])
}

#[test]
fn chain_passes_speech_and_mutes_silence() {
    let (mut chain, _) = enhancement_chain();

    // A -9 dB tone opens the gate within a couple of blocks; once the
    // ramps settle the chain output carries the dry signal plus tail.
    let mut peak = 0.0f32;
    for _ in 0..40 {
        let mut left = sine_block(0.5);
        let mut right = sine_block(0.5);
        chain.process_block_stereo(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
        peak = left.iter().fold(peak, |p, s| p.max(s.abs()));
    }
    assert!(peak > 0.2, "chain swallowed the signal: peak {peak}");

    // Silence long enough to exhaust the 0.3 s tail and the gate
    // release leaves the output at hard zero scaled by the floor.
    let mut last = 1.0f32;
    for _ in 0..100 {
        let mut left = vec![0.0f32; BLOCK];
        let mut right = vec![0.0f32; BLOCK];
        chain.process_block_stereo(&mut left, &mut right);
        last = left.iter().fold(0.0f32, |p, s| p.max(s.abs()));
    }
    assert!(last < 1e-6, "tail did not die out: {last}");
}

#[test]
fn chain_rejects_mix_conflict_and_keeps_state() {
    let (mut chain, [_, reverb, _, _]) = enhancement_chain();

    // Lowering the wet mix through the chain is an ordinary retune.
    chain.update_named(reverb, "wet_mix", 0.2).unwrap();
    assert_eq!(chain.param_value(reverb, "wet_mix"), Some(0.2));

    // Pushing the pair over unity is refused and nothing moves.
    let err = chain.update_named(reverb, "wet_mix", 0.8).unwrap_err();
    assert!(matches!(
        err,
        ChainError::Rejected(ParamWriteError::Conflict { .. })
    ));
    assert_eq!(chain.param_value(reverb, "wet_mix"), Some(0.2));
    assert_eq!(chain.param_value(reverb, "dry_mix"), Some(0.7));

    // Freeing room on the dry side first makes the same write legal.
    chain.update_named(reverb, "dry_mix", 0.1).unwrap();
    chain.update_named(reverb, "wet_mix", 0.8).unwrap();
    assert_eq!(chain.param_value(reverb, "wet_mix"), Some(0.8));
}

#[test]
fn pre_gain_decides_gate_fate_for_weak_signals() {
    // -46 dB of microphone signal against a -40 dB gate: without a
    // lift the gate never opens.
    let mut plain = LevelGate::new(RATE);
    for _ in 0..20 {
        let mut left = vec![0.005f32; BLOCK];
        let mut right = vec![0.005f32; BLOCK];
        plain.process_block_stereo(&mut left, &mut right);
    }
    assert!(!plain.state().is_open);

    // A 4x pre-gain moves the same signal to -34 dB and the gate
    // passes it.
    let mut trim = Trim::with_gain(RATE, 4.0);
    let mut lifted = LevelGate::new(RATE);
    let mut last = 0.0f32;
    for _ in 0..20 {
        let mut left = vec![0.005f32; BLOCK];
        let mut right = vec![0.005f32; BLOCK];
        trim.process_block_stereo(&mut left, &mut right);
        lifted.process_block_stereo(&mut left, &mut right);
        last = left[BLOCK - 1];
    }
    assert!(lifted.state().is_open);
    assert!((last - 0.02).abs() < 1e-3, "lifted output: {last}");
}

#[test]
fn chain_bypass_hands_back_the_dry_signal() {
    let (mut chain, [_, reverb, gate, _]) = enhancement_chain();

    // With the reverb and gate bypassed the chain is two unity trims.
    chain.set_enabled(reverb, false).unwrap();
    chain.set_enabled(gate, false).unwrap();

    // Give the bypass crossfades a block to finish.
    let mut last = vec![0.0f32; BLOCK];
    for _ in 0..10 {
        let mut left = sine_block(0.25);
        let mut right = sine_block(0.25);
        chain.process_block_stereo(&mut left, &mut right);
        last.copy_from_slice(&left);
    }
    for (out, orig) in last.iter().zip(sine_block(0.25).iter()) {
        assert!((out - orig).abs() < 1e-6, "bypass altered: {out} vs {orig}");
    }
}
