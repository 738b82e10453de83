//! Property-based tests for the convolution broker.

use std::sync::Arc;

use nitido_accel::{AccelerationBroker, BrokerConfig, PreparedIr};
use proptest::prelude::*;

fn accel_config() -> BrokerConfig {
    BrokerConfig {
        accelerated: true,
        max_block_time: std::time::Duration::from_secs(3600),
        ..BrokerConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The accelerated and software paths agree on arbitrary finite
    /// responses and inputs, block after block.
    #[test]
    fn accelerated_and_software_agree(
        taps in prop::collection::vec(-1.0f32..1.0, 1..300),
        samples in prop::collection::vec(-1.0f32..1.0, 128..256),
    ) {
        let block = 32;
        let ir = Arc::new(PreparedIr::prepare(&[taps.clone(), taps], block));

        let mut accel = AccelerationBroker::new(block, accel_config());
        let mut soft = AccelerationBroker::new(block, BrokerConfig::default());
        accel.install_ir(ir.clone());
        soft.install_ir(ir);

        let mut a_out = vec![0.0f32; block];
        let mut s_out = vec![0.0f32; block];
        let mut a_r = vec![0.0f32; block];
        let mut s_r = vec![0.0f32; block];

        for chunk in samples.chunks_exact(block) {
            accel.convolve(chunk, chunk, &mut a_out, &mut a_r).unwrap();
            soft.convolve_software(chunk, chunk, &mut s_out, &mut s_r);
            for (a, s) in a_out.iter().zip(s_out.iter()) {
                // Output magnitude is bounded by the tap count (300),
                // so the tolerance is absolute at that scale.
                prop_assert!((a - s).abs() < 2e-2, "accel {a} vs software {s}");
            }
        }
    }

    /// The broker never emits non-finite samples from finite input.
    #[test]
    fn output_stays_finite(
        taps in prop::collection::vec(-2.0f32..2.0, 1..200),
        samples in prop::collection::vec(-2.0f32..2.0, 64..192),
    ) {
        let block = 32;
        let mut broker = AccelerationBroker::new(block, accel_config());
        broker.install_ir(Arc::new(PreparedIr::prepare(&[taps.clone(), taps], block)));

        let mut out_l = vec![0.0f32; block];
        let mut out_r = vec![0.0f32; block];
        for chunk in samples.chunks_exact(block) {
            broker.convolve(chunk, chunk, &mut out_l, &mut out_r).unwrap();
            prop_assert!(out_l.iter().all(|s| s.is_finite()));
            prop_assert!(out_r.iter().all(|s| s.is_finite()));
        }
    }

    /// Identical lane input produces identical lane output when both
    /// channels share one response.
    #[test]
    fn equal_channels_stay_equal(
        taps in prop::collection::vec(-1.0f32..1.0, 1..100),
        samples in prop::collection::vec(-1.0f32..1.0, 64..128),
    ) {
        let block = 32;
        let mut broker = AccelerationBroker::new(block, accel_config());
        broker.install_ir(Arc::new(PreparedIr::prepare(&[taps.clone(), taps], block)));

        let mut out_l = vec![0.0f32; block];
        let mut out_r = vec![0.0f32; block];
        for chunk in samples.chunks_exact(block) {
            broker.convolve(chunk, chunk, &mut out_l, &mut out_r).unwrap();
            for (l, r) in out_l.iter().zip(out_r.iter()) {
                prop_assert!((l - r).abs() < 1e-6);
            }
        }
    }
}
