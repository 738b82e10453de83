//! The enhancement pipeline facade.
//!
//! [`Enhancer`] owns the four-stage chain the signal runs through:
//!
//! ```text
//! input -> trim("pre") -> reverb -> gate -> trim("output") -> output
//! ```
//!
//! Construction validates the whole configuration before any stage is
//! built, so a misconfigured pipeline never half-exists. Accelerator
//! availability is injected through [`AccelCapability`]; nothing in
//! here probes hardware.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use nitido_accel::{BrokerConfig, PrecisionMode};
use nitido_config::{AccelConfig, ConfigError, EnhancerConfig, GateConfig, ReverbConfig};
use nitido_core::{ChainError, ChainSnapshot, EffectChain, EffectWithParams, NodeId};
use nitido_effects::{
    GateState, LevelGate, PresetError, Reverb, ReverbAnalysis, ReverbParams, ReverbParamsError,
    ShelfParams, Trim,
};

use crate::metrics::ProcessMetrics;
use crate::quality::SignalQuality;
use crate::state::PipelineState;

/// Kind string of the input trim stage.
pub const STAGE_PRE: &str = "pre";
/// Kind string of the reverb stage.
pub const STAGE_REVERB: &str = "reverb";
/// Kind string of the noise gate stage.
pub const STAGE_GATE: &str = "gate";
/// Kind string of the output trim stage.
pub const STAGE_OUTPUT: &str = "output";

/// Pre-gain applied by the weak-signal profile.
const WEAK_PRE_GAIN: f32 = 4.0;
/// Gate threshold applied by the weak-signal profile, in dB.
const WEAK_GATE_THRESHOLD_DB: f32 = -50.0;
/// Output trim applied by the weak-signal profile.
const WEAK_OUTPUT_GAIN: f32 = 2.0;
/// Pre-gain multiplier per automatic adjustment step.
const AUTO_BOOST_FACTOR: f32 = 1.5;
/// Pre-gain ceiling for automatic adjustment.
const MAX_PRE_GAIN: f32 = 8.0;

/// Externally supplied accelerator availability.
///
/// The host learns what the machine offers and passes it down; the
/// pipeline treats the flags as facts. The default claims nothing, so
/// a default-built enhancer runs entirely on the software path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelCapability {
    /// Whether an accelerated convolution engine is present.
    pub available: bool,
}

/// Rejection from a live enhancer operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnhancerError {
    /// A chain routing operation failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// A reverb preset application was rejected.
    #[error(transparent)]
    Preset(#[from] PresetError),
    /// The chain no longer holds the named stage.
    #[error("the {stage} stage is missing from the chain")]
    MissingStage {
        /// Stage kind that could not be found.
        stage: &'static str,
    },
    /// No stage goes by that name.
    #[error("no stage named '{name}', expected one of: pre, reverb, gate, output")]
    UnknownStage {
        /// The name that failed to resolve.
        name: String,
    },
    /// A snapshot restore could not rebuild the chain.
    #[error("restore could not rebuild the {stage} stage")]
    RestoreFailed {
        /// Stage kind that failed to rebuild.
        stage: &'static str,
    },
}

/// Chain node IDs of the four fixed stages.
#[derive(Debug, Clone, Copy)]
struct StageIds {
    pre: NodeId,
    reverb: NodeId,
    gate: NodeId,
    output: NodeId,
}

/// Microphone enhancement pipeline.
///
/// Wraps an [`EffectChain`] holding the fixed stage lineup and adds
/// lifecycle management, per-block cost metrics, and parameter routing
/// by stage name. Outside [`PipelineState::Running`] the enhancer is a
/// straight wire: input is copied to output untouched.
///
/// # Example
///
/// ```rust
/// use nitido_config::{EnhancerConfig, InputConfig, ReverbConfig};
/// use nitido_pipeline::{AccelCapability, Enhancer};
///
/// let config = EnhancerConfig {
///     input: InputConfig {
///         sample_rate: 16000,
///         buffer_size: 256,
///         ..InputConfig::default()
///     },
///     reverb: ReverbConfig {
///         decay_time: 0.5,
///         ..ReverbConfig::default()
///     },
///     ..EnhancerConfig::default()
/// };
///
/// let mut enhancer = Enhancer::new(config, AccelCapability::default())?;
/// enhancer.start();
///
/// let input = vec![0.25f32; 256];
/// let mut left = vec![0.0f32; 256];
/// let mut right = vec![0.0f32; 256];
/// enhancer.process_block(&input, &input, &mut left, &mut right);
/// assert_eq!(enhancer.metrics().blocks, 1);
///
/// enhancer.stop();
/// # Ok::<(), nitido_config::ConfigError>(())
/// ```
pub struct Enhancer {
    config: EnhancerConfig,
    /// Broker settings kept for rebuilding the reverb on restore.
    broker_config: BrokerConfig,
    chain: EffectChain,
    stages: StageIds,
    state: PipelineState,
    metrics: ProcessMetrics,
    sample_rate: f32,
    /// Real-time cost of one frame, for overrun detection.
    us_per_frame: f64,
}

impl std::fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enhancer")
            .field("config", &self.config)
            .field("broker_config", &self.broker_config)
            .field("chain_len", &self.chain.len())
            .field("stages", &self.stages)
            .field("state", &self.state)
            .field("metrics", &self.metrics)
            .field("sample_rate", &self.sample_rate)
            .field("us_per_frame", &self.us_per_frame)
            .finish_non_exhaustive()
    }
}

impl Enhancer {
    /// Build a pipeline from a validated configuration.
    ///
    /// The configuration is checked as a whole first; any rejection
    /// aborts before a single stage exists. Construction renders the
    /// initial reverb response synchronously, so a returned enhancer is
    /// ready to process its first block.
    pub fn new(config: EnhancerConfig, capability: AccelCapability) -> Result<Self, ConfigError> {
        config.validate()?;

        let sample_rate = config.input.sample_rate as f32;
        let block_size = config.input.buffer_size;
        let broker = broker_config(&config.accel, capability)?;

        let reverb = Reverb::new(
            sample_rate,
            block_size,
            reverb_params(&config.reverb),
            broker.clone(),
        )
        .map_err(map_reverb_error)?;
        let gate = build_gate(&config.gate, sample_rate);

        let mut chain = EffectChain::new(sample_rate, block_size);
        let stages = StageIds {
            pre: chain.push(STAGE_PRE, Box::new(Trim::new(sample_rate))),
            reverb: chain.push(STAGE_REVERB, Box::new(reverb)),
            gate: chain.push(STAGE_GATE, Box::new(gate)),
            output: chain.push(STAGE_OUTPUT, Box::new(Trim::new(sample_rate))),
        };

        info!(
            sample_rate = config.input.sample_rate,
            buffer_size = block_size,
            accelerated = capability.available,
            "enhancer built"
        );

        Ok(Enhancer {
            config,
            broker_config: broker,
            chain,
            stages,
            state: PipelineState::Idle,
            metrics: ProcessMetrics::default(),
            sample_rate,
            us_per_frame: 1e6 / f64::from(sample_rate),
        })
    }

    // --- Lifecycle ---

    /// Begin enhancing blocks.
    ///
    /// Only valid from [`PipelineState::Idle`]; anything else logs and
    /// returns. Initialization waits out any reverb regeneration still
    /// pending, so the run starts on current geometry.
    pub fn start(&mut self) {
        if self.state != PipelineState::Idle {
            warn!(state = %self.state, "start ignored");
            return;
        }
        self.set_state(PipelineState::Initializing);
        if let Some(reverb) = self.reverb_mut() {
            reverb.flush_regeneration();
        }
        self.set_state(PipelineState::Running);
    }

    /// Stop enhancing and return to idle.
    ///
    /// Effect state is cleared on the way down so reverb tails and the
    /// gate position do not leak into the next run. Metrics survive
    /// for post-run inspection.
    pub fn stop(&mut self) {
        if self.state != PipelineState::Running {
            warn!(state = %self.state, "stop ignored");
            return;
        }
        self.set_state(PipelineState::Stopping);
        self.chain.reset();
        self.set_state(PipelineState::Idle);
    }

    /// Clear all effect state and metrics.
    ///
    /// Also recovers from [`PipelineState::Error`]: a reset pipeline is
    /// idle and can be started again.
    pub fn reset(&mut self) {
        self.chain.reset();
        self.metrics.clear();
        if self.state == PipelineState::Error {
            self.set_state(PipelineState::Idle);
        }
        debug!("enhancer reset");
    }

    fn set_state(&mut self, next: PipelineState) {
        info!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }

    // --- Processing ---

    /// Run one block through the pipeline.
    ///
    /// Input is copied to the output buffers first; when the pipeline
    /// is not running that copy is the whole call. At most the
    /// configured buffer size is enhanced per call. A mono stream is
    /// passed as the same slice for both input channels.
    pub fn process_block(
        &mut self,
        left_in: &[f32],
        right_in: &[f32],
        left_out: &mut [f32],
        right_out: &mut [f32],
    ) {
        debug_assert_eq!(left_in.len(), right_in.len());
        debug_assert!(left_out.len() >= left_in.len());
        debug_assert!(right_out.len() >= right_in.len());

        let len = left_in
            .len()
            .min(right_in.len())
            .min(left_out.len())
            .min(right_out.len());
        left_out[..len].copy_from_slice(&left_in[..len]);
        right_out[..len].copy_from_slice(&right_in[..len]);

        if self.state != PipelineState::Running {
            return;
        }

        let started = Instant::now();
        self.chain
            .process_block_stereo(&mut left_out[..len], &mut right_out[..len]);
        let cost_us = started.elapsed().as_secs_f64() * 1e6;
        let budget_us = len as f64 * self.us_per_frame;
        if self.metrics.record(cost_us, budget_us) {
            warn!(cost_us, budget_us, "block overran its real-time budget");
        }
    }

    // --- Parameter routing ---

    /// Update one reverb parameter by name through the validated path.
    ///
    /// Geometry changes regenerate the response in the background;
    /// audio keeps the previous response until the new one lands.
    pub fn update_reverb_parameter(&mut self, name: &str, value: f32) -> Result<(), EnhancerError> {
        self.chain.update_named(self.stages.reverb, name, value)?;
        Ok(())
    }

    /// Apply a named reverb preset.
    pub fn apply_reverb_preset(&mut self, name: &str) -> Result<(), EnhancerError> {
        let reverb = self.reverb_mut().ok_or(EnhancerError::MissingStage {
            stage: STAGE_REVERB,
        })?;
        reverb.apply_preset(name)?;
        Ok(())
    }

    /// Set the gate open/close threshold in dB.
    pub fn set_gate_threshold(&mut self, threshold_db: f32) -> Result<(), EnhancerError> {
        self.chain
            .update_named(self.stages.gate, "Threshold", threshold_db)?;
        Ok(())
    }

    /// Enable or bypass a stage by name.
    ///
    /// Stage names are the kind strings: `pre`, `reverb`, `gate`,
    /// `output`. Toggling crossfades over about 10 ms; the stage keeps
    /// processing underneath so re-enabling is seamless.
    pub fn set_node_enabled(&mut self, stage: &str, enabled: bool) -> Result<(), EnhancerError> {
        let id = self.stage_id(stage)?;
        self.chain.set_enabled(id, enabled)?;
        Ok(())
    }

    // --- Snapshots ---

    /// Capture the chain's parameter and enabled state.
    pub fn snapshot(&self) -> ChainSnapshot {
        self.chain.snapshot()
    }

    /// Rebuild the chain from a snapshot.
    ///
    /// Stages are built fresh from the configuration and the snapshot's
    /// parameters are replayed through the validated path. On failure
    /// the pipeline parks in [`PipelineState::Error`] and passes audio
    /// through until a successful restore or a [`reset`](Self::reset).
    pub fn restore(&mut self, snapshot: &ChainSnapshot) -> Result<(), EnhancerError> {
        let reverb = match Reverb::new(
            self.sample_rate,
            self.config.input.buffer_size,
            ReverbParams::default(),
            self.broker_config.clone(),
        ) {
            Ok(reverb) => reverb,
            Err(err) => {
                error!(%err, "could not rebuild the reverb stage");
                self.set_state(PipelineState::Error);
                return Err(EnhancerError::RestoreFailed {
                    stage: STAGE_REVERB,
                });
            }
        };

        let mut reverb = Some(Box::new(reverb) as Box<dyn EffectWithParams + Send>);
        let mut gate = Some(
            Box::new(build_gate(&self.config.gate, self.sample_rate))
                as Box<dyn EffectWithParams + Send>,
        );
        let sample_rate = self.sample_rate;
        self.chain.restore_with(snapshot, |kind| match kind {
            STAGE_REVERB => reverb.take().map(|effect| (STAGE_REVERB, effect)),
            STAGE_GATE => gate.take().map(|effect| (STAGE_GATE, effect)),
            STAGE_PRE => Some((
                STAGE_PRE,
                Box::new(Trim::new(sample_rate)) as Box<dyn EffectWithParams + Send>,
            )),
            STAGE_OUTPUT => Some((
                STAGE_OUTPUT,
                Box::new(Trim::new(sample_rate)) as Box<dyn EffectWithParams + Send>,
            )),
            _ => None,
        });

        if let Err(err) = self.relocate_stages() {
            error!(%err, "snapshot restore produced an incomplete chain");
            self.set_state(PipelineState::Error);
            return Err(err);
        }

        // Coupled mix levels can reject on the first replay while the
        // partner still holds a fresh stage's default; a second pass
        // lands them once both have moved. Values already in place are
        // skipped.
        for entry in &snapshot.nodes {
            let Ok(id) = self.stage_id(&entry.kind) else {
                continue;
            };
            for (name, value) in &entry.params {
                if self.chain.param_value(id, name) == Some(*value) {
                    continue;
                }
                if let Err(err) = self.chain.update_named(id, name, *value) {
                    warn!(stage = %entry.kind, param = %name, value, %err, "snapshot value still rejected");
                }
            }
        }

        if self.state == PipelineState::Error {
            self.set_state(PipelineState::Idle);
        }
        info!(nodes = snapshot.nodes.len(), "chain restored from snapshot");
        Ok(())
    }

    /// Re-resolve the four stage IDs after a structural rebuild.
    fn relocate_stages(&mut self) -> Result<(), EnhancerError> {
        self.stages = StageIds {
            pre: self.locate(STAGE_PRE)?,
            reverb: self.locate(STAGE_REVERB)?,
            gate: self.locate(STAGE_GATE)?,
            output: self.locate(STAGE_OUTPUT)?,
        };
        Ok(())
    }

    fn locate(&self, stage: &'static str) -> Result<NodeId, EnhancerError> {
        self.chain
            .ids()
            .into_iter()
            .find(|&id| self.chain.node_kind(id) == Some(stage))
            .ok_or(EnhancerError::RestoreFailed { stage })
    }

    // --- Signal quality ---

    /// Reconfigure for a weak capture source.
    ///
    /// Applies the recovery profile: pre-gain 4.0 so quiet speech
    /// clears the gate, threshold lowered to -50 dB, output trim 2.0
    /// to bring the result up to a working level.
    pub fn configure_for_weak_signal(&mut self) -> Result<(), EnhancerError> {
        self.chain
            .update_named(self.stages.pre, "Gain", WEAK_PRE_GAIN)?;
        self.chain
            .update_named(self.stages.gate, "Threshold", WEAK_GATE_THRESHOLD_DB)?;
        self.chain
            .update_named(self.stages.output, "Gain", WEAK_OUTPUT_GAIN)?;
        info!(
            pre_gain = WEAK_PRE_GAIN,
            gate_db = WEAK_GATE_THRESHOLD_DB,
            output_gain = WEAK_OUTPUT_GAIN,
            "weak signal profile applied"
        );
        Ok(())
    }

    /// Nudge the pre-gain up when a measured block came in weak.
    ///
    /// Each call multiplies the pre-gain by 1.5, capped at 8.0.
    /// Returns true when a boost was applied, false when the signal is
    /// healthy or the gain is already at the ceiling.
    pub fn auto_adjust(&mut self, quality: &SignalQuality) -> Result<bool, EnhancerError> {
        if !quality.is_weak() {
            return Ok(false);
        }
        let current = self
            .chain
            .param_value(self.stages.pre, "Gain")
            .ok_or(EnhancerError::MissingStage { stage: STAGE_PRE })?;
        let boosted = (current * AUTO_BOOST_FACTOR).min(MAX_PRE_GAIN);
        if boosted <= current {
            return Ok(false);
        }
        self.chain
            .update_named(self.stages.pre, "Gain", boosted)?;
        info!(
            rms_db = quality.rms_db,
            pre_gain = boosted,
            "weak signal: pre gain raised"
        );
        Ok(true)
    }

    // --- Observers ---

    /// Derived reverb room characteristics.
    ///
    /// `None` only when the chain lost its reverb stage to a failed
    /// restore.
    pub fn analysis(&self) -> Option<ReverbAnalysis> {
        self.reverb_ref().map(Reverb::analysis)
    }

    /// Observer snapshot of the gate.
    pub fn gate_state(&self) -> Option<GateState> {
        self.gate_ref().map(LevelGate::state)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Cost statistics for the blocks processed so far.
    pub fn metrics(&self) -> ProcessMetrics {
        self.metrics
    }

    /// The configuration the pipeline was built from.
    pub fn config(&self) -> &EnhancerConfig {
        &self.config
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Processing block size in frames.
    pub fn block_size(&self) -> usize {
        self.config.input.buffer_size
    }

    /// Total latency of the enabled stages in samples.
    pub fn latency_samples(&self) -> usize {
        self.chain.latency_samples()
    }

    // --- Internal ---

    fn stage_id(&self, stage: &str) -> Result<NodeId, EnhancerError> {
        match stage {
            STAGE_PRE => Ok(self.stages.pre),
            STAGE_REVERB => Ok(self.stages.reverb),
            STAGE_GATE => Ok(self.stages.gate),
            STAGE_OUTPUT => Ok(self.stages.output),
            other => Err(EnhancerError::UnknownStage {
                name: other.to_string(),
            }),
        }
    }

    fn reverb_ref(&self) -> Option<&Reverb> {
        self.chain
            .node_effect(self.stages.reverb)
            .and_then(|effect| effect.as_any().downcast_ref())
    }

    fn reverb_mut(&mut self) -> Option<&mut Reverb> {
        self.chain
            .node_effect_mut(self.stages.reverb)
            .and_then(|effect| effect.as_any_mut().downcast_mut())
    }

    fn gate_ref(&self) -> Option<&LevelGate> {
        self.chain
            .node_effect(self.stages.gate)
            .and_then(|effect| effect.as_any().downcast_ref())
    }
}

/// Map the acceleration section onto broker settings.
///
/// The `accelerated` flag comes from the injected capability, never
/// from the configuration: a config cannot claim hardware the host did
/// not report.
fn broker_config(
    accel: &AccelConfig,
    capability: AccelCapability,
) -> Result<BrokerConfig, ConfigError> {
    let precision = accel
        .precision
        .parse::<PrecisionMode>()
        .map_err(|err| ConfigError::InvalidPrecision(err.0))?;
    Ok(BrokerConfig {
        accelerated: capability.available,
        max_block_time: Duration::from_secs_f64(f64::from(accel.max_latency_ms) / 1000.0),
        thread_budget: accel.thread_count,
        precision,
        max_consecutive_failures: accel.max_consecutive_failures,
        alignment: accel.memory_alignment,
    })
}

fn reverb_params(reverb: &ReverbConfig) -> ReverbParams {
    ReverbParams {
        room_size: reverb.room_size,
        decay_time: reverb.decay_time,
        damping: reverb.damping,
        wet_mix: reverb.wet_mix,
        dry_mix: reverb.dry_mix,
        pre_delay: reverb.pre_delay,
        low_shelf: ShelfParams {
            frequency_hz: reverb.low_shelf.frequency,
            gain_db: reverb.low_shelf.gain_db,
        },
        high_shelf: ShelfParams {
            frequency_hz: reverb.high_shelf.frequency,
            gain_db: reverb.high_shelf.gain_db,
        },
    }
}

fn build_gate(gate: &GateConfig, sample_rate: f32) -> LevelGate {
    let mut stage = LevelGate::new(sample_rate);
    stage.set_threshold_db(gate.threshold_db);
    stage.set_attack_ms(gate.attack_ms);
    stage.set_release_ms(gate.release_ms);
    stage.set_floor(gate.floor);
    stage
}

/// Lift a runtime reverb rejection into configuration vocabulary.
fn map_reverb_error(err: ReverbParamsError) -> ConfigError {
    match err {
        ReverbParamsError::OutOfRange {
            field,
            value,
            min,
            max,
        } => ConfigError::OutOfRange {
            param: reverb_field(field),
            value: f64::from(value),
            min: f64::from(min),
            max: f64::from(max),
        },
        ReverbParamsError::MixOverUnity { wet, dry } => ConfigError::MixSum { wet, dry },
    }
}

/// Prefix a runtime reverb field with its configuration section.
fn reverb_field(field: &'static str) -> &'static str {
    match field {
        "room_size" => "reverb.room_size",
        "decay_time" => "reverb.decay_time",
        "damping" => "reverb.damping",
        "wet_mix" => "reverb.wet_mix",
        "dry_mix" => "reverb.dry_mix",
        "pre_delay" => "reverb.pre_delay",
        "low_shelf_freq" => "reverb.low_shelf_freq",
        "low_shelf_gain" => "reverb.low_shelf_gain",
        "high_shelf_freq" => "reverb.high_shelf_freq",
        "high_shelf_gain" => "reverb.high_shelf_gain",
        other => other,
    }
}
