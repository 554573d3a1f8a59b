//! Ranking policy network and the decoding loop built on it

use std::path::Path;

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::activation::softmax;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use crate::argumentation::Ranking;
use crate::utils::argmax_random_tie;

use super::PolicyError;
use super::action_space::{DecodeMode, DecodeStrategy};
use super::encoder::{ActionMask, DecodeStep, PrecedenceMatrix, remaining_arguments};

/// Logit given to illegal actions; its softmax weight underflows to exactly zero
const MASKED_LOGIT: f32 = -1.0e9;

/// Configuration for the ranking network
#[derive(Debug, Config)]
pub struct PolicyConfig {
    /// Hidden width as a multiple of the n*n input size
    pub hidden_scale: usize,
    /// Number of hidden layers
    pub hidden_layers: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hidden_scale: 1,
            hidden_layers: 1,
        }
    }
}

/// Maps a flattened precedence matrix to one logit per decoding action
#[derive(Module, Debug)]
pub struct RankingNet<B: Backend> {
    /// Input layer
    input: Linear<B>,
    /// Hidden layers
    hidden: Vec<Linear<B>>,
    /// Output layer (logits for each action)
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> RankingNet<B> {
    pub fn new(device: &B::Device, n: usize, output_width: usize, config: &PolicyConfig) -> Self {
        let input_size = n * n;
        let hidden_size = (config.hidden_scale * input_size).max(1);
        let input = LinearConfig::new(input_size, hidden_size).init(device);

        let mut hidden = Vec::new();
        for _ in 1..config.hidden_layers.max(1) {
            hidden.push(LinearConfig::new(hidden_size, hidden_size).init(device));
        }

        let output = LinearConfig::new(hidden_size, output_width).init(device);

        Self {
            input,
            hidden,
            output,
            activation: Relu::new(),
        }
    }

    /// Forward pass returning raw logits
    pub fn forward(&self, states: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = self.activation.forward(self.input.forward(states));

        for layer in &self.hidden {
            x = self.activation.forward(layer.forward(x));
        }

        self.output.forward(x)
    }

    /// Action probabilities with masking.
    /// masks: [batch_size, width] where 1.0 = legal, 0.0 = illegal
    pub fn probabilities(&self, states: Tensor<B, 2>, masks: Tensor<B, 2>) -> Tensor<B, 2> {
        let logits = self.forward(states);
        let illegal = masks.lower_elem(0.5);
        softmax(logits.mask_fill(illegal, MASKED_LOGIT), 1)
    }
}

/// Greedy (evaluation) or sampled (training) action selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    Greedy,
    Sample,
}

/// A complete ranking and the probability of every action taken to build it
#[derive(Debug, Clone)]
pub struct DecodedRanking {
    pub ranking: Ranking,
    pub probabilities: Vec<f32>,
    pub actions: Vec<usize>,
}

/// Parametric ranking policy with a decoding strategy fixed at construction
#[derive(Debug)]
pub struct RankingPolicy<B: Backend> {
    net: RankingNet<B>,
    strategy: Box<dyn DecodeStrategy>,
    num_arguments: usize,
    device: B::Device,
}

impl<B: Backend> RankingPolicy<B> {
    pub fn new(device: B::Device, num_arguments: usize, mode: DecodeMode, config: &PolicyConfig) -> Self {
        let strategy = mode.strategy();
        let net = RankingNet::new(
            &device,
            num_arguments,
            strategy.output_width(num_arguments),
            config,
        );

        Self {
            net,
            strategy,
            num_arguments,
            device,
        }
    }

    pub fn mode(&self) -> DecodeMode {
        self.strategy.mode()
    }

    pub fn strategy(&self) -> &dyn DecodeStrategy {
        self.strategy.as_ref()
    }

    pub fn num_arguments(&self) -> usize {
        self.num_arguments
    }

    pub fn output_width(&self) -> usize {
        self.strategy.output_width(self.num_arguments)
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn net(&self) -> &RankingNet<B> {
        &self.net
    }

    pub(crate) fn set_net(&mut self, net: RankingNet<B>) {
        self.net = net;
    }

    /// Distribution over the action space for one state; illegal actions get zero mass
    pub fn action_probabilities(
        &self,
        state: &PrecedenceMatrix,
        mask: &ActionMask,
    ) -> Result<Vec<f32>, PolicyError> {
        let n = self.num_arguments;
        let width = self.output_width();
        let states = Tensor::<B, 1>::from_floats(state.features().as_slice(), &self.device)
            .reshape([1, n * n]);
        let masks =
            Tensor::<B, 1>::from_floats(mask.as_floats().as_slice(), &self.device).reshape([1, width]);

        let probs = self.net.probabilities(states, masks);
        probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| PolicyError::Tensor(format!("{:?}", err)))
    }

    /// Probabilities of the recorded action at every step, batched in one forward pass
    pub fn step_probabilities(&self, steps: &[DecodeStep]) -> Tensor<B, 1> {
        let n = self.num_arguments;
        let batch_size = steps.len();
        let features: Vec<f32> = steps.iter().flat_map(|s| s.state.features()).collect();
        let masks: Vec<f32> = steps.iter().flat_map(|s| s.mask.as_floats()).collect();
        let actions: Vec<i64> = steps.iter().map(|s| s.action as i64).collect();

        let states = Tensor::<B, 1>::from_floats(features.as_slice(), &self.device)
            .reshape([batch_size, n * n]);
        let masks = Tensor::<B, 1>::from_floats(masks.as_slice(), &self.device)
            .reshape([batch_size, self.output_width()]);
        let actions = Tensor::<B, 1, Int>::from_ints(actions.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        self.net
            .probabilities(states, masks)
            .gather(1, actions)
            .squeeze::<1>(1)
    }

    /// Build a complete ranking in exactly `n` steps
    pub fn decode_ranking<R: Rng + ?Sized>(
        &self,
        decoding: Decoding,
        rng: &mut R,
    ) -> Result<DecodedRanking, PolicyError> {
        let n = self.num_arguments;
        let mut ranking = Ranking::new();
        let mut probabilities = Vec::with_capacity(n);
        let mut actions = Vec::with_capacity(n);

        for _ in 0..n {
            let state = PrecedenceMatrix::encode(&ranking, n);
            let mask = self
                .strategy
                .mask(&remaining_arguments(&ranking, n), &ranking);
            let probs = self.action_probabilities(&state, &mask)?;

            let action = match decoding {
                Decoding::Greedy => argmax_random_tie(&probs, |a| mask.is_legal(a), rng)
                    .ok_or(PolicyError::NoLegalAction)?,
                Decoding::Sample => {
                    let weights = probs
                        .iter()
                        .enumerate()
                        .map(|(a, &p)| if mask.is_legal(a) { p } else { 0.0 });
                    WeightedIndex::new(weights)
                        .map_err(|err| PolicyError::Sampling(err.to_string()))?
                        .sample(rng)
                }
            };

            self.strategy.decode_step(action, &mut ranking, n)?;
            probabilities.push(probs[action]);
            actions.push(action);
        }

        Ok(DecodedRanking {
            ranking,
            probabilities,
            actions,
        })
    }

    pub fn decode_strict<R: Rng + ?Sized>(
        &self,
        decoding: Decoding,
        rng: &mut R,
    ) -> Result<DecodedRanking, PolicyError> {
        self.require_mode(DecodeMode::Strict)?;
        self.decode_ranking(decoding, rng)
    }

    pub fn decode_grouped<R: Rng + ?Sized>(
        &self,
        decoding: Decoding,
        rng: &mut R,
    ) -> Result<DecodedRanking, PolicyError> {
        self.require_mode(DecodeMode::Grouped)?;
        self.decode_ranking(decoding, rng)
    }

    fn require_mode(&self, requested: DecodeMode) -> Result<(), PolicyError> {
        if self.mode() != requested {
            return Err(PolicyError::InvalidMode {
                configured: self.mode(),
                requested,
            });
        }
        Ok(())
    }

    /// Save network parameters
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PolicyError> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.net
            .clone()
            .save_file(path.as_ref().to_path_buf(), &recorder)
            .map_err(|err| PolicyError::Checkpoint(format!("{:?}", err)))?;
        tracing::info!("Saved policy to {}", path.as_ref().display());
        Ok(())
    }

    /// Load network parameters saved by [`RankingPolicy::save`]
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), PolicyError> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.net = self
            .net
            .clone()
            .load_file(path.as_ref().to_path_buf(), &recorder, &self.device)
            .map_err(|err| PolicyError::Checkpoint(format!("{:?}", err)))?;
        tracing::info!("Loaded policy from {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type TestBackend = NdArray;

    fn policy(n: usize, mode: DecodeMode) -> RankingPolicy<TestBackend> {
        RankingPolicy::new(Default::default(), n, mode, &PolicyConfig::default())
    }

    #[test]
    fn test_policy_config_default() {
        let config = PolicyConfig::default();
        assert_eq!(config.hidden_scale, 1);
        assert_eq!(config.hidden_layers, 1);
    }

    #[test]
    fn test_masked_probabilities_sum_to_one() {
        let policy = policy(4, DecodeMode::Strict);
        let ranking = Ranking::strict(&[2]);
        let mask = policy
            .strategy()
            .mask(&remaining_arguments(&ranking, 4), &ranking);
        let probs = policy
            .action_probabilities(&PrecedenceMatrix::encode(&ranking, 4), &mask)
            .unwrap();
        assert_eq!(probs[2], 0.0);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs.iter().enumerate().all(|(a, &p)| a == 2 || p > 0.0));
    }

    #[test]
    fn test_decode_places_every_argument_once() {
        let mut rng = StdRng::seed_from_u64(11);
        for mode in [DecodeMode::Strict, DecodeMode::Grouped] {
            let policy = policy(5, mode);
            for decoding in [Decoding::Sample, Decoding::Greedy] {
                let decoded = policy.decode_ranking(decoding, &mut rng).unwrap();
                assert!(decoded.ranking.validate(5).is_ok());
                assert_eq!(decoded.probabilities.len(), 5);
                assert_eq!(decoded.actions.len(), 5);
                assert!(decoded.probabilities.iter().all(|&p| p > 0.0 && p <= 1.0));
            }
        }
    }

    #[test]
    fn test_strict_decoding_is_total_order() {
        let mut rng = StdRng::seed_from_u64(5);
        let decoded = policy(6, DecodeMode::Strict)
            .decode_ranking(Decoding::Sample, &mut rng)
            .unwrap();
        assert!(decoded.ranking.is_strict());
        assert_eq!(decoded.ranking.num_levels(), 6);
    }

    #[test]
    fn test_greedy_decoding_is_deterministic() {
        let policy = policy(5, DecodeMode::Grouped);
        let first = policy
            .decode_ranking(Decoding::Greedy, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let second = policy
            .decode_ranking(Decoding::Greedy, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(first.ranking, second.ranking);
        assert_eq!(first.actions, second.actions);
    }

    #[test]
    fn test_mode_mismatch_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let policy = policy(3, DecodeMode::Strict);
        assert_eq!(
            policy.decode_grouped(Decoding::Greedy, &mut rng).unwrap_err(),
            PolicyError::InvalidMode {
                configured: DecodeMode::Strict,
                requested: DecodeMode::Grouped,
            }
        );
        assert!(policy.decode_strict(Decoding::Greedy, &mut rng).is_ok());
    }

    #[test]
    fn test_step_probabilities_match_decoding() {
        let mut rng = StdRng::seed_from_u64(9);
        let policy = policy(4, DecodeMode::Grouped);
        let decoded = policy.decode_ranking(Decoding::Sample, &mut rng).unwrap();
        let steps = super::super::encoder::replay(&decoded.ranking, policy.strategy(), 4);
        let actions: Vec<usize> = steps.iter().map(|s| s.action).collect();
        assert_eq!(actions, decoded.actions);

        let probs: Vec<f32> = policy
            .step_probabilities(&steps)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        for (replayed, recorded) in probs.iter().zip(&decoded.probabilities) {
            assert!((replayed - recorded).abs() < 1e-5);
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("argrank_policy_{}", std::process::id()));
        let policy = policy(3, DecodeMode::Strict);
        policy.save(&path).unwrap();

        let mut restored = self::policy(3, DecodeMode::Strict);
        restored.load(&path).unwrap();

        let ranking = Ranking::new();
        let mask = policy
            .strategy()
            .mask(&remaining_arguments(&ranking, 3), &ranking);
        let state = PrecedenceMatrix::encode(&ranking, 3);
        let expected = policy.action_probabilities(&state, &mask).unwrap();
        let actual = restored.action_probabilities(&state, &mask).unwrap();
        for (a, b) in expected.iter().zip(&actual) {
            assert!((a - b).abs() < 1e-6);
        }
        std::fs::remove_file(path.with_extension("mpk")).ok();
    }
}
