//! Task-side collaborators: the environment interface and ranking evaluation
//!
//! ```text
//! Ranking ──► ValueBasedFramework (once per episode)
//!                 │
//!   observation ──┼──► premises ──► valid arguments ──► VSAF ──► grounded extension
//!                 │                                                  │
//!                 ◄──────────── step(action) ◄──── promoted action ◄─┘
//! ```

pub mod frozen_lake;
pub mod takeaway;

use std::fmt;
use std::io;

use rand::Rng;
use thiserror::Error;

use crate::argumentation::{
    ArgumentTable, ArgumentationController, FrameworkError, Ranking, RankingError,
};

#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Framework(#[from] FrameworkError),
    #[error(transparent)]
    Ranking(#[from] RankingError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("no result after {attempts} attempts")]
    Timeout { attempts: usize },
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("invalid map: {0}")]
    InvalidMap(String),
}

/// Outcome of one action in the task
#[derive(Debug, Clone)]
pub struct Step<O> {
    pub observation: O,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

impl<O> Step<O> {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A task the argumentation layer can play.
///
/// Implementors extract premises and applicable arguments from observations,
/// keep whatever memory their premises need, and execute actions.
pub trait Environment {
    type Observation;
    type Premises;
    type Action: Copy + Ord + fmt::Debug;

    fn argument_table(&self) -> &ArgumentTable<Self::Action>;

    fn premises(&self, observation: &Self::Observation) -> Self::Premises;

    /// Arguments applicable under the premises
    fn valid_arguments(&self, premises: &Self::Premises) -> Vec<String>;

    fn update_memory(&mut self, observation: &Self::Observation, action: Self::Action);

    fn reset_memory(&mut self);

    fn reset(&mut self) -> Result<Self::Observation, EnvError>;

    fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>, EnvError>;
}

/// Anything that can score a complete ranking
pub trait RankingEvaluator {
    /// Names of the ranked arguments, in universe order
    fn argument_names(&self) -> Vec<String>;

    /// Play one episode with `ranking` and return the total reward
    fn evaluate(&mut self, ranking: &Ranking) -> Result<f32, EnvError>;

    /// Steps decided by a random fallback because the extension was empty
    fn fallback_count(&self) -> usize {
        0
    }
}

/// Plays episodes of an [`Environment`], deciding every step through the VAF of the ranking
pub struct EpisodeRunner<E: Environment, R> {
    env: E,
    controller: ArgumentationController<E::Action, R>,
    episodes: usize,
}

impl<E, R> EpisodeRunner<E, R>
where
    E: Environment,
    R: Rng,
{
    pub fn new(env: E, rng: R) -> Result<Self, EnvError> {
        let controller = ArgumentationController::new(env.argument_table().clone(), rng)?;
        Ok(Self {
            env,
            controller,
            episodes: 0,
        })
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Decide the action for one observation under `ranking`
    pub fn select_action(
        &mut self,
        ranking: &Ranking,
        observation: &E::Observation,
    ) -> Result<E::Action, EnvError> {
        let vaf = self.controller.value_based(ranking)?;
        let premises = self.env.premises(observation);
        let valid = self.env.valid_arguments(&premises);
        Ok(self.controller.select_action(&vaf, &valid).action())
    }
}

impl<E, R> RankingEvaluator for EpisodeRunner<E, R>
where
    E: Environment,
    R: Rng,
{
    fn argument_names(&self) -> Vec<String> {
        self.env.argument_table().arguments()
    }

    fn evaluate(&mut self, ranking: &Ranking) -> Result<f32, EnvError> {
        let vaf = self.controller.value_based(ranking)?;
        let mut observation = self.env.reset()?;
        self.env.reset_memory();
        self.episodes += 1;

        let mut total_reward = 0.0;
        let mut steps = 0usize;
        loop {
            let premises = self.env.premises(&observation);
            let valid = self.env.valid_arguments(&premises);
            let action = self.controller.select_action(&vaf, &valid).action();
            self.env.update_memory(&observation, action);

            let step = self.env.step(action)?;
            total_reward += step.reward;
            steps += 1;
            let done = step.is_done();
            observation = step.observation;
            if done {
                break;
            }
        }

        tracing::debug!(
            "Episode {} finished after {} steps with return {:.3}",
            self.episodes,
            steps,
            total_reward
        );
        Ok(total_reward)
    }

    fn fallback_count(&self) -> usize {
        self.controller.fallback_count()
    }
}
