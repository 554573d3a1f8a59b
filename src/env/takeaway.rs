//! Bridge to an external keepaway/takeaway simulator
//!
//! The simulator's takers read the ranking file themselves; this side only
//! writes the ranking, kicks off an episode over UDP and waits for the result.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::runtime::{Builder, Runtime};

use crate::argumentation::{ArgumentTable, Ranking};

use super::{EnvError, RankingEvaluator};

const START_MESSAGE: &[u8] = b"start";
const MAX_DATAGRAM: usize = 16;

pub const TAKERS: usize = 3;
/// Keepers a taker may mark; keeper 1 holds the ball
pub const MARKABLE_KEEPERS: [usize; 3] = [2, 3, 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TakerAction {
    TackleBall = 0,
    MarkKeeper2 = 1,
    MarkKeeper3 = 2,
    MarkKeeper4 = 3,
}

impl TakerAction {
    fn mark(keeper: usize) -> Self {
        match keeper {
            2 => TakerAction::MarkKeeper2,
            3 => TakerAction::MarkKeeper3,
            _ => TakerAction::MarkKeeper4,
        }
    }
}

/// Kinds of taker argument; every kind but `TackleBall` refers to a keeper
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArgumentKind {
    TackleBall,
    OpenKeeper,
    FarKeeper,
    MinAngle,
    MinDist,
}

impl ArgumentKind {
    pub const KEEPER_KINDS: [ArgumentKind; 4] = [
        ArgumentKind::OpenKeeper,
        ArgumentKind::FarKeeper,
        ArgumentKind::MinAngle,
        ArgumentKind::MinDist,
    ];

    pub const ALL: [ArgumentKind; 5] = [
        ArgumentKind::TackleBall,
        ArgumentKind::OpenKeeper,
        ArgumentKind::FarKeeper,
        ArgumentKind::MinAngle,
        ArgumentKind::MinDist,
    ];

    /// Kind of a catalogue argument name such as `MinDist2,3`
    pub fn of(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| name.starts_with(&kind.to_string()))
    }
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgumentKind::TackleBall => "TackleBall",
            ArgumentKind::OpenKeeper => "OpenKeeper",
            ArgumentKind::FarKeeper => "FarKeeper",
            ArgumentKind::MinAngle => "MinAngle",
            ArgumentKind::MinDist => "MinDist",
        };
        write!(f, "{}", name)
    }
}

/// The 39 taker arguments, grouped by taker: `TackleBall{t}` then `{Kind}{t},{k}` per keeper
pub fn taker_arguments() -> Result<ArgumentTable<TakerAction>, EnvError> {
    let mut entries = Vec::new();
    for taker in 1..=TAKERS {
        entries.push((format!("{}{}", ArgumentKind::TackleBall, taker), TakerAction::TackleBall));
        for keeper in MARKABLE_KEEPERS {
            for kind in ArgumentKind::KEEPER_KINDS {
                entries.push((format!("{}{},{}", kind, taker, keeper), TakerAction::mark(keeper)));
            }
        }
    }
    Ok(ArgumentTable::new(entries)?)
}

/// Mean weight of each argument kind under `ranking`, rounded, highest first
pub fn kind_values(ranking: &Ranking, names: &[String]) -> Vec<(ArgumentKind, usize)> {
    let mut totals: BTreeMap<ArgumentKind, (usize, usize)> = BTreeMap::new();
    for (argument, weight) in ranking.weights() {
        if let Some(kind) = names.get(argument).and_then(|n| ArgumentKind::of(n)) {
            let entry = totals.entry(kind).or_insert((0, 0));
            entry.0 += weight;
            entry.1 += 1;
        }
    }

    let mut values: Vec<(ArgumentKind, usize)> = totals
        .into_iter()
        .map(|(kind, (sum, count))| (kind, (sum as f64 / count as f64).round() as usize))
        .collect();
    values.sort_by(|a, b| b.1.cmp(&a.1));
    values
}

#[derive(Debug, Clone)]
pub struct TakeawayConfig {
    /// Where the simulator listens for `start`
    pub send_addr: SocketAddr,
    /// Where the episode result is received
    pub recv_addr: SocketAddr,
    /// Ranking file read by the simulator's takers
    pub ranking_path: PathBuf,
    pub timeout: Duration,
    /// `start` messages sent before giving up on an episode
    pub max_attempts: usize,
}

impl Default for TakeawayConfig {
    fn default() -> Self {
        Self {
            send_addr: SocketAddr::from(([127, 0, 0, 1], 6000)),
            recv_addr: SocketAddr::from(([0, 0, 0, 0], 6001)),
            ranking_path: PathBuf::from("takeaway_ranking.txt"),
            timeout: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

/// [`RankingEvaluator`] backed by the external simulator
pub struct TakeawayBridge {
    config: TakeawayConfig,
    names: Vec<String>,
    runtime: Runtime,
}

impl TakeawayBridge {
    pub fn new(config: TakeawayConfig) -> Result<Self, EnvError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let names = taker_arguments()?.arguments();
        Ok(Self {
            config,
            names,
            runtime,
        })
    }

    pub fn config(&self) -> &TakeawayConfig {
        &self.config
    }

    async fn play(&self) -> Result<f32, EnvError> {
        // bind before starting so the result cannot arrive unheard
        let socket = UdpSocket::bind(self.config.recv_addr).await?;
        let mut buf = [0u8; MAX_DATAGRAM];

        for attempt in 1..=self.config.max_attempts {
            self.send_start().await?;
            match tokio::time::timeout(self.config.timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => {
                    let duration = parse_result(&buf[..len])?;
                    tracing::debug!("Episode result {} from {}", duration, from);
                    return Ok(-duration);
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => {
                    tracing::warn!(
                        "Missed result (attempt {}/{}), restarting episode",
                        attempt,
                        self.config.max_attempts
                    );
                }
            }
        }

        Err(EnvError::Timeout {
            attempts: self.config.max_attempts,
        })
    }

    async fn send_start(&self) -> Result<(), EnvError> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?;
        socket.send_to(START_MESSAGE, self.config.send_addr).await?;
        Ok(())
    }
}

impl RankingEvaluator for TakeawayBridge {
    fn argument_names(&self) -> Vec<String> {
        self.names.clone()
    }

    /// The simulator reports the episode duration; shorter is better for the takers
    fn evaluate(&mut self, ranking: &Ranking) -> Result<f32, EnvError> {
        ranking.validate(self.names.len())?;
        ranking.save(&self.config.ranking_path)?;
        self.runtime.block_on(self.play())
    }
}

fn parse_result(datagram: &[u8]) -> Result<f32, EnvError> {
    let text = std::str::from_utf8(datagram)
        .map_err(|err| EnvError::Protocol(format!("result is not utf-8: {}", err)))?;
    text.trim()
        .parse::<f32>()
        .map_err(|err| EnvError::Protocol(format!("bad result '{}': {}", text.trim(), err)))
}
