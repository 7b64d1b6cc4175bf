//! The SPoRA mining session: stage-one/stage-two/small-weave workers, the
//! candidate refresher, and the session controller that owns them
//! (SPEC_FULL.md §2-§5).

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod history;
pub mod messages;
pub mod refresher;
pub mod small_weave;
pub mod stage_one;
pub mod stage_two;
pub mod state;

pub use collaborators::{RetargetModule, RewardPolicy, TxReplayPool, TxRootBuilder, WalletStore};
pub use config::MinerConfig;
pub use controller::{Collaborators, MiningSession, RoundResult};
pub use history::CandidateHistory;
pub use messages::{ControllerMessage, UpdateState};
pub use refresher::{CandidateRefresher, RefreshOutcome};
