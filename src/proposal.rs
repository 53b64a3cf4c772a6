//! Proposal drafts and the governance-specific execution settings.

use chrono::{DateTime, Datelike, Days, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dao::VotingMechanism;
use crate::installation::DaoAction;
use crate::primitives::{Address, TxHash};

/// Multisig proposals stay open this long; execution is gated by approvals.
pub const MULTISIG_PROPOSAL_LIFETIME_YEARS: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProposalMedia {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

/// Metadata pinned off-chain and referenced by the proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub resources: Vec<ProposalResource>,
    #[serde(default)]
    pub media: ProposalMedia,
}

const PATTERN_LOGO: &str = "https://assets-global.website-files.com/65410dc30116ce87ecbef5cd/654f75bc7db9aa282ca87e21_Logo%2Btext%20White.png";

impl ProposalMetadata {
    /// Metadata for the proposal that installs the SubDAO plugin.
    pub fn subdao_installation(child_dao: &str, parent_dao: &str) -> Self {
        Self {
            title: "Sub-DAO plugin installation".to_string(),
            summary: "Granting parent DAO execution permission on child dao".to_string(),
            description: format!(
                "By installing this plugin, the plugin will grant the execution access of child dao ({}) to parent dao ({})",
                child_dao, parent_dao
            ),
            resources: vec![ProposalResource {
                name: "Pattern".to_string(),
                url: "https://patterns.community".to_string(),
            }],
            media: ProposalMedia {
                header: Some(PATTERN_LOGO.to_string()),
                logo: Some(PATTERN_LOGO.to_string()),
            },
        }
    }
}

/// Token-voting ballot options, numbered as the voting contract expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoteValue {
    None = 0,
    Abstain = 1,
    Yes = 2,
    No = 3,
}

/// When a proposal opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalDate {
    /// Let the contract use the current block time.
    Immediate,
    /// Let the contract apply its configured minimum voting duration.
    MinimumDuration,
    At(DateTime<Utc>),
}

impl ProposalDate {
    /// Seconds value passed on-chain; zero asks the contract for its default.
    pub fn as_unix_seconds(self) -> u64 {
        match self {
            ProposalDate::Immediate | ProposalDate::MinimumDuration => 0,
            ProposalDate::At(ts) => u64::try_from(ts.timestamp()).unwrap_or(0),
        }
    }
}

/// Same calendar date and time `years` later. A Feb 29 that has no
/// counterpart rolls over to Mar 1.
fn years_later(now: DateTime<Utc>, years: i32) -> DateTime<Utc> {
    let target = now.year() + years;
    now.with_year(target)
        .or_else(|| {
            now.checked_add_days(Days::new(1))
                .and_then(|next| next.with_year(target))
        })
        .unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionParams {
    TokenVoting {
        creator_vote: VoteValue,
        execute_on_pass: bool,
        start: ProposalDate,
        end: ProposalDate,
    },
    Multisig {
        approve: bool,
        try_execution: bool,
        start: ProposalDate,
        end: ProposalDate,
    },
}

impl ExecutionParams {
    /// Settings that let the proposer's own vote or approval carry the
    /// proposal straight to execution where the plugin allows it.
    pub fn for_mechanism(mechanism: VotingMechanism, now: DateTime<Utc>) -> Self {
        match mechanism {
            VotingMechanism::TokenVoting => ExecutionParams::TokenVoting {
                creator_vote: VoteValue::Yes,
                execute_on_pass: true,
                start: ProposalDate::Immediate,
                end: ProposalDate::MinimumDuration,
            },
            VotingMechanism::Multisig => {
                let end = years_later(now, MULTISIG_PROPOSAL_LIFETIME_YEARS);
                ExecutionParams::Multisig {
                    approve: true,
                    try_execution: true,
                    start: ProposalDate::Immediate,
                    end: ProposalDate::At(end),
                }
            }
        }
    }

    pub fn mechanism(&self) -> VotingMechanism {
        match self {
            ExecutionParams::TokenVoting { .. } => VotingMechanism::TokenVoting,
            ExecutionParams::Multisig { .. } => VotingMechanism::Multisig,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub metadata: ProposalMetadata,
    pub plugin_address: Address,
    pub actions: Vec<DaoAction>,
    pub execution: ExecutionParams,
}

/// Proposal identifier in `<plugin address>_0x<hex id>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl ProposalId {
    pub fn new(plugin: Address, id: u128) -> Self {
        Self(format!("{}_0x{:x}", plugin, id))
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResult {
    pub tx_hash: TxHash,
    pub proposal_id: ProposalId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn token_voting_votes_yes_and_executes_on_pass() {
        let now = Utc::now();
        match ExecutionParams::for_mechanism(VotingMechanism::TokenVoting, now) {
            ExecutionParams::TokenVoting {
                creator_vote,
                execute_on_pass,
                start,
                end,
            } => {
                assert_eq!(creator_vote, VoteValue::Yes);
                assert!(execute_on_pass);
                assert_eq!(start, ProposalDate::Immediate);
                assert_eq!(end, ProposalDate::MinimumDuration);
            }
            other => panic!("Expected TokenVoting params, got {other:?}"),
        }
    }

    #[test]
    fn multisig_ends_ten_years_out() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        match ExecutionParams::for_mechanism(VotingMechanism::Multisig, now) {
            ExecutionParams::Multisig {
                approve,
                try_execution,
                start,
                end: ProposalDate::At(end),
            } => {
                assert!(approve);
                assert!(try_execution);
                assert_eq!(start, ProposalDate::Immediate);
                assert_eq!(end.year(), 2034);
                // leap day rolls over into March
                assert_eq!((end.month(), end.day()), (3, 1));
                assert_eq!((end.hour(), end.minute()), (12, 0));
            }
            other => panic!("Expected Multisig params with fixed end, got {other:?}"),
        }
    }

    #[test]
    fn years_later_keeps_calendar_date() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 8, 30, 0).unwrap();
        assert_eq!(
            years_later(now, 10),
            Utc.with_ymd_and_hms(2035, 7, 15, 8, 30, 0).unwrap()
        );
        let leap = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(
            years_later(leap, 4),
            Utc.with_ymd_and_hms(2028, 2, 29, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn open_ended_dates_encode_as_zero() {
        assert_eq!(ProposalDate::Immediate.as_unix_seconds(), 0);
        assert_eq!(ProposalDate::MinimumDuration.as_unix_seconds(), 0);
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(ProposalDate::At(ts).as_unix_seconds(), 1_700_000_000);
    }

    #[test]
    fn proposal_id_uses_plugin_prefix_and_hex_counter() {
        let plugin: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        assert_eq!(
            ProposalId::new(plugin, 26).to_string(),
            "0x00000000000000000000000000000000000000aa_0x1a"
        );
    }

    #[test]
    fn installation_metadata_mentions_both_daos() {
        let meta = ProposalMetadata::subdao_installation("child.dao.eth", "parent.dao.eth");
        assert!(meta.description.contains("child.dao.eth"));
        assert!(meta.description.contains("parent.dao.eth"));
        assert_eq!(meta.resources[0].url, "https://patterns.community");
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json["media"]["logo"].is_string());
    }
}
