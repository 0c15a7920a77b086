//! Governance votes cast by bonded validators
//!
//! Votes are found at the top level of a transaction and inside authorization
//! wrappers, which are decoded and searched recursively up to
//! [`MAX_NESTED_MSG_DEPTH`]. What happens to a vote from a bonded validator is
//! decided by the configured [`VotePolicy`].

use crate::context::{Event, ExecutionContext, ValidatorVote};
use crate::crypto::address_to_hex;
use crate::error::AdmissionError;
use crate::keepers::{MsgCodec, ValidatorSet, ValidatorSnapshot};
use crate::pipeline::{Next, Stage, StageKind};
use crate::transaction::{Msg, Tx};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Deepest level of `Exec` nesting that is inspected before the transaction is rejected.
pub const MAX_NESTED_MSG_DEPTH: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotePolicy {
    /// Validator votes are admitted like any other.
    #[default]
    Accept,
    /// Validator votes are refused at admission.
    Reject,
    /// Validator votes are admitted and recorded on the context.
    Tag,
}

/// Collects every vote in `msgs` whose voter is a bonded validator in `snapshot`.
pub fn inspect_votes(
    snapshot: &ValidatorSnapshot,
    msgs: &[Msg],
    codec: &dyn MsgCodec,
) -> Result<Vec<ValidatorVote>, AdmissionError> {
    let mut found = Vec::new();
    collect_votes(snapshot, msgs, codec, 0, &mut found)?;
    Ok(found)
}

fn collect_votes(
    snapshot: &ValidatorSnapshot,
    msgs: &[Msg],
    codec: &dyn MsgCodec,
    depth: usize,
    found: &mut Vec<ValidatorVote>,
) -> Result<(), AdmissionError> {
    if depth > MAX_NESTED_MSG_DEPTH {
        return Err(AdmissionError::InvalidRequest(format!(
            "nested messages exceed maximum depth of {}",
            MAX_NESTED_MSG_DEPTH
        )));
    }
    for msg in msgs {
        match msg {
            Msg::Vote {
                proposal_id, voter, ..
            }
            | Msg::WeightedVote {
                proposal_id, voter, ..
            } => {
                if snapshot.is_bonded(voter) {
                    found.push(ValidatorVote {
                        voter: *voter,
                        proposal_id: *proposal_id,
                    });
                }
            }
            Msg::Exec { msgs: inner, .. } => {
                let decoded = inner
                    .iter()
                    .map(|any| codec.decode(any))
                    .collect::<Result<Vec<_>, _>>()?;
                collect_votes(snapshot, &decoded, codec, depth + 1, found)?;
            }
            _ => {}
        }
    }
    Ok(())
}

pub struct GovVoteInspectorStage {
    validators: Arc<dyn ValidatorSet>,
    codec: Arc<dyn MsgCodec>,
    policy: VotePolicy,
}

impl GovVoteInspectorStage {
    pub fn new(
        validators: Arc<dyn ValidatorSet>,
        codec: Arc<dyn MsgCodec>,
        policy: VotePolicy,
    ) -> Self {
        GovVoteInspectorStage {
            validators,
            codec,
            policy,
        }
    }
}

impl Stage for GovVoteInspectorStage {
    fn kind(&self) -> StageKind {
        StageKind::GovVoteInspector
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let snapshot = self.validators.snapshot();
        let votes = inspect_votes(&snapshot, &tx.body.messages, self.codec.as_ref())?;

        if !votes.is_empty() {
            debug!(count = votes.len(), policy = ?self.policy, "validator votes found");
            match self.policy {
                VotePolicy::Accept => {}
                VotePolicy::Reject => {
                    return Err(AdmissionError::ValidatorVote(address_to_hex(&votes[0].voter)));
                }
                VotePolicy::Tag => {
                    for vote in &votes {
                        ctx.emit(
                            Event::new("validator_vote")
                                .attr("voter", address_to_hex(&vote.voter))
                                .attr("proposal_id", vote.proposal_id.to_string()),
                        );
                    }
                    ctx.validator_votes.extend(votes);
                    ctx.validator_vote_tagged = true;
                }
            }
        }

        next.run(ctx, tx, simulate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address_from_string;
    use crate::keepers::{BondStatus, Validator};
    use crate::memstore::StaticValidatorSet;
    use crate::transaction::{JsonCodec, VoteOption};

    fn snapshot() -> ValidatorSnapshot {
        ValidatorSnapshot::new(vec![
            Validator {
                operator: address_from_string("val"),
                tokens: 1_000,
                status: BondStatus::Bonded,
            },
            Validator {
                operator: address_from_string("jailed"),
                tokens: 1_000,
                status: BondStatus::Unbonded,
            },
        ])
    }

    fn vote(voter: &str, proposal_id: u64) -> Msg {
        Msg::Vote {
            proposal_id,
            voter: address_from_string(voter),
            option: VoteOption::Yes,
        }
    }

    fn exec(inner: Msg) -> Msg {
        Msg::Exec {
            grantee: address_from_string("grantee"),
            msgs: vec![JsonCodec.encode(&inner).unwrap()],
        }
    }

    #[test]
    fn test_only_bonded_voters_found() {
        let msgs = vec![vote("someone", 1), vote("jailed", 1), vote("val", 2)];
        let found = inspect_votes(&snapshot(), &msgs, &JsonCodec).unwrap();
        assert_eq!(
            found,
            vec![ValidatorVote {
                voter: address_from_string("val"),
                proposal_id: 2
            }]
        );
    }

    #[test]
    fn test_nested_votes_found() {
        let msgs = vec![exec(exec(vote("val", 9)))];
        let found = inspect_votes(&snapshot(), &msgs, &JsonCodec).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].proposal_id, 9);
    }

    #[test]
    fn test_nesting_depth_bounded() {
        let mut msg = vote("val", 1);
        for _ in 0..=MAX_NESTED_MSG_DEPTH {
            msg = exec(msg);
        }
        assert!(matches!(
            inspect_votes(&snapshot(), &[msg], &JsonCodec),
            Err(AdmissionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_policies() {
        let tx = Tx::new(vec![vote("val", 3)], Default::default());
        let stage = |policy| {
            GovVoteInspectorStage::new(
                Arc::new(StaticValidatorSet::new(snapshot())),
                Arc::new(JsonCodec),
                policy,
            )
        };

        let mut ctx = ExecutionContext::new("c", 1);
        stage(VotePolicy::Accept)
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap();
        assert!(!ctx.validator_vote_tagged);

        let mut ctx = ExecutionContext::new("c", 1);
        assert!(matches!(
            stage(VotePolicy::Reject).handle(&mut ctx, &tx, false, Next::end()),
            Err(AdmissionError::ValidatorVote(_))
        ));

        let mut ctx = ExecutionContext::new("c", 1);
        stage(VotePolicy::Tag)
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap();
        assert!(ctx.validator_vote_tagged);
        assert_eq!(ctx.validator_votes.len(), 1);
        assert_eq!(ctx.events()[0].kind, "validator_vote");
        assert_eq!(ctx.events()[0].get("proposal_id"), Some("3"));
    }

    #[test]
    fn test_policy_parses_lowercase() {
        let p: VotePolicy = serde_json::from_str("\"tag\"").unwrap();
        assert_eq!(p, VotePolicy::Tag);
    }
}
