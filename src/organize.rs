//! Id-chain reconstruction: demultiplexing an interleaved message stream
//! into per-pipeline ordered chains.
//!
//! The organizer is an online algorithm over messages in arrival order. A
//! message may arrive before or after its predecessor, so two maps track
//! the open ends of every chain under construction:
//!
//! - `awaited`: successor id → chain expecting it as its next message;
//! - `heads`: head id → chain that may still gain a predecessor.
//!
//! Chains live in an arena of slots; the maps hold slot indices, never
//! references, so ownership of every chain stays with the organizer.
//! When a message connects two chains (its id was awaited by one, its
//! successor heads another) the smaller chain is spliced into the larger
//! and the absorbed slot becomes a tombstone.
//!
//! Per message: one lookup/insert in each map, plus O(min(|C|,|D|)) when
//! two chains join.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::OrganizeError;
use crate::message::{DecodedMessage, MessageId};

/// One reconstructed pipeline: messages in successor-link order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineChain {
    head: MessageId,
    messages: Vec<DecodedMessage>,
    awaiting: Option<MessageId>,
}

impl PipelineChain {
    /// Id of the chain's first message.
    pub fn head_id(&self) -> MessageId {
        self.head
    }

    /// The messages in successor-link order. Never empty.
    pub fn messages(&self) -> &[DecodedMessage] {
        &self.messages
    }

    /// The successor id the chain still expects, if it never closed.
    pub fn awaiting(&self) -> Option<MessageId> {
        self.awaiting
    }

    /// Whether the chain ended with the terminal sentinel.
    pub fn is_complete(&self) -> bool {
        self.awaiting.is_none()
    }

    pub fn into_messages(self) -> Vec<DecodedMessage> {
        self.messages
    }
}

struct ChainState {
    head: MessageId,
    messages: VecDeque<DecodedMessage>,
    /// Ids present in this chain, for cycle detection.
    ids: HashSet<MessageId>,
    awaiting: Option<MessageId>,
    /// Arrival stamp of the earliest message observed for this chain;
    /// determines output order.
    first_arrival: usize,
}

enum Slot {
    Live(ChainState),
    Merged,
}

/// Online reconstruction of id-linked chains from messages in arrival
/// order.
///
/// Call [`ingest`](Self::ingest) once per message, then
/// [`finalize`](Self::finalize). A fatal error from `ingest` means the
/// input cannot be demultiplexed consistently; the organizer should not
/// be used further.
#[derive(Default)]
pub struct Organizer {
    slots: Vec<Slot>,
    awaited: HashMap<MessageId, usize>,
    heads: HashMap<MessageId, usize>,
    consumed: HashSet<MessageId>,
    arrivals: usize,
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Merged
    }
}

impl Organizer {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            awaited: HashMap::new(),
            heads: HashMap::new(),
            consumed: HashSet::new(),
            arrivals: 0,
        }
    }

    /// Route one message into its chain.
    ///
    /// Duplicate ids, ambiguous successors, and cyclic references are
    /// fatal: skipping any of them could silently corrupt chain order.
    pub fn ingest(&mut self, message: DecodedMessage) -> Result<(), OrganizeError> {
        let id = message.id;
        let next = message.next_id;

        if self.consumed.contains(&id) {
            return Err(OrganizeError::DuplicateId { id });
        }

        let stamp = self.arrivals;
        self.arrivals += 1;

        // Either a chain already awaits this id, or it opens a new chain.
        let slot = match self.awaited.remove(&id) {
            Some(slot) => {
                let chain = self.chain_mut(slot);
                chain.awaiting = None;
                chain.ids.insert(id);
                chain.messages.push_back(message);
                slot
            }
            None => {
                let slot = self.slots.len();
                self.slots.push(Slot::Live(ChainState {
                    head: id,
                    messages: VecDeque::from([message]),
                    ids: HashSet::from([id]),
                    awaiting: None,
                    first_arrival: stamp,
                }));
                self.heads.insert(id, slot);
                slot
            }
        };
        self.consumed.insert(id);

        let Some(next) = next else {
            // Terminal sentinel: the chain is closed.
            return Ok(());
        };

        if self.chain(slot).ids.contains(&next) {
            return Err(OrganizeError::CyclicReference { id, next });
        }

        if let Some(&successor) = self.heads.get(&next) {
            // The successor arrived earlier and heads its own chain.
            self.link(slot, successor);
            return Ok(());
        }

        if let Some(&other) = self.awaited.get(&next) {
            return Err(OrganizeError::AmbiguousSuccessor {
                id: next,
                first_head: self.chain(other).head,
                second_head: self.chain(slot).head,
            });
        }

        self.chain_mut(slot).awaiting = Some(next);
        self.awaited.insert(next, slot);
        Ok(())
    }

    /// Consume the organizer, producing chains in first-arrival order
    /// plus a non-fatal report for every chain whose promised successor
    /// never arrived. Incomplete chains are still returned: the
    /// collected prefix is valid as far as it goes.
    pub fn finalize(self) -> (Vec<PipelineChain>, Vec<OrganizeError>) {
        let mut states: Vec<ChainState> = self
            .slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Live(chain) => Some(chain),
                Slot::Merged => None,
            })
            .collect();
        states.sort_by_key(|chain| chain.first_arrival);

        let mut reports = Vec::new();
        let chains = states
            .into_iter()
            .map(|chain| {
                if let Some(awaited) = chain.awaiting {
                    tracing::warn!(head = chain.head, awaited, "incomplete chain");
                    reports.push(OrganizeError::IncompleteChain {
                        head: chain.head,
                        awaited,
                    });
                }
                PipelineChain {
                    head: chain.head,
                    messages: chain.messages.into_iter().collect(),
                    awaiting: chain.awaiting,
                }
            })
            .collect();
        (chains, reports)
    }

    /// Join two chains: `pred`'s tail message links to `succ`'s head.
    /// The smaller side is spliced into the larger; the absorbed slot
    /// becomes a tombstone and the id maps are repointed.
    fn link(&mut self, pred: usize, succ: usize) {
        let mut pred_state = self.take(pred);
        let mut succ_state = self.take(succ);

        // The joined chain keeps pred's head; succ's head id stops being
        // linkable.
        self.heads.remove(&succ_state.head);
        let first_arrival = pred_state.first_arrival.min(succ_state.first_arrival);

        let (survivor, mut merged) = if pred_state.messages.len() >= succ_state.messages.len() {
            pred_state.messages.append(&mut succ_state.messages);
            pred_state.ids.extend(succ_state.ids);
            pred_state.awaiting = succ_state.awaiting;
            (pred, pred_state)
        } else {
            while let Some(message) = pred_state.messages.pop_back() {
                succ_state.messages.push_front(message);
            }
            succ_state.ids.extend(pred_state.ids);
            succ_state.head = pred_state.head;
            (succ, succ_state)
        };
        merged.first_arrival = first_arrival;

        self.heads.insert(merged.head, survivor);
        if let Some(awaited) = merged.awaiting {
            self.awaited.insert(awaited, survivor);
        }

        tracing::debug!(head = merged.head, awaiting = ?merged.awaiting, "linked chains");
        self.slots[survivor] = Slot::Live(merged);
    }

    fn take(&mut self, slot: usize) -> ChainState {
        match std::mem::take(&mut self.slots[slot]) {
            Slot::Live(chain) => chain,
            Slot::Merged => unreachable!("chain slot {slot} already merged"),
        }
    }

    fn chain(&self, slot: usize) -> &ChainState {
        match &self.slots[slot] {
            Slot::Live(chain) => chain,
            Slot::Merged => unreachable!("chain slot {slot} already merged"),
        }
    }

    fn chain_mut(&mut self, slot: usize) -> &mut ChainState {
        match &mut self.slots[slot] {
            Slot::Live(chain) => chain,
            Slot::Merged => unreachable!("chain slot {slot} already merged"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Payload;
    use proptest::prelude::*;

    fn message(id: MessageId, next_id: Option<MessageId>) -> DecodedMessage {
        DecodedMessage {
            id,
            next_id,
            payload: Payload::Text(format!("m{id}")),
            offset: 0,
            line: 1,
        }
    }

    fn organize(messages: Vec<DecodedMessage>) -> (Vec<PipelineChain>, Vec<OrganizeError>) {
        let mut organizer = Organizer::new();
        for m in messages {
            organizer.ingest(m).unwrap();
        }
        organizer.finalize()
    }

    fn ids(chain: &PipelineChain) -> Vec<MessageId> {
        chain.messages().iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_empty_organizer() {
        let (chains, reports) = Organizer::new().finalize();
        assert!(chains.is_empty());
        assert!(reports.is_empty());
    }

    #[test]
    fn test_single_terminal_message() {
        let (chains, reports) = organize(vec![message(5, None)]);
        assert!(reports.is_empty());
        assert_eq!(chains.len(), 1);
        assert_eq!(ids(&chains[0]), vec![5]);
        assert_eq!(chains[0].head_id(), 5);
        assert!(chains[0].is_complete());
    }

    #[test]
    fn test_two_messages_in_link_order() {
        let (chains, reports) = organize(vec![message(1, Some(2)), message(2, None)]);
        assert!(reports.is_empty());
        assert_eq!(chains.len(), 1);
        assert_eq!(ids(&chains[0]), vec![1, 2]);
    }

    #[test]
    fn test_two_messages_successor_arrives_first() {
        let (chains, reports) = organize(vec![message(2, None), message(1, Some(2))]);
        assert!(reports.is_empty());
        assert_eq!(chains.len(), 1);
        assert_eq!(ids(&chains[0]), vec![1, 2]);
        assert!(chains[0].is_complete());
    }

    #[test]
    fn test_whole_chain_in_reverse_arrival_order() {
        let (chains, reports) = organize(vec![
            message(3, None),
            message(2, Some(3)),
            message(1, Some(2)),
        ]);
        assert!(reports.is_empty());
        assert_eq!(chains.len(), 1);
        assert_eq!(ids(&chains[0]), vec![1, 2, 3]);
    }

    #[test]
    fn test_link_through_both_ends() {
        // The middle message connects an awaiting chain to an already
        // arrived successor chain.
        let (chains, reports) = organize(vec![
            message(3, None),
            message(1, Some(2)),
            message(2, Some(3)),
        ]);
        assert!(reports.is_empty());
        assert_eq!(chains.len(), 1);
        assert_eq!(ids(&chains[0]), vec![1, 2, 3]);
    }

    #[test]
    fn test_two_interleaved_pipelines() {
        let (chains, reports) = organize(vec![
            message(10, Some(11)),
            message(20, Some(21)),
            message(11, None),
            message(21, None),
        ]);
        assert!(reports.is_empty());
        assert_eq!(chains.len(), 2);
        assert_eq!(ids(&chains[0]), vec![10, 11]);
        assert_eq!(ids(&chains[1]), vec![20, 21]);
    }

    #[test]
    fn test_chains_ordered_by_first_arrival_not_id() {
        let (chains, _) = organize(vec![
            message(20, Some(21)),
            message(10, Some(11)),
            message(21, None),
            message(11, None),
        ]);
        assert_eq!(chains[0].head_id(), 20);
        assert_eq!(chains[1].head_id(), 10);
    }

    #[test]
    fn test_merged_chain_keeps_earliest_arrival_stamp() {
        // Message 2 arrived before the head of its own chain and before
        // chain 9; the merged chain [1, 2] is first-observed first.
        let (chains, _) = organize(vec![
            message(2, None),
            message(9, None),
            message(1, Some(2)),
        ]);
        assert_eq!(chains.len(), 2);
        assert_eq!(ids(&chains[0]), vec![1, 2]);
        assert_eq!(ids(&chains[1]), vec![9]);
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let mut organizer = Organizer::new();
        organizer.ingest(message(1, Some(2))).unwrap();
        let err = organizer.ingest(message(1, None)).unwrap_err();
        assert_eq!(err, OrganizeError::DuplicateId { id: 1 });
    }

    #[test]
    fn test_duplicate_id_regardless_of_position() {
        let mut organizer = Organizer::new();
        organizer.ingest(message(1, Some(2))).unwrap();
        organizer.ingest(message(2, None)).unwrap();
        organizer.ingest(message(7, None)).unwrap();
        let err = organizer.ingest(message(2, Some(8))).unwrap_err();
        assert_eq!(err, OrganizeError::DuplicateId { id: 2 });
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut organizer = Organizer::new();
        let err = organizer.ingest(message(1, Some(1))).unwrap_err();
        assert_eq!(err, OrganizeError::CyclicReference { id: 1, next: 1 });
    }

    #[test]
    fn test_two_message_cycle() {
        let mut organizer = Organizer::new();
        organizer.ingest(message(1, Some(2))).unwrap();
        let err = organizer.ingest(message(2, Some(1))).unwrap_err();
        assert_eq!(err, OrganizeError::CyclicReference { id: 2, next: 1 });
    }

    #[test]
    fn test_cycle_back_into_longer_chain() {
        let mut organizer = Organizer::new();
        organizer.ingest(message(1, Some(2))).unwrap();
        organizer.ingest(message(2, Some(3))).unwrap();
        let err = organizer.ingest(message(3, Some(1))).unwrap_err();
        assert_eq!(err, OrganizeError::CyclicReference { id: 3, next: 1 });
    }

    #[test]
    fn test_ambiguous_successor() {
        let mut organizer = Organizer::new();
        organizer.ingest(message(1, Some(3))).unwrap();
        let err = organizer.ingest(message(2, Some(3))).unwrap_err();
        assert_eq!(
            err,
            OrganizeError::AmbiguousSuccessor {
                id: 3,
                first_head: 1,
                second_head: 2,
            }
        );
    }

    #[test]
    fn test_incomplete_chain_reported_and_returned() {
        let (chains, reports) = organize(vec![message(1, Some(2))]);
        assert_eq!(chains.len(), 1);
        assert_eq!(ids(&chains[0]), vec![1]);
        assert_eq!(chains[0].awaiting(), Some(2));
        assert!(!chains[0].is_complete());
        assert_eq!(
            reports,
            vec![OrganizeError::IncompleteChain { head: 1, awaited: 2 }]
        );
    }

    #[test]
    fn test_dangling_reference_into_closed_chain() {
        // Message 3 points at id 2, which is already consumed in the
        // middle of a closed chain; the successor can never arrive.
        let (chains, reports) = organize(vec![
            message(1, Some(2)),
            message(2, None),
            message(3, Some(2)),
        ]);
        assert_eq!(chains.len(), 2);
        assert_eq!(ids(&chains[0]), vec![1, 2]);
        assert!(chains[0].is_complete());
        assert_eq!(ids(&chains[1]), vec![3]);
        assert_eq!(
            reports,
            vec![OrganizeError::IncompleteChain { head: 3, awaited: 2 }]
        );
    }

    #[test]
    fn test_incomplete_does_not_suppress_complete_chains() {
        let (chains, reports) = organize(vec![
            message(1, Some(9)),
            message(5, Some(6)),
            message(6, None),
        ]);
        assert_eq!(chains.len(), 2);
        assert_eq!(reports.len(), 1);
        assert!(chains[1].is_complete());
    }

    #[test]
    fn test_replay_yields_identical_output() {
        let arrivals = vec![
            message(4, None),
            message(10, Some(11)),
            message(3, Some(4)),
            message(11, None),
            message(1, Some(2)),
            message(2, Some(3)),
        ];
        let first = organize(arrivals.clone());
        let second = organize(arrivals);
        assert_eq!(first, second);
    }

    fn build_chains(lens: &[usize]) -> Vec<DecodedMessage> {
        let mut messages = Vec::new();
        for (g, &len) in lens.iter().enumerate() {
            let base = (g as MessageId) * 100 + 1;
            for i in 0..len {
                let id = base + i as MessageId;
                let next = (i + 1 < len).then_some(id + 1);
                messages.push(message(id, next));
            }
        }
        messages
    }

    fn interleaved_chains() -> impl Strategy<Value = (Vec<usize>, Vec<DecodedMessage>)> {
        proptest::collection::vec(1usize..5, 1..4).prop_flat_map(|lens| {
            let messages = build_chains(&lens);
            (Just(lens), Just(messages).prop_shuffle())
        })
    }

    proptest! {
        #[test]
        fn prop_reconstruction_is_arrival_order_independent(
            (lens, arrivals) in interleaved_chains(),
        ) {
            let (chains, reports) = organize(arrivals.clone());
            prop_assert!(reports.is_empty());
            prop_assert_eq!(chains.len(), lens.len());

            // Each chain comes back in successor-link order, complete.
            for chain in &chains {
                prop_assert!(chain.is_complete());
                let group = (chain.head_id() - 1) / 100;
                let len = lens[group as usize];
                let expected: Vec<MessageId> =
                    (0..len as MessageId).map(|i| group * 100 + 1 + i).collect();
                prop_assert_eq!(ids(chain), expected);
            }

            // Chains are ordered by the arrival of their earliest message.
            let mut seen = Vec::new();
            for m in &arrivals {
                let group = (m.id - 1) / 100;
                if !seen.contains(&group) {
                    seen.push(group);
                }
            }
            let produced: Vec<MessageId> =
                chains.iter().map(|c| (c.head_id() - 1) / 100).collect();
            prop_assert_eq!(produced, seen);
        }
    }
}
