use crate::context::ExecutionContext;
use crate::error::AdmissionError;
use crate::keepers::RelayKeeper;
use crate::pipeline::{Next, Stage, StageKind};
use crate::transaction::{Msg, Tx};
use std::sync::Arc;
use tracing::debug;

/// Drops relayer transactions whose packet messages were all processed already.
///
/// Only runs for mempool admission. Client updates must be valid for the whole
/// transaction to be admitted.
pub struct RedundantRelayStage {
    relay: Arc<dyn RelayKeeper>,
}

impl RedundantRelayStage {
    pub fn new(relay: Arc<dyn RelayKeeper>) -> Self {
        RedundantRelayStage { relay }
    }
}

impl Stage for RedundantRelayStage {
    fn kind(&self) -> StageKind {
        StageKind::RedundantRelay
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        if ctx.is_check_tx() {
            let mut packet_msgs = 0usize;
            let mut redundancies = 0usize;
            for msg in &tx.body.messages {
                match msg {
                    Msg::RecvPacket { packet, .. }
                    | Msg::Acknowledgement { packet, .. }
                    | Msg::Timeout { packet, .. } => {
                        packet_msgs += 1;
                        if self.relay.is_redundant(packet) {
                            redundancies += 1;
                        }
                    }
                    Msg::UpdateClient { client_id, .. } => {
                        if !self.relay.update_client_valid(client_id) {
                            return Err(AdmissionError::InvalidRequest(format!(
                                "client update for {} is invalid",
                                client_id
                            )));
                        }
                    }
                    _ => {}
                }
            }
            if packet_msgs > 0 && redundancies == packet_msgs {
                debug!(packet_msgs, "all packet messages redundant");
                return Err(AdmissionError::RedundantTx(
                    "packet messages are redundant".to_string(),
                ));
            }
        }
        next.run(ctx, tx, simulate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecMode;
    use crate::crypto::address_from_string;
    use crate::memstore::InMemoryRelayStore;
    use crate::transaction::{Fee, PacketId};

    fn packet(seq: u64) -> PacketId {
        PacketId {
            source_port: "transfer".to_string(),
            source_channel: "channel-0".to_string(),
            destination_port: "transfer".to_string(),
            destination_channel: "channel-7".to_string(),
            sequence: seq,
        }
    }

    fn recv(seq: u64) -> Msg {
        Msg::RecvPacket {
            packet: packet(seq),
            signer: address_from_string("relayer"),
        }
    }

    #[test]
    fn test_all_redundant_rejected_in_check_only() {
        let store = Arc::new(InMemoryRelayStore::new());
        store.mark_processed(packet(1));
        let stage = RedundantRelayStage::new(store);
        let tx = Tx::new(vec![recv(1)], Fee::default());

        let mut check = ExecutionContext::new("c", 2);
        assert!(matches!(
            stage.handle(&mut check, &tx, false, Next::end()),
            Err(AdmissionError::RedundantTx(_))
        ));

        let mut deliver = ExecutionContext::new("c", 2).with_mode(ExecMode::Deliver);
        stage.handle(&mut deliver, &tx, false, Next::end()).unwrap();
    }

    #[test]
    fn test_partial_redundancy_admitted() {
        let store = Arc::new(InMemoryRelayStore::new());
        store.mark_processed(packet(1));
        let stage = RedundantRelayStage::new(store);
        let tx = Tx::new(vec![recv(1), recv(2)], Fee::default());
        stage
            .handle(&mut ExecutionContext::new("c", 2), &tx, false, Next::end())
            .unwrap();
    }

    #[test]
    fn test_invalid_client_update() {
        let store = Arc::new(InMemoryRelayStore::new());
        store.set_client_valid("07-tendermint-0", false);
        let stage = RedundantRelayStage::new(store);
        let tx = Tx::new(
            vec![Msg::UpdateClient {
                client_id: "07-tendermint-0".to_string(),
                signer: address_from_string("relayer"),
            }],
            Fee::default(),
        );
        assert!(matches!(
            stage.handle(&mut ExecutionContext::new("c", 2), &tx, false, Next::end()),
            Err(AdmissionError::InvalidRequest(_))
        ));
    }
}
