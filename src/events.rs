use super::*;

const BLOCK_CHANNEL_CAPACITY: usize = 64;

/// Broadcast to subscribers whenever a session submits a full solution
/// upstream, accepted or not.
#[derive(Debug, Clone)]
pub struct BlockFound {
    pub height: u64,
    pub hash: BlockHash,
    pub address: Address,
    pub worker: String,
    pub difficulty: f64,
    pub rejection: Option<String>,
}

impl BlockFound {
    pub fn accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

pub fn channel() -> (
    broadcast::Sender<BlockFound>,
    broadcast::Receiver<BlockFound>,
) {
    broadcast::channel(BLOCK_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let (sender, mut receiver) = channel();

        sender
            .send(BlockFound {
                height: 1,
                hash: BlockHash::all_zeros(),
                address: "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
                    .parse::<Address<bitcoin::address::NetworkUnchecked>>()
                    .unwrap()
                    .assume_checked(),
                worker: "rig1".into(),
                difficulty: 1e12,
                rejection: None,
            })
            .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.height, 1);
        assert!(event.accepted());
    }
}
