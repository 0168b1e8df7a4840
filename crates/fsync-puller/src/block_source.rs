use async_trait::async_trait;
use fsync_fileset::DeviceId;
use fsync_model::StrongHash;

/// External transport collaborator: fetches one block's bytes from a
/// remote device. The wire protocol that implements this is out of scope;
/// the pull workers consume it purely through this trait (§4.3.6 step 4 of
/// the pull-worker algorithm, §1 non-goals).
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn read_block(
        &self,
        device: DeviceId,
        folder: &str,
        name: &str,
        offset: u64,
        size: u32,
        strong_hash: StrongHash,
    ) -> std::io::Result<Vec<u8>>;
}
