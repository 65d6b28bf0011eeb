use common::comm::{ClassifiedPacket, Role};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

/// The most recent packet of every role, so that a newly connected dashboard
/// can be hydrated without waiting for the next uplink.
///
/// Holds at most one packet per role and no history. Entries never expire,
/// they are only overwritten. Cloning yields another handle to the same cache.
#[derive(Clone, Debug, Default)]
pub struct StateCache {
  entries: Arc<Mutex<HashMap<Role, ClassifiedPacket>>>,
}

impl StateCache {
  /// Constructs a new, empty `StateCache`.
  pub fn new() -> Self {
    StateCache::default()
  }

  /// Replaces the packet stored for `role`. Last write by arrival wins,
  /// regardless of packet timestamps.
  pub async fn put(&self, role: Role, packet: ClassifiedPacket) {
    self.entries.lock().await.insert(role, packet);
  }

  /// The packet stored for `role`, if one was ever put.
  pub async fn get(&self, role: Role) -> Option<ClassifiedPacket> {
    self.entries.lock().await.get(&role).cloned()
  }

  /// Every role with a stored packet, in ascending order.
  pub async fn roles(&self) -> Vec<Role> {
    let mut roles = self
      .entries
      .lock()
      .await
      .keys()
      .copied()
      .collect::<Vec<_>>();

    roles.sort();
    roles
  }
}
