use super::StateCache;
use common::comm::{Channel, ChannelMessage, ClassifiedPacket, MatchBasis, Role};
use jeflog::warn;
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::{
  broadcast::{self, error::RecvError, error::TryRecvError},
  Mutex,
};

/// Number of frames a slow client may fall behind before it starts losing
/// them.
pub const CLIENT_BUFFER: usize = 64;

/// Fans classified packets out to every connected dashboard client, and
/// hydrates new clients from the snapshot cache.
///
/// Publishing a packet and connecting a client are mutually exclusive, so a
/// client sees every packet either in its hydration backlog or live, never
/// both, and packets of one role always arrive in ingest order.
#[derive(Clone, Debug)]
pub struct Dispatcher {
  sender: broadcast::Sender<ChannelMessage>,
  cache: StateCache,
  gate: Arc<Mutex<()>>,
}

/// A single client's view of the dispatcher: the hydration backlog followed by
/// every live frame broadcast after the client connected.
#[derive(Debug)]
pub struct Subscription {
  backlog: VecDeque<ChannelMessage>,
  live: broadcast::Receiver<ChannelMessage>,
}

impl Dispatcher {
  /// Constructs a dispatcher hydrating new clients from `cache`.
  pub fn new(cache: StateCache) -> Self {
    let (sender, _) = broadcast::channel(CLIENT_BUFFER);

    Dispatcher {
      sender,
      cache,
      gate: Arc::new(Mutex::new(())),
    }
  }

  /// The frames a packet is published as. Every packet goes on its role's
  /// channel, and identity-matched packets are mirrored on the legacy
  /// `sensorData` channel.
  pub fn frames(packet: &ClassifiedPacket) -> Vec<ChannelMessage> {
    let mut frames = vec![ChannelMessage {
      event: Channel::for_role(packet.role),
      data: packet.clone(),
    }];

    if packet.role.is_known() && packet.basis == MatchBasis::Identity {
      frames.push(ChannelMessage {
        event: Channel::SensorData,
        data: packet.clone(),
      });
    }

    frames
  }

  /// Records a newly ingested packet in the cache, if its role is known, and
  /// sends it to every connected client. Returns the number of clients it
  /// reached.
  pub async fn publish(&self, packet: &ClassifiedPacket) -> usize {
    let _gate = self.gate.lock().await;

    if packet.role.is_known() {
      self.cache.put(packet.role, packet.clone()).await;
    }

    self.broadcast_new(packet)
  }

  /// Sends a packet to every connected client without touching the cache.
  /// Returns the number of clients it reached.
  fn broadcast_new(&self, packet: &ClassifiedPacket) -> usize {
    let mut reached = 0;

    for frame in Self::frames(packet) {
      // an error only means nobody is connected right now
      reached = self.sender.send(frame).unwrap_or(0);
    }

    reached
  }

  /// The hydration frames for one new client: the cached packet of every
  /// known role, on that role's channel. Unknown packets are never cached, so
  /// they are never hydrated.
  pub async fn hydrate(&self) -> VecDeque<ChannelMessage> {
    let mut backlog = VecDeque::with_capacity(Role::KNOWN.len());

    for role in Role::KNOWN {
      if let Some(packet) = self.cache.get(role).await {
        backlog.push_back(ChannelMessage {
          event: Channel::for_role(role),
          data: packet,
        });
      }
    }

    backlog
  }

  /// Registers a new client. Hydration happens exactly once, here, and is
  /// delivered before any live frame.
  pub async fn connect(&self) -> Subscription {
    // no packet may be published between subscribing and reading the cache
    let _gate = self.gate.lock().await;
    let live = self.sender.subscribe();
    let backlog = self.hydrate().await;

    Subscription { backlog, live }
  }

  /// Number of clients currently connected.
  pub fn client_count(&self) -> usize {
    self.sender.receiver_count()
  }
}

impl Subscription {
  /// Waits for the next frame for this client. Returns `None` once the
  /// dispatcher is gone.
  pub async fn recv(&mut self) -> Option<ChannelMessage> {
    if let Some(frame) = self.backlog.pop_front() {
      return Some(frame);
    }

    loop {
      match self.live.recv().await {
        Ok(frame) => return Some(frame),
        Err(RecvError::Lagged(skipped)) => {
          warn!("Dashboard client fell behind; {skipped} frames dropped.");
        }
        Err(RecvError::Closed) => return None,
      }
    }
  }

  /// The next frame if one is already waiting.
  pub fn try_recv(&mut self) -> Option<ChannelMessage> {
    if let Some(frame) = self.backlog.pop_front() {
      return Some(frame);
    }

    loop {
      match self.live.try_recv() {
        Ok(frame) => return Some(frame),
        Err(TryRecvError::Lagged(_)) => continue,
        Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use common::comm::RadioMetadata;

  fn packet(role: Role, basis: MatchBasis, ts: u64) -> ClassifiedPacket {
    ClassifiedPacket {
      device_id: format!("dev-{ts}"),
      role,
      basis,
      payload: Default::default(),
      radio: RadioMetadata::default(),
      ts,
    }
  }

  #[test]
  fn identity_packets_mirror_on_legacy_channel() {
    let frames = Dispatcher::frames(&packet(Role::Node1, MatchBasis::Identity, 1));
    let events = frames.iter().map(|f| f.event).collect::<Vec<_>>();

    assert_eq!(events, vec![Channel::Node1Data, Channel::SensorData]);
  }

  #[test]
  fn shape_and_unknown_packets_use_one_channel() {
    let shaped = Dispatcher::frames(&packet(Role::Node2, MatchBasis::Shape, 1));
    let unknown =
      Dispatcher::frames(&packet(Role::Unknown, MatchBasis::Fallback, 2));

    assert_eq!(shaped.len(), 1);
    assert_eq!(shaped[0].event, Channel::Node2Data);
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].event, Channel::UnknownNode);
  }

  #[tokio::test]
  async fn broadcast_reaches_every_client() {
    let dispatcher = Dispatcher::new(StateCache::new());

    assert_eq!(
      dispatcher.publish(&packet(Role::Node2, MatchBasis::Shape, 1)).await,
      0
    );

    let mut first = dispatcher.connect().await;
    let mut second = dispatcher.connect().await;
    assert_eq!(dispatcher.client_count(), 2);

    let reached =
      dispatcher.publish(&packet(Role::Node2, MatchBasis::Shape, 2)).await;
    assert_eq!(reached, 2);

    assert_eq!(first.recv().await.map(|f| f.data.ts), Some(2));
    assert_eq!(second.recv().await.map(|f| f.data.ts), Some(2));
    assert!(first.try_recv().is_none());
  }

  #[tokio::test]
  async fn hydration_precedes_live_frames() {
    let cache = StateCache::new();
    let dispatcher = Dispatcher::new(cache.clone());

    cache.put(Role::Node2, packet(Role::Node2, MatchBasis::Shape, 20)).await;
    cache.put(Role::Node1, packet(Role::Node1, MatchBasis::Shape, 10)).await;

    let mut client = dispatcher.connect().await;
    dispatcher.publish(&packet(Role::Node1, MatchBasis::Shape, 30)).await;

    let received = [
      client.recv().await.unwrap(),
      client.recv().await.unwrap(),
      client.recv().await.unwrap(),
    ];

    assert_eq!(received[0].event, Channel::Node1Data);
    assert_eq!(received[0].data.ts, 10);
    assert_eq!(received[1].event, Channel::Node2Data);
    assert_eq!(received[1].data.ts, 20);
    assert_eq!(received[2].data.ts, 30);
  }

  #[tokio::test]
  async fn hydration_is_per_client() {
    let cache = StateCache::new();
    let dispatcher = Dispatcher::new(cache.clone());
    let mut early = dispatcher.connect().await;

    cache.put(Role::Node1, packet(Role::Node1, MatchBasis::Identity, 1)).await;
    let mut late = dispatcher.connect().await;

    assert_eq!(late.try_recv().map(|f| f.data.ts), Some(1));
    assert!(late.try_recv().is_none());
    // the early client is not re-hydrated by someone else connecting
    assert!(early.try_recv().is_none());
  }

  #[tokio::test]
  async fn unknown_packets_skip_the_cache() {
    let cache = StateCache::new();
    let dispatcher = Dispatcher::new(cache.clone());

    dispatcher.publish(&packet(Role::Unknown, MatchBasis::Fallback, 1)).await;
    assert!(cache.roles().await.is_empty());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn connecting_never_reorders_a_role() {
    let dispatcher = Dispatcher::new(StateCache::new());

    let publisher = {
      let dispatcher = dispatcher.clone();
      tokio::spawn(async move {
        for ts in 1..=200 {
          dispatcher.publish(&packet(Role::Node1, MatchBasis::Shape, ts)).await;
          tokio::task::yield_now().await;
        }
      })
    };

    let mut clients = Vec::new();
    for _ in 0..20 {
      clients.push(dispatcher.connect().await);
      tokio::task::yield_now().await;
    }

    publisher.await.unwrap();

    for mut client in clients {
      let mut last = 0;
      while let Some(frame) = client.try_recv() {
        assert!(frame.data.ts > last, "{} after {last}", frame.data.ts);
        last = frame.data.ts;
      }
    }
  }
}
