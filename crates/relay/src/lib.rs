pub mod config;
pub mod discovery;
pub mod error;
pub mod message;
pub mod metrics;
pub mod participant;
pub mod probe;
pub mod protocol;
pub mod pubsub;
pub mod registry;
pub mod relay;
mod shutdown;
pub mod topic;
pub mod traits;
pub mod transport;

pub use config::{DiscoverySection, FabricConfig, ParticipantSection, RelaySection};
pub use discovery::{DiscoveryClient, DiscoveryService};
pub use error::RelayError;
pub use message::RelayMessage;
pub use metrics::{MetricsSnapshot, PlaneSnapshot, RelayMetrics};
pub use participant::{
    Actor, ActorConfig, Client, ClientConfig, ParticipantEndpoints, ParticipantState,
};
pub use probe::{LatencyStats, ProbeFrame, Throughput};
pub use protocol::{Category, ProtocolError, Request, Response};
pub use pubsub::{ZmqPublisher, ZmqSubscriber};
pub use registry::TopicRegistry;
pub use relay::{Plane, RelayConfig, RelayEngine};
pub use topic::{Topic, TopicError};
pub use traits::{Egress, EventPublisher, EventSubscriber, Ingress};
pub use transport::Transport;
