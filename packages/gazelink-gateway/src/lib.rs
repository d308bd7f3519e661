pub mod config;
pub mod downsample;
pub mod negotiate;
pub mod registry;
pub mod session;
pub mod types;
pub mod websocket;

pub use config::{ConfigError, GatewayConfig};
pub use downsample::DownsampleGate;
pub use negotiate::{negotiate, Negotiated};
pub use registry::{ClientHandle, ClientRegistry};
pub use session::{SessionError, StreamConfig, TrackerSession};
pub use types::{parse_command, Command, Outbound, StreamSample};
pub use websocket::{broadcast_pipeline, dispatch, handle_connection, handle_text, GatewayState};
