use std::path::PathBuf;
use std::sync::Arc;

use etrack_rs::{GazeHandler, TrackerFinder};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::downsample::DownsampleGate;
use crate::registry::ClientRegistry;
use crate::session::{SessionError, TrackerSession};
use crate::types::{
    parse_command, AckReply, Command, ConnectReply, DeviceErrorReply, ErrorReply, Outbound,
    SaveDataReply, SetSampleFreqReply, StreamSample,
};

/// Shared gateway state
#[derive(Clone)]
pub struct GatewayState {
    pub session: Arc<Mutex<TrackerSession>>,
    pub registry: ClientRegistry,
    pub gate: Arc<DownsampleGate>,
    pub license_file: PathBuf,
}

impl GatewayState {
    pub fn new(finder: Arc<dyn TrackerFinder>, license_file: PathBuf) -> Self {
        let gate = Arc::new(DownsampleGate::new());
        Self {
            session: Arc::new(Mutex::new(TrackerSession::new(finder, gate.clone()))),
            registry: ClientRegistry::new(),
            gate,
            license_file,
        }
    }
}

/// The broadcast pipeline handed to the device as one unit: downsample gate
/// -> eye-combining formatter -> registry fan-out. Runs on the driver
/// thread; touches only atomics, the registry lock and the serialized frame.
pub fn broadcast_pipeline(state: &GatewayState) -> GazeHandler {
    let gate = state.gate.clone();
    let registry = state.registry.clone();
    Arc::new(move |sample| {
        if !gate.admit() {
            return;
        }
        let wire = StreamSample::from(sample);
        match serde_json::to_string(&wire) {
            Ok(text) => registry.broadcast(&text),
            Err(e) => error!("failed to serialize gaze sample: {e}"),
        }
    })
}

/// Handle one accepted TCP connection for its whole life.
pub async fn handle_connection(stream: TcpStream, state: GatewayState) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed: {e}");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client_id = state.registry.register(tx);
    info!(%client_id, clients = state.registry.client_count(), "client connected");

    // Single writer task owns the sink; replies and broadcasts arrive
    // through the same channel and hit the socket in queue order.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(%client_id, "WebSocket error: {e}");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let outbound = handle_text(text.as_str(), &state).await;
                queue_reply(&state, &client_id, &outbound);
            }
            Message::Binary(data) => {
                // binary frames go through the same parse path; anything
                // that is not UTF-8 JSON comes back as invalidJson
                let outbound = match std::str::from_utf8(&data) {
                    Ok(text) => handle_text(text, &state).await,
                    Err(_) => Outbound::Error(ErrorReply::invalid_json()),
                };
                queue_reply(&state, &client_id, &outbound);
            }
            Message::Ping(payload) => {
                state.registry.send_to(&client_id, Message::Pong(payload));
            }
            Message::Close(_) => {
                debug!(%client_id, "client closed connection");
                break;
            }
            _ => {}
        }
    }

    let remaining = state.registry.unregister(&client_id);
    info!(%client_id, remaining, "client disconnected");
    if remaining == 0 {
        info!("no clients left, stopping streaming and buffering");
        state.session.lock().await.quiesce();
    }

    let _ = writer.await;
}

fn queue_reply(state: &GatewayState, client_id: &uuid::Uuid, outbound: &Outbound) {
    match serde_json::to_string(outbound) {
        Ok(json) => {
            state.registry.send_to(client_id, Message::Text(json.into()));
        }
        Err(e) => error!("failed to serialize reply: {e}"),
    }
}

/// Parse one inbound text frame and run it through the dispatcher.
pub async fn handle_text(text: &str, state: &GatewayState) -> Outbound {
    match parse_command(text) {
        Ok(command) => dispatch(command, state).await,
        Err(err) => Outbound::Error(err),
    }
}

/// Route one parsed command against the shared session and produce exactly
/// one reply. Handlers run one at a time: the session lock is this
/// protocol's single dispatch loop.
pub async fn dispatch(command: Command, state: &GatewayState) -> Outbound {
    let mut session = state.session.lock().await;

    match command {
        Command::Connect => match session.connect(&state.license_file) {
            Ok(info) => Outbound::Connect(ConnectReply::new(info)),
            Err(e) => error_reply(e),
        },

        Command::SetSampleStreamFreq { freq } => match session.set_stream_freq(freq) {
            Ok(chosen) => Outbound::SetSampleFreq(SetSampleFreqReply::negotiated(
                chosen.achieved(),
                chosen.base,
            )),
            Err(e) => error_reply(e),
        },

        Command::StartSampleStream => {
            let pipeline = broadcast_pipeline(state);
            match session.start_stream(pipeline) {
                Ok(()) => Outbound::Ack(AckReply::ok("startSampleStream")),
                Err(e) => error_reply(e),
            }
        }

        Command::StopSampleStream => match session.stop_stream() {
            Ok(()) => Outbound::Ack(AckReply::ok("stopSampleStream")),
            Err(e) => error_reply(e),
        },

        Command::SetBaseSampleFreq { freq } => match session.set_base_freq(freq) {
            Ok(()) => Outbound::SetSampleFreq(SetSampleFreqReply::pinned(freq)),
            Err(e) => error_reply(e),
        },

        Command::StartSampleBuffer => match session.start_buffer() {
            Ok(status) => Outbound::Ack(AckReply::status("startSampleBuffer", status)),
            Err(e) => error_reply(e),
        },

        Command::ClearSampleBuffer => {
            session.clear_buffer();
            Outbound::Ack(AckReply::ok("clearSampleBuffer"))
        }

        Command::PeekSamples { n_samples } => {
            let samples = session.peek_samples(n_samples);
            Outbound::Samples(samples.iter().map(StreamSample::from).collect())
        }

        Command::StopSampleBuffer => {
            Outbound::Ack(AckReply::status("stopSampleBuffer", session.stop_buffer()))
        }

        Command::SaveData => {
            let drained = session.consume_all();
            if !drained.is_empty() {
                warn!(
                    n_samples = drained.len(),
                    "saveData drained the buffer; durable persistence is not implemented"
                );
            }
            Outbound::SaveData(SaveDataReply::new(drained.len()))
        }

        Command::StoreMessage => Outbound::Error(ErrorReply::action_failed(
            "storeMessage",
            "message storage is not implemented",
        )),
    }
}

/// Map session errors onto the wire error taxonomy.
fn error_reply(err: SessionError) -> Outbound {
    match err {
        SessionError::Device { status, context } => {
            Outbound::DeviceError(DeviceErrorReply::new(status, context))
        }
        SessionError::NoCompatibleFrequency {
            pinned_base: Some(base),
        } => Outbound::Error(ErrorReply::invalid_param_with_base(
            "freq",
            "requested frequency is not a divisor of the set base frequency",
            base,
        )),
        SessionError::NoCompatibleFrequency { pinned_base: None } => {
            Outbound::Error(ErrorReply::invalid_param(
                "freq",
                "requested frequency is not a divisor of any supported sampling frequency",
            ))
        }
        SessionError::FrequencyNotConfigured => Outbound::Error(ErrorReply::action_failed(
            "startSampleStream",
            "You have to set the stream sample rate first using action setSampleStreamFreq. \
             NB: you also have to do this after calling setBaseSampleFreq.",
        )),
        SessionError::NotConnected => Outbound::Error(ErrorReply::action_failed(
            "startSampleBuffer",
            "you need to do the \"connect\" action first",
        )),
    }
}
