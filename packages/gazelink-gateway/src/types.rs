use etrack_rs::{GazeSample, TrackerInfo, TrackerStatus};
use serde::Serialize;
use serde_json::Value;

/// Inbound commands, one per WebSocket text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    SetSampleStreamFreq { freq: f32 },
    StartSampleStream,
    StopSampleStream,
    SetBaseSampleFreq { freq: f32 },
    StartSampleBuffer,
    ClearSampleBuffer,
    PeekSamples { n_samples: Option<usize> },
    StopSampleBuffer,
    SaveData,
    StoreMessage,
}

/// Parse one inbound frame into a command.
///
/// The string-to-variant mapping lives here and nowhere else; everything past
/// this boundary works with the closed `Command` enum. Parsing is staged so
/// the protocol's distinct error shapes (invalid JSON, missing action,
/// unknown action, missing/invalid parameter) stay distinguishable.
pub fn parse_command(text: &str) -> Result<Command, ErrorReply> {
    let value: Value = serde_json::from_str(text).map_err(|_| ErrorReply::invalid_json())?;
    if value.is_null() {
        return Err(ErrorReply::invalid_json());
    }

    let action = match value.get("action") {
        Some(action) => action,
        None => return Err(ErrorReply::missing_param("action")),
    };
    let action_str = match action.as_str() {
        Some(s) => s,
        None => return Err(ErrorReply::unrecognized_action(action.clone())),
    };

    match action_str {
        "connect" => Ok(Command::Connect),
        "setSampleStreamFreq" => Ok(Command::SetSampleStreamFreq {
            freq: required_freq(&value)?,
        }),
        "startSampleStream" => Ok(Command::StartSampleStream),
        "stopSampleStream" => Ok(Command::StopSampleStream),
        // historical capitalization, kept for wire compatibility
        "SetBaseSampleFreq" => Ok(Command::SetBaseSampleFreq {
            freq: required_freq(&value)?,
        }),
        "startSampleBuffer" => Ok(Command::StartSampleBuffer),
        "clearSampleBuffer" => Ok(Command::ClearSampleBuffer),
        "peekSamples" => Ok(Command::PeekSamples {
            n_samples: optional_n_samples(&value)?,
        }),
        "stopSampleBuffer" => Ok(Command::StopSampleBuffer),
        "saveData" => Ok(Command::SaveData),
        "storeMessage" => Ok(Command::StoreMessage),
        _ => Err(ErrorReply::unrecognized_action(action.clone())),
    }
}

fn required_freq(value: &Value) -> Result<f32, ErrorReply> {
    match value.get("freq") {
        None => Err(ErrorReply::missing_param("freq")),
        Some(freq) => freq
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| ErrorReply::invalid_param("freq", "must be a number")),
    }
}

fn optional_n_samples(value: &Value) -> Result<Option<usize>, ErrorReply> {
    match value.get("nSamples") {
        None => Ok(None),
        Some(n) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| ErrorReply::invalid_param("nSamples", "must be a non-negative integer")),
    }
}

// === Outbound messages ===

/// Everything the gateway can put on the wire in reply to a command.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Connect(ConnectReply),
    SetSampleFreq(SetSampleFreqReply),
    Ack(AckReply),
    SaveData(SaveDataReply),
    Samples(Vec<StreamSample>),
    Error(ErrorReply),
    DeviceError(DeviceErrorReply),
}

/// Reply to a successful connect
#[derive(Debug, Serialize)]
pub struct ConnectReply {
    action: &'static str,
    #[serde(rename = "deviceModel")]
    device_model: String,
    #[serde(rename = "serialNumber")]
    serial_number: String,
    address: String,
}

impl ConnectReply {
    pub fn new(info: TrackerInfo) -> Self {
        Self {
            action: "connect",
            device_model: info.model,
            serial_number: info.serial_number,
            address: info.address,
        }
    }
}

/// Reply to setSampleStreamFreq and SetBaseSampleFreq; both answer with
/// action "setSampleFreq", only the negotiated form carries baseFreq.
#[derive(Debug, Serialize)]
pub struct SetSampleFreqReply {
    action: &'static str,
    freq: f32,
    #[serde(rename = "baseFreq", skip_serializing_if = "Option::is_none")]
    base_freq: Option<f32>,
    status: bool,
}

impl SetSampleFreqReply {
    pub fn negotiated(achieved: f32, base: f32) -> Self {
        Self {
            action: "setSampleFreq",
            freq: achieved,
            base_freq: Some(base),
            status: true,
        }
    }

    pub fn pinned(freq: f32) -> Self {
        Self {
            action: "setSampleFreq",
            freq,
            base_freq: None,
            status: true,
        }
    }
}

/// Plain `{action, status}` acknowledgement
#[derive(Debug, Serialize)]
pub struct AckReply {
    action: &'static str,
    status: bool,
}

impl AckReply {
    pub fn ok(action: &'static str) -> Self {
        Self {
            action,
            status: true,
        }
    }

    pub fn status(action: &'static str, status: bool) -> Self {
        Self { action, status }
    }
}

/// Reply to saveData: how many samples were drained
#[derive(Debug, Serialize)]
pub struct SaveDataReply {
    action: &'static str,
    status: bool,
    #[serde(rename = "nSamples")]
    n_samples: usize,
}

impl SaveDataReply {
    pub fn new(n_samples: usize) -> Self {
        Self {
            action: "saveData",
            status: true,
            n_samples,
        }
    }
}

/// Protocol and state-precondition errors
#[derive(Debug, Serialize)]
pub struct ErrorReply {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(rename = "baseFreq", skip_serializing_if = "Option::is_none")]
    base_freq: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<Value>,
}

impl ErrorReply {
    fn bare(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            param: None,
            reason: None,
            base_freq: None,
            action: None,
        }
    }

    pub fn invalid_json() -> Self {
        Self::bare("invalidJson")
    }

    pub fn missing_param(param: &'static str) -> Self {
        Self {
            param: Some(param),
            ..Self::bare("jsonMissingParam")
        }
    }

    pub fn unrecognized_action(action: Value) -> Self {
        Self {
            action: Some(action),
            ..Self::bare("Unrecognized action")
        }
    }

    pub fn invalid_param(param: &'static str, reason: impl Into<String>) -> Self {
        Self {
            param: Some(param),
            reason: Some(reason.into()),
            ..Self::bare("invalidParam")
        }
    }

    pub fn invalid_param_with_base(
        param: &'static str,
        reason: impl Into<String>,
        base_freq: f32,
    ) -> Self {
        Self {
            base_freq: Some(base_freq),
            ..Self::invalid_param(param, reason)
        }
    }

    /// Action-scoped failure: the error code is the action name, the reason
    /// tells the caller what to do about it.
    pub fn action_failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::bare(action)
        }
    }
}

/// Device-level error, carrying the underlying status code, its symbolic
/// name and a human explanation. Key spellings are wire-compatible with
/// existing clients.
#[derive(Debug, Serialize)]
pub struct DeviceErrorReply {
    error: String,
    #[serde(rename = "TobiiErrorCode")]
    code: i32,
    #[serde(rename = "TobiiErrorString")]
    symbol: &'static str,
    #[serde(rename = "TobiiErrorExplanation")]
    explanation: &'static str,
}

impl DeviceErrorReply {
    pub fn new(status: TrackerStatus, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: status.code(),
            symbol: status.symbol(),
            explanation: status.explanation(),
        }
    }
}

/// Gaze sample as sent on the wire, broadcast to every client and returned
/// by peekSamples.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreamSample {
    pub ts: i64,
    pub x: f32,
    pub y: f32,
}

impl From<&GazeSample> for StreamSample {
    /// One eye invalid: use the other eye unmodified. Both valid: average.
    /// Both invalid: NaN propagates (serialized as null).
    fn from(sample: &GazeSample) -> Self {
        let (x, y) = if !sample.left.valid {
            (sample.right.x, sample.right.y)
        } else if !sample.right.valid {
            (sample.left.x, sample.left.y)
        } else {
            (
                (sample.left.x + sample.right.x) / 2.0,
                (sample.left.y + sample.right.y) / 2.0,
            )
        };
        Self {
            ts: sample.system_time_us,
            x,
            y,
        }
    }
}
