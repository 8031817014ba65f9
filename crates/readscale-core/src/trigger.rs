//! Invocation adapter — decodes inbound triggers into scaling commands.
//!
//! Two shapes are recognised:
//!
//! ```text
//! alarm notification   {"Records":[{"Sns":{"MessageId":..,"Message":"{\"ScalingType\":..,\"NumberReplicas\":2}"}}]}
//! timer event          {"source":"aws.events","detail-type":"Scheduled Event",..}
//! ```
//!
//! Every notification record yields one command. A timer event yields a
//! single command without an override. Anything else is unsupported.

use serde::Deserialize;

use crate::error::TriggerError;

/// A normalized request to run one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingCommand {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub scaling_type: Option<String>,
    /// One-shot replacement for the configured scheduled delta.
    pub replica_override: Option<i32>,
}

/// A decoded trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Alarm notification carrying one command per record.
    Notification(Vec<ScalingCommand>),
    /// Scheduled timer: run with configured settings as-is.
    Timer(ScalingCommand),
    /// Neither shape matched.
    Unsupported,
}

impl Trigger {
    /// Commands to execute, in order.
    pub fn commands(&self) -> Vec<ScalingCommand> {
        match self {
            Trigger::Notification(commands) => commands.clone(),
            Trigger::Timer(command) => vec![command.clone()],
            Trigger::Unsupported => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    #[serde(rename = "Sns")]
    sns: NotificationEntity,
}

#[derive(Debug, Deserialize)]
struct NotificationEntity {
    #[serde(rename = "MessageId", default)]
    message_id: Option<String>,
    #[serde(rename = "Subject", default)]
    subject: Option<String>,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TimerEvent {
    #[serde(default)]
    source: String,
}

/// Body of a notification record.
#[derive(Debug, Deserialize)]
struct ScalingMessage {
    #[serde(rename = "ScalingType", default)]
    scaling_type: Option<String>,
    #[serde(rename = "NumberReplicas", default)]
    number_replicas: Option<i32>,
}

/// Decode a raw JSON trigger payload.
pub fn decode(payload: &[u8]) -> Result<Trigger, TriggerError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;

    if let Ok(envelope) = serde_json::from_value::<NotificationEnvelope>(value.clone())
        && !envelope.records.is_empty()
    {
        let commands = envelope
            .records
            .into_iter()
            .map(|record| command_from_record(record.sns))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Trigger::Notification(commands));
    }

    if let Ok(event) = serde_json::from_value::<TimerEvent>(value)
        && !event.source.is_empty()
    {
        return Ok(Trigger::Timer(ScalingCommand::default()));
    }

    Ok(Trigger::Unsupported)
}

fn command_from_record(entity: NotificationEntity) -> Result<ScalingCommand, TriggerError> {
    let mut command = ScalingCommand {
        message_id: entity.message_id,
        subject: entity.subject,
        ..Default::default()
    };

    if entity.message.trim().is_empty() {
        return Ok(command);
    }

    let message: ScalingMessage =
        serde_json::from_str(&entity.message).map_err(|e| TriggerError::Message {
            message_id: command.message_id.clone().unwrap_or_default(),
            reason: e.to_string(),
        })?;
    command.scaling_type = message.scaling_type;
    command.replica_override = message.number_replicas;
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_notification_records() {
        let payload = br#"{
            "Records": [
                {"EventSource": "aws:sns", "Sns": {
                    "MessageId": "m-1",
                    "Subject": "scale",
                    "Message": "{\"ScalingType\":\"scheduled\",\"NumberReplicas\":3}"
                }},
                {"Sns": {"MessageId": "m-2", "Message": ""}}
            ]
        }"#;

        let trigger = decode(payload).unwrap();
        let commands = trigger.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].message_id.as_deref(), Some("m-1"));
        assert_eq!(commands[0].scaling_type.as_deref(), Some("scheduled"));
        assert_eq!(commands[0].replica_override, Some(3));
        assert_eq!(commands[1].replica_override, None);
    }

    #[test]
    fn decodes_timer_event() {
        let payload = br#"{"source":"aws.events","detail-type":"Scheduled Event","detail":{}}"#;
        assert_eq!(
            decode(payload).unwrap(),
            Trigger::Timer(ScalingCommand::default())
        );
    }

    #[test]
    fn unknown_shape_is_unsupported() {
        assert_eq!(decode(br#"{"hello":"world"}"#).unwrap(), Trigger::Unsupported);
        assert_eq!(decode(br#"{"Records":[]}"#).unwrap(), Trigger::Unsupported);
        assert!(decode(b"[1, 2]").unwrap().commands().is_empty());
    }

    #[test]
    fn malformed_message_is_an_error() {
        let payload = br#"{"Records":[{"Sns":{"MessageId":"m-9","Message":"not json"}}]}"#;
        match decode(payload) {
            Err(TriggerError::Message { message_id, .. }) => assert_eq!(message_id, "m-9"),
            other => panic!("expected message error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_payload_is_an_error() {
        assert!(matches!(decode(b"{{{"), Err(TriggerError::Payload(_))));
    }
}
