//! Event emission and the bounded log.

use contracts::EventDraft;
use serde_json::Value;

use super::*;

impl WorldState {
    /// Stamps and appends one event. Sequence numbers restart at zero each
    /// tick; ordering within a tick is the ordering of emission.
    pub fn push_event(
        &mut self,
        kind: EventKind,
        room_id: impl Into<String>,
        device_id: Option<String>,
        data: Option<Value>,
    ) {
        let tick = self.status.current_tick;
        let sequence = self.sequence_in_tick;
        self.sequence_in_tick += 1;
        self.event_log.push(Event {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.status.run_id.clone(),
            tick,
            sequence_in_tick: sequence,
            event_id: format!("ev_{tick:06}_{sequence:03}"),
            at_secs: self.world_secs(),
            kind,
            room_id: room_id.into(),
            device_id,
            data,
        });
    }

    pub fn push_draft(&mut self, draft: EventDraft) {
        self.push_event(draft.kind, draft.room_id, draft.device_id, draft.data);
    }

    /// Agent-to-agent mail travels through the log; `to` may be `*` for a
    /// broadcast.
    pub fn append_message_event(&mut self, from: &str, to: &str, content: &str) {
        let room_id = self
            .agents
            .get(from)
            .map(|agent| agent.room_id.clone())
            .unwrap_or_default();
        self.push_event(
            EventKind::AgentMessage,
            room_id,
            Some(from.to_string()),
            Some(serde_json::json!({
                "from": from,
                "to": to,
                "content": content,
            })),
        );
    }

    /// Once the log exceeds `event_log_max`, keep only the most recent
    /// `event_log_retain` entries, oldest first.
    pub fn trim_event_log(&mut self) {
        if self.event_log.len() > self.config.event_log_max {
            let drop = self.event_log.len() - self.config.event_log_retain;
            self.event_log.drain(..drop);
        }
    }
}
