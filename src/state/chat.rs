//! Optimistic chat transcript edits.
//!
//! DESIGN
//! ======
//! A send inserts two local entries (the user's message and a pending
//! assistant placeholder) before the request goes out. Confirm and rollback
//! find those entries by their optimistic ids, never by content, so a
//! transcript that was rebuilt from the server in the meantime is handled the
//! same way as an untouched one.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use crate::net::types::{AlertId, ChatReply, ChatRole};
use crate::state::alerts::{AlertDetail, ChatMessage, MessageId};

/// The optimistic entries inserted for one outgoing message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingSend {
    pub alert_id: AlertId,
    pub user_id: MessageId,
    pub placeholder_id: MessageId,
}

/// Trim `text`, returning `None` when nothing is left to send.
#[must_use]
pub fn arm(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Append the user's message and a pending assistant placeholder.
///
/// The caller checks [`AlertDetail::has_pending_reply`] first; only one send
/// may be in flight per detail.
pub fn insert_optimistic(detail: &mut AlertDetail, text: &str, now: &str) -> PendingSend {
    let send = PendingSend {
        alert_id: detail.id,
        user_id: MessageId::optimistic(),
        placeholder_id: MessageId::optimistic(),
    };
    detail.chat_messages.push(ChatMessage {
        id: send.user_id,
        alert_id: detail.id,
        role: ChatRole::User,
        content: text.to_owned(),
        created_at: now.to_owned(),
        pending: false,
    });
    detail.chat_messages.push(ChatMessage {
        id: send.placeholder_id,
        alert_id: detail.id,
        role: ChatRole::Assistant,
        content: String::new(),
        created_at: now.to_owned(),
        pending: true,
    });
    send
}

/// Replace the placeholder of `send` with the server's reply.
///
/// Returns `false` (and changes nothing) when the placeholder is no longer in
/// `detail`, e.g. because another alert became resident. When the transcript
/// already holds the confirmed reply (a refetch delivered it first), the
/// optimistic user entry is dropped too, since the server copy is present.
pub fn confirm(detail: &mut AlertDetail, send: &PendingSend, reply: ChatReply, now: &str) -> bool {
    if detail.id != send.alert_id {
        return false;
    }
    let Some(pos) = detail
        .chat_messages
        .iter()
        .position(|msg| msg.id == send.placeholder_id)
    else {
        return false;
    };
    detail.chat_messages.remove(pos);

    if detail.contains_confirmed(reply.message_id) {
        detail.chat_messages.retain(|msg| msg.id != send.user_id);
        return true;
    }

    detail.chat_messages.push(ChatMessage {
        id: MessageId::Confirmed(reply.message_id),
        alert_id: send.alert_id,
        role: ChatRole::Assistant,
        content: reply.response,
        created_at: now.to_owned(),
        pending: false,
    });
    true
}

/// Remove both optimistic entries of `send`. Returns whether anything was removed.
pub fn rollback(detail: &mut AlertDetail, send: &PendingSend) -> bool {
    if detail.id != send.alert_id {
        return false;
    }
    let before = detail.chat_messages.len();
    detail
        .chat_messages
        .retain(|msg| msg.id != send.user_id && msg.id != send.placeholder_id);
    detail.chat_messages.len() != before
}

/// Re-append the optimistic entries of `previous` onto a freshly fetched
/// `next` for the same alert.
///
/// The server persists the user's message before it answers, so a refetch
/// mid-send may already hold it. An optimistic entry whose role and content
/// match a confirmed message that `previous` did not have is dropped in
/// favour of the server copy. The pending placeholder is always carried.
pub fn carry_transient(previous: &AlertDetail, next: &mut AlertDetail) {
    if previous.id != next.id {
        return;
    }
    let persisted: Vec<&ChatMessage> = next
        .chat_messages
        .iter()
        .filter(|msg| match msg.id {
            MessageId::Confirmed(id) => !previous.contains_confirmed(id),
            MessageId::Optimistic(_) => false,
        })
        .collect();
    let carried: Vec<ChatMessage> = previous
        .chat_messages
        .iter()
        .filter(|msg| msg.is_transient())
        .filter(|msg| {
            msg.pending
                || !persisted
                    .iter()
                    .any(|server| server.role == msg.role && server.content == msg.content)
        })
        .cloned()
        .collect();
    next.chat_messages.extend(carried);
}
