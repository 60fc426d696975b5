//! Notification composer — pure mapping from a request to message text.

use donorlink_core::types::{NotificationRecord, PushPayload, RequestEvent};

/// Title of every donation request notification.
pub const NOTIFICATION_TITLE: &str = "New Donation Request";

/// Stands in for a missing receiver name.
pub const RECEIVER_PLACEHOLDER: &str = "a receiver";

/// Compose `(title, message)` for a request.
pub fn compose(event: &RequestEvent) -> (String, String) {
    let receiver = event.receiver_name().unwrap_or(RECEIVER_PLACEHOLDER);
    let message = match event.item_name() {
        Some(item) => format!("{receiver} requested your donation: {item}"),
        None => format!("{receiver} requested your donation."),
    };
    (NOTIFICATION_TITLE.to_string(), message)
}

/// Notification record addressed to `donor_uid`, not yet written.
pub fn notification_record(
    event: &RequestEvent,
    donor_uid: &str,
    title: &str,
    message: &str,
) -> NotificationRecord {
    NotificationRecord {
        id: None,
        title: title.to_string(),
        message: message.to_string(),
        to_uid: donor_uid.to_string(),
        receiver_uid: event.receiver_uid.clone().unwrap_or_default(),
        request_id: event.request_id.clone(),
        timestamp: None,
    }
}

/// Push payload mirroring the in-app record.
pub fn push_payload(
    event: &RequestEvent,
    donor_uid: &str,
    title: &str,
    message: &str,
) -> PushPayload {
    let mut payload = PushPayload {
        title: title.to_string(),
        body: message.to_string(),
        data: Default::default(),
    };
    payload.data.insert("donorId".into(), donor_uid.to_string());
    payload.data.insert("requestId".into(), event.request_id.clone());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(receiver: Option<&str>, item: Option<&str>) -> RequestEvent {
        RequestEvent {
            request_id: "r1".into(),
            donor_uid: Some("d1".into()),
            receiver_name: receiver.map(String::from),
            receiver_uid: None,
            item_name: item.map(String::from),
        }
    }

    #[test]
    fn test_compose_full() {
        let (title, message) = compose(&event(Some("Alice"), Some("wheelchair")));
        assert_eq!(title, "New Donation Request");
        assert_eq!(message, "Alice requested your donation: wheelchair");
    }

    #[test]
    fn test_compose_placeholder_receiver() {
        let (_, message) = compose(&event(None, Some("crutches")));
        assert_eq!(message, "a receiver requested your donation: crutches");

        let (_, blank) = compose(&event(Some("  "), Some("crutches")));
        assert_eq!(blank, message);
    }

    #[test]
    fn test_compose_without_item() {
        let (_, message) = compose(&event(Some("Bob"), None));
        assert_eq!(message, "Bob requested your donation.");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let e = event(Some("Alice"), Some("walker"));
        assert_eq!(compose(&e), compose(&e.clone()));
    }

    #[test]
    fn test_payload_data() {
        let e = event(Some("Alice"), Some("walker"));
        let (title, message) = compose(&e);
        let payload = push_payload(&e, "d1", &title, &message);
        assert_eq!(payload.title, NOTIFICATION_TITLE);
        assert_eq!(payload.body, message);
        assert_eq!(payload.data["donorId"], "d1");
        assert_eq!(payload.data["requestId"], "r1");
    }

    #[test]
    fn test_record_defaults_receiver_uid() {
        let e = event(Some("Alice"), Some("walker"));
        let record = notification_record(&e, "d1", NOTIFICATION_TITLE, "m");
        assert_eq!(record.receiver_uid, "");
        assert_eq!(record.to_uid, "d1");
        assert_eq!(record.request_id, "r1");
    }
}
