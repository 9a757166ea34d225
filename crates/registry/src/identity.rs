//! Icon identity shapes and their resolution order.

use uuid::Uuid;

use shelltray_protocol::{WindowHandle, WireMessage};

/// Ways an icon can be identified.
///
/// - `Stable`: owner-supplied GUID, survives handle changes.
/// - `Session`: window handle plus sub-id, valid for one process session.
/// - `Composite`: executable path, sub-id and title; only used to match
///   persisted pins across restarts, where handles are meaningless.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Stable(Uuid),
    Session { window: WindowHandle, sub_id: u32 },
    Composite { path: String, sub_id: u32, title: String },
}

impl Identity {
    /// Candidate identities of a datagram, in resolution order.
    pub fn candidates(message: &WireMessage) -> Vec<Identity> {
        Self::lookup_order(message.stable_id(), message.window, message.sub_id)
    }

    /// Candidate identities for a lookup by parts, in resolution order:
    /// stable id first, then session.
    pub fn lookup_order(stable: Option<Uuid>, window: WindowHandle, sub_id: u32) -> Vec<Identity> {
        let mut out = Vec::with_capacity(2);
        if let Some(guid) = stable {
            out.push(Identity::Stable(guid));
        }
        out.push(Identity::Session { window, sub_id });
        out
    }

    /// The string stored in the pin list for this identity, if it has one.
    pub fn pin_key(&self) -> Option<String> {
        match self {
            Identity::Stable(guid) => Some(stable_key(guid)),
            Identity::Composite {
                path,
                sub_id,
                title,
            } => Some(format!("{path}:{sub_id}:{title}")),
            Identity::Session { .. } => None,
        }
    }
}

/// Canonical pin-list spelling of a GUID.
pub fn stable_key(guid: &Uuid) -> String {
    guid.hyphenated().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_comes_first() {
        let guid = Uuid::from_u128(0xABCD);
        let msg = WireMessage::new(WindowHandle(5), 2).with_stable_id(guid);
        assert_eq!(
            Identity::candidates(&msg),
            vec![
                Identity::Stable(guid),
                Identity::Session {
                    window: WindowHandle(5),
                    sub_id: 2
                }
            ]
        );
    }

    #[test]
    fn session_only_without_guid() {
        let msg = WireMessage::new(WindowHandle(5), 2);
        assert_eq!(Identity::candidates(&msg).len(), 1);
    }

    #[test]
    fn pin_keys() {
        let guid = Uuid::parse_str("7820AE73-23E3-4229-82C1-E41CB67D5B9C").unwrap();
        assert_eq!(
            Identity::Stable(guid).pin_key().unwrap(),
            "7820ae73-23e3-4229-82c1-e41cb67d5b9c"
        );
        let composite = Identity::Composite {
            path: r"C:\Apps\mail.exe".into(),
            sub_id: 1,
            title: "Mail".into(),
        };
        assert_eq!(composite.pin_key().unwrap(), r"C:\Apps\mail.exe:1:Mail");
        assert_eq!(
            Identity::Session {
                window: WindowHandle(1),
                sub_id: 1
            }
            .pin_key(),
            None
        );
    }
}
