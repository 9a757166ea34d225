fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::time::Duration;

    use serde::Deserialize;
    use shelltray_protocol::placement::PLACEMENT_QUERY_SIZE;
    use shelltray_protocol::wire::TRAY_DATA_SIZE;
    use shelltray_protocol::{
        IconDatagram, MessageKind, PlacementQuery, Point, Rect, WindowHandle, WireMessage,
    };
    use shelltray_registry::{
        ApplyOutcome, IconHost, IconRegistry, MemoryPinStore, MouseButton, NotifyMessage,
        PointerEvent,
    };
    use uuid::Uuid;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads and deserializes a fixture file.
    fn load_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// One value written at a byte offset of a payload.
    #[derive(Debug, Deserialize)]
    struct Field {
        offset: usize,
        #[serde(rename = "u32")]
        word: Option<u32>,
        utf16: Option<String>,
        guid: Option<String>,
    }

    /// Lays fields out by offset, independently of the crate's encoder.
    fn build_payload(size: usize, fields: &[Field]) -> Vec<u8> {
        let mut buf = vec![0u8; size];
        for field in fields {
            let at = field.offset;
            if let Some(word) = field.word {
                buf[at..at + 4].copy_from_slice(&word.to_le_bytes());
            }
            if let Some(text) = &field.utf16 {
                for (i, unit) in text.encode_utf16().enumerate() {
                    buf[at + i * 2..at + i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
                }
            }
            if let Some(guid) = &field.guid {
                let guid = Uuid::parse_str(guid).unwrap();
                buf[at..at + 16].copy_from_slice(&guid.to_bytes_le());
            }
        }
        buf
    }

    fn rect(r: [i32; 4]) -> Rect {
        Rect {
            left: r[0],
            top: r[1],
            right: r[2],
            bottom: r[3],
        }
    }

    #[derive(Default)]
    struct Recorded {
        posted: Vec<NotifyMessage>,
    }

    #[derive(Clone, Default)]
    struct RecordingHost(Rc<RefCell<Recorded>>);

    impl IconHost for RecordingHost {
        fn is_window(&self, window: WindowHandle) -> bool {
            !window.is_null()
        }

        fn post_notify(&self, message: &NotifyMessage) -> bool {
            self.0.borrow_mut().posted.push(*message);
            true
        }
    }

    fn registry() -> (IconRegistry, RecordingHost) {
        let host = RecordingHost::default();
        let registry = IconRegistry::new(
            Box::new(host.clone()),
            Box::new(MemoryPinStore::default()),
        );
        (registry, host)
    }

    // --- Inbound systray datagrams ---

    #[derive(Debug, Deserialize)]
    struct DatagramCase {
        name: String,
        #[serde(default = "full_datagram")]
        size: usize,
        fields: Vec<Field>,
        #[serde(default)]
        rejected: bool,
        expect: Option<DatagramExpect>,
    }

    fn full_datagram() -> usize {
        TRAY_DATA_SIZE
    }

    #[derive(Debug, Deserialize)]
    struct DatagramExpect {
        kind: u32,
        window: u64,
        sub_id: u32,
        callback_message: Option<u32>,
        tooltip: Option<String>,
        hidden: Option<bool>,
        stable_id: Option<String>,
        balloon_title: Option<String>,
        balloon_text: Option<String>,
        version: Option<u32>,
    }

    #[test]
    fn systray_datagram_layout() {
        let cases: Vec<DatagramCase> = load_fixture("systray_datagrams.json");
        assert!(!cases.is_empty());

        for case in &cases {
            let payload = build_payload(case.size, &case.fields);
            let decoded = IconDatagram::decode(&payload);

            if case.rejected {
                assert!(decoded.is_err(), "{}: expected rejection", case.name);
                continue;
            }
            let datagram = decoded.unwrap_or_else(|e| panic!("{}: {e}", case.name));
            let expect = case.expect.as_ref().unwrap();
            let m = &datagram.message;

            assert_eq!(datagram.kind.code(), expect.kind, "{}: kind", case.name);
            assert_eq!(m.window, WindowHandle(expect.window), "{}: window", case.name);
            assert_eq!(m.sub_id, expect.sub_id, "{}: sub_id", case.name);
            assert_eq!(
                m.callback_message(),
                expect.callback_message,
                "{}: callback",
                case.name
            );
            assert_eq!(
                m.tooltip(),
                expect.tooltip.as_deref(),
                "{}: tooltip",
                case.name
            );
            assert_eq!(m.hidden(), expect.hidden, "{}: hidden", case.name);
            assert_eq!(
                m.stable_id(),
                expect.stable_id.as_deref().map(|s| Uuid::parse_str(s).unwrap()),
                "{}: stable id",
                case.name
            );
            let balloon = m.balloon();
            assert_eq!(
                balloon.as_ref().map(|b| b.title.as_str()),
                expect.balloon_title.as_deref(),
                "{}: balloon title",
                case.name
            );
            assert_eq!(
                balloon.as_ref().map(|b| b.text.as_str()),
                expect.balloon_text.as_deref(),
                "{}: balloon text",
                case.name
            );
            if let Some(version) = expect.version {
                assert_eq!(m.version(), version, "{}: version", case.name);
            }
        }
    }

    #[test]
    fn encoder_matches_fixture_layout() {
        let cases: Vec<DatagramCase> = load_fixture("systray_datagrams.json");
        let case = cases
            .iter()
            .find(|c| c.name == "add_with_tooltip")
            .unwrap();
        let expected = build_payload(case.size, &case.fields);

        let message = WireMessage::new(WindowHandle(256), 1)
            .with_callback_message(32769)
            .with_tooltip("Mail");
        let encoded = IconDatagram {
            kind: MessageKind::Add,
            message,
        }
        .encode();
        assert_eq!(encoded, expected);
    }

    // --- Outbound callback messages ---

    #[derive(Debug, Deserialize)]
    struct OutboundCase {
        name: String,
        version: u32,
        sub_id: u32,
        cursor: [i32; 2],
        events: Vec<String>,
        expect: Vec<OutboundExpect>,
    }

    #[derive(Debug, Deserialize)]
    struct OutboundExpect {
        message: u32,
        wparam: usize,
        lparam: isize,
    }

    fn pointer_event(name: &str) -> PointerEvent {
        match name {
            "left_down" => PointerEvent::ButtonDown(MouseButton::Left),
            "left_up" => PointerEvent::ButtonUp(MouseButton::Left),
            "right_down" => PointerEvent::ButtonDown(MouseButton::Right),
            "right_up" => PointerEvent::ButtonUp(MouseButton::Right),
            "move" => PointerEvent::Move,
            "hover_enter" => PointerEvent::HoverEnter,
            "hover_leave" => PointerEvent::HoverLeave,
            other => panic!("unknown pointer event {other}"),
        }
    }

    #[test]
    fn outbound_encoding_by_version() {
        const OWNER: WindowHandle = WindowHandle(0x100);
        const CALLBACK: u32 = 32769;

        let cases: Vec<OutboundCase> = load_fixture("outbound_messages.json");
        assert!(!cases.is_empty());

        for case in &cases {
            let (mut registry, host) = registry();
            let add = WireMessage::new(OWNER, case.sub_id).with_callback_message(CALLBACK);
            let key = match registry.apply(MessageKind::Add, &add).unwrap() {
                ApplyOutcome::Added(key) => key,
                other => panic!("{}: unexpected {other:?}", case.name),
            };
            registry
                .apply(
                    MessageKind::SetVersion,
                    &WireMessage::new(OWNER, case.sub_id).with_version(case.version),
                )
                .unwrap();

            let cursor = Point {
                x: case.cursor[0],
                y: case.cursor[1],
            };
            for event in &case.events {
                registry.dispatch_pointer(
                    key,
                    pointer_event(event),
                    cursor,
                    Duration::from_millis(500),
                );
            }

            let posted: Vec<(u32, usize, isize)> = host
                .0
                .borrow()
                .posted
                .iter()
                .map(|m| {
                    assert_eq!(m.window, OWNER, "{}: target window", case.name);
                    (m.message, m.wparam, m.lparam)
                })
                .collect();
            let expected: Vec<(u32, usize, isize)> = case
                .expect
                .iter()
                .map(|e| (e.message, e.wparam, e.lparam))
                .collect();
            assert_eq!(posted, expected, "{}", case.name);
        }
    }

    // --- Placement queries ---

    #[derive(Debug, Deserialize)]
    struct PlacementFixture {
        icon: PlacedIcon,
        host_rect: [i32; 4],
        cases: Vec<PlacementCase>,
    }

    #[derive(Debug, Deserialize)]
    struct PlacedIcon {
        window: u64,
        sub_id: u32,
        rect: [i32; 4],
    }

    #[derive(Debug, Deserialize)]
    struct PlacementCase {
        name: String,
        fields: Vec<Field>,
        reply: u32,
    }

    #[test]
    fn placement_query_replies() {
        let fixture: PlacementFixture = load_fixture("placement_queries.json");
        let (mut registry, _host) = registry();
        registry.set_default_placement(rect(fixture.host_rect));

        let add = WireMessage::new(WindowHandle(fixture.icon.window), fixture.icon.sub_id);
        let key = match registry.apply(MessageKind::Add, &add).unwrap() {
            ApplyOutcome::Added(key) => key,
            other => panic!("unexpected {other:?}"),
        };
        registry.set_placement(key, rect(fixture.icon.rect)).unwrap();

        for case in &fixture.cases {
            let payload = build_payload(PLACEMENT_QUERY_SIZE, &case.fields);
            let query = PlacementQuery::decode(&payload)
                .unwrap_or_else(|e| panic!("{}: {e}", case.name));
            let reply = registry
                .resolve_placement(query.stable_id(), query.window, query.sub_id)
                .map(|r| query.corner.reply(&r))
                .unwrap_or(0);
            assert_eq!(reply, case.reply, "{}", case.name);
        }
    }
}
