fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use remotefs_protocol::messages::{
        DownloadParams, LookupParams, PortWriteParams, ReadParams, RefEvent, TransferParams,
    };
    use remotefs_protocol::{ErrorName, FileSystemInfo, Message, MessageType, Metadata};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Reads a fixture file as text.
    fn load_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values
    /// (order-independent).
    ///
    /// Parsing goes through the text so that raw payloads deserialize the
    /// same way they do off the socket.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let text = load_fixture(name);
        let fixture: serde_json::Value = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"));
        let parsed: T = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  peer:  {fixture}\n  agent: {reserialized}"
        );
        parsed
    }

    // --- Envelopes ---

    #[test]
    fn fixture_request_envelope() {
        let msg = roundtrip_test::<Message>("request_envelope.json");
        assert_eq!(msg.msg_type, MessageType::GetFile);
        let params: LookupParams = msg.parse_payload().unwrap().unwrap();
        assert_eq!(params.path, "report.txt");
        assert!(params.options.unwrap().create);
    }

    #[test]
    fn fixture_port_call() {
        let msg = roundtrip_test::<Message>("port_call.json");
        assert_eq!(msg.msg_type, MessageType::Write);
        assert!(msg.port.is_some());
        let params: PortWriteParams = msg.parse_payload().unwrap().unwrap();
        assert_eq!(params.data.as_deref(), Some("68656c6c6f"));
    }

    #[test]
    fn fixture_error_reply() {
        let msg = roundtrip_test::<Message>("error_reply.json");
        let err = msg.error.unwrap();
        assert_eq!(err.name, ErrorName::NotSupported);
        assert_eq!(err.code, ErrorName::NotSupported.code());
    }

    #[test]
    fn fixture_ref_event() {
        let msg = roundtrip_test::<Message>("ref_event.json");
        let event: RefEvent = msg.parse_payload().unwrap().unwrap();
        assert_eq!(event.port.len(), 36);
    }

    // --- Payloads ---

    #[test]
    fn fixture_file_system_info() {
        let info = roundtrip_test::<FileSystemInfo>("file_system_info.json");
        assert_eq!(info.fs_type, "local");
        assert_eq!(info.root.full_path, "/");
    }

    #[test]
    fn fixture_metadata() {
        let meta = roundtrip_test::<Metadata>("metadata.json");
        assert_eq!(meta.size, 4096);
    }

    #[test]
    fn fixture_transfer_params() {
        let params = roundtrip_test::<TransferParams>("transfer_params.json");
        assert_eq!(params.new_name.as_deref(), Some("b.txt"));
    }

    #[test]
    fn fixture_read_params() {
        let params = roundtrip_test::<ReadParams>("read_params.json");
        assert!(params.options.autopause);
        assert_eq!(params.options.start, Some(1024));
        assert_eq!(params.options.end, Some(2047));
    }

    #[test]
    fn fixture_download_params() {
        let params = roundtrip_test::<DownloadParams>("download_params.json");
        assert!(params.link.href.starts_with("https://"));
    }

    // --- Lenient decoding ---

    #[test]
    fn read_params_without_options() {
        let json = r#"{"entry":{"isFile":true,"isDirectory":false,"name":"a","fullPath":"/a"}}"#;
        let params: ReadParams = serde_json::from_str(json).unwrap();
        assert!(!params.options.autopause);
        assert!(params.options.start.is_none());
    }

    #[test]
    fn unknown_message_type_still_parses() {
        let json = r#"{"id":"1","type":"createWriter","payload":{}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.msg_type, MessageType::Unknown);
    }

    #[test]
    fn unknown_error_name_is_preserved_as_unknown() {
        let json = r#"{"id":"1","type":"error","error":{"code":500,"name":"WeirdError"}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.error.unwrap().name, ErrorName::Unknown);
    }
}
