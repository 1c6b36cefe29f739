fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use oncostage_protocol::{
        ApiErrorBody, ChunkAck, FileCategory, FinalizeRequest, FinalizeResponse,
        OpenSessionRequest, OpenSessionResponse,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_open_session_request() {
        let req: OpenSessionRequest = roundtrip_test("open_session_request.json");
        assert_eq!(req.category, FileCategory::Pathology);
        assert_eq!(req.chunk_count, 3);
        assert!(req.digest.is_none());
    }

    #[test]
    fn fixture_open_session_request_prehashed() {
        let req: OpenSessionRequest = roundtrip_test("open_session_request_prehashed.json");
        assert_eq!(req.total_size, 0);
        assert_eq!(req.chunk_count, 1);
        assert!(req.uploader.is_empty());
        assert_eq!(
            req.digest.as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
    }

    #[test]
    fn fixture_open_session_response() {
        let resp: OpenSessionResponse = roundtrip_test("open_session_response.json");
        assert!(resp.existing_file_id.is_none());

        let resp: OpenSessionResponse = roundtrip_test("open_session_response_existing.json");
        assert_eq!(resp.existing_file_id.as_deref(), Some("file_7731"));
    }

    #[test]
    fn fixture_chunk_ack() {
        let ack: ChunkAck = roundtrip_test("chunk_ack.json");
        assert_eq!(ack.index, 2);
        assert_eq!(ack.received_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn fixture_finalize() {
        let req: FinalizeRequest = roundtrip_test("finalize_request.json");
        assert!(req.digest.is_some());
        let resp: FinalizeResponse = roundtrip_test("finalize_response.json");
        assert_eq!(resp.file_id, "file_7732");
    }

    #[test]
    fn fixture_api_error() {
        let err: ApiErrorBody = roundtrip_test("api_error.json");
        assert_eq!(err.code, "session_expired");
    }

    #[test]
    fn category_wire_strings() {
        let names: Vec<String> = FileCategory::ALL
            .iter()
            .map(|c| serde_json::to_value(c).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["pathology", "radiology", "clinical", "genomic"]);
    }

    #[test]
    fn unknown_category_rejected() {
        let mut fixture = load_fixture("open_session_request.json");
        fixture["category"] = serde_json::json!("dermatology");
        assert!(serde_json::from_value::<OpenSessionRequest>(fixture).is_err());
    }

    #[test]
    fn empty_finalize_request_is_empty_object() {
        let json = serde_json::to_string(&FinalizeRequest::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
