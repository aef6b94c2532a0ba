//! Verify parsing and request building against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Each vector file describes inputs and expected outcomes. Expected trees
//! are compared as parsed values (not raw strings) so key order in the
//! vector file never causes false negatives; only `minified` is compared
//! textually, because minify must keep the input's order.

use restnodes_core::{json, HttpMethod, Message, Value};

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &serde_json::Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn expected_tree(value: &serde_json::Value) -> Value {
    json::parse(&serde_json::to_string(value).unwrap()).unwrap()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[test]
fn json_test_vectors() {
    let raw = include_str!("../../test-vectors/json.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].as_str().unwrap();
        let strict = case["strict"].as_bool().unwrap();
        let smart = case["smart"].as_bool().unwrap();

        assert_eq!(json::is_valid_json(input), strict, "{name}: strict validity");
        assert_eq!(json::try_parse(input).success, strict, "{name}: try_parse");

        if strict {
            assert_eq!(json::minify(input), case["minified"].as_str().unwrap(), "{name}: minify");
            let expected = expected_tree(&case["value"]);
            assert_eq!(json::parse(input).unwrap(), expected, "{name}: strict tree");
        } else {
            assert_eq!(json::minify(input), input, "{name}: minify fails open");
            assert_eq!(json::format(input), input, "{name}: format fails open");
        }

        let parsed = json::parse_smart(input);
        assert_eq!(parsed.is_ok(), smart, "{name}: smart validity");
        if smart {
            let expected = expected_tree(&case["value"]);
            assert_eq!(parsed.unwrap(), expected, "{name}: smart tree");
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

fn message_from(input: &serde_json::Value) -> Message {
    let method = parse_method(input["method"].as_str().unwrap());
    let mut msg = Message::new(input["address"].as_str().unwrap()).method(method);
    for (name, value) in pairs(&input["headers"]) {
        msg = msg.header(&name, &value);
    }
    for (name, value) in pairs(&input["query"]) {
        msg = msg.query(&name, &value);
    }

    let body = &input["body"];
    match body["kind"].as_str() {
        None => msg,
        Some("json") => msg.json_text(body["content"].as_str().unwrap()),
        Some("text") => msg.text(
            body["content"].as_str().unwrap(),
            body["media_type"].as_str().unwrap(),
        ),
        Some(other) => panic!("unknown body kind: {other}"),
    }
}

#[test]
fn message_test_vectors() {
    let raw = include_str!("../../test-vectors/messages.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();
    let base_url = vectors["base_url"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected_request"];

        let req = message_from(&case["input"]).build(Some(base_url)).unwrap();
        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(req.headers, pairs(&expected["headers"]), "{name}: envelope headers");

        match (&req.body, expected["body"].is_null()) {
            (None, true) => {}
            (Some(body), false) => {
                assert_eq!(body.headers, pairs(&expected["body"]["headers"]), "{name}: content headers");
                assert_eq!(
                    body.bytes,
                    expected["body"]["content"].as_str().unwrap().as_bytes(),
                    "{name}: body"
                );
            }
            (got, _) => panic!("{name}: unexpected body {got:?}"),
        }
    }
}
