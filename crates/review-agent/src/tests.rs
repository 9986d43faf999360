/// Decoding tests for `StreamEvent` using representative stream-json lines
/// captured from the agent CLI.
#[cfg(test)]
mod unit {
    use crate::types::{ContentBlock, StreamEvent, ToolResultContent, UserBlock, UserContent};

    fn parse(json: &str) -> StreamEvent {
        serde_json::from_str(json).expect("failed to parse event")
    }

    #[test]
    fn parse_full_assistant_message() {
        let json = r#"{
            "type": "assistant",
            "session_id": "abc-123",
            "parent_tool_use_id": null,
            "message": {
                "id": "msg_abc",
                "role": "assistant",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "Let me read the comments."},
                    {"type": "tool_use", "id": "tu_1", "name": "Bash", "input": {"command": "just comments acme/repo 42", "description": "read"}}
                ],
                "model": "claude-sonnet-4-6",
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 100, "output_tokens": 50}
            }
        }"#;
        let StreamEvent::Assistant(asst) = parse(json) else {
            panic!("expected Assistant")
        };
        let blocks = &asst.message.content;
        assert_eq!(blocks.len(), 3);
        assert!(matches!(blocks[0], ContentBlock::Other));
        assert!(matches!(&blocks[1], ContentBlock::Text { text } if text.starts_with("Let me")));
        assert_eq!(blocks[2].shell_command(), Some("just comments acme/repo 42"));
    }

    #[test]
    fn parse_tool_result_string_content() {
        let json = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"tu_1","content":"3 comments"}]}}"#;
        let StreamEvent::User(user) = parse(json) else {
            panic!("expected User")
        };
        let UserBlock::ToolResult { content, is_error } = &user.message.content.blocks()[0] else {
            panic!("expected ToolResult")
        };
        assert_eq!(content.as_ref().unwrap().to_text(), "3 comments");
        assert_eq!(*is_error, None);
    }

    #[test]
    fn parse_tool_result_block_list_content() {
        let json = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"tu_1","is_error":true,"content":[{"type":"text","text":"exit 1"},{"type":"image"},{"type":"text","text":"bad recipe"}]}]}}"#;
        let StreamEvent::User(user) = parse(json) else {
            panic!("expected User")
        };
        let UserBlock::ToolResult { content, is_error } = &user.message.content.blocks()[0] else {
            panic!("expected ToolResult")
        };
        // Missing text contributes an empty segment.
        assert_eq!(content.as_ref().unwrap().to_text(), "exit 1  bad recipe");
        assert_eq!(*is_error, Some(true));
    }

    #[test]
    fn parse_tool_result_null_content() {
        let json = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"tu_1","content":null}]}}"#;
        let StreamEvent::User(user) = parse(json) else {
            panic!("expected User")
        };
        assert!(matches!(
            &user.message.content.blocks()[0],
            UserBlock::ToolResult { content: None, .. }
        ));
    }

    #[test]
    fn parse_user_prompt_as_plain_string() {
        let json = r#"{"type":"user","message":{"role":"user","content":"hello"}}"#;
        let StreamEvent::User(user) = parse(json) else {
            panic!("expected User")
        };
        assert!(matches!(user.message.content, UserContent::Text(_)));
        assert!(user.message.content.blocks().is_empty());
    }

    #[test]
    fn tool_result_content_normalises_both_shapes() {
        let text: ToolResultContent = serde_json::from_str(r#""plain""#).unwrap();
        let blocks: ToolResultContent =
            serde_json::from_str(r#"[{"type":"text","text":"a"},{"type":"text","text":"b"}]"#)
                .unwrap();
        assert_eq!(text.to_text(), "plain");
        assert_eq!(blocks.to_text(), "a b");
    }

    #[test]
    fn parse_result_success() {
        let json = r#"{
            "type": "result",
            "subtype": "success",
            "session_id": "abc-123",
            "result": "Review posted.",
            "duration_ms": 5000,
            "duration_api_ms": 4800,
            "is_error": false,
            "num_turns": 3,
            "total_cost_usd": 0.0042,
            "usage": {"input_tokens": 1200, "output_tokens": 400},
            "permission_denials": []
        }"#;
        let event = parse(json);
        let r = event.as_result().expect("expected Result");
        assert!(!r.is_error());
        assert_eq!(r.subtype.as_deref(), Some("success"));
        assert_eq!(r.num_turns, Some(3));
        assert!((r.total_cost_usd.unwrap() - 0.0042).abs() < f64::EPSILON);
        assert!((r.duration_secs() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_result_error_max_turns() {
        let json = r#"{
            "type": "result",
            "subtype": "error_max_turns",
            "is_error": true,
            "num_turns": 10,
            "total_cost_usd": 0.02
        }"#;
        let event = parse(json);
        let r = event.as_result().unwrap();
        assert!(r.is_error());
        assert_eq!(r.result, None);
        assert_eq!(r.duration_ms, None);
    }

    #[test]
    fn parse_unknown_types_are_unrecognized() {
        for json in [
            r#"{"type":"system","subtype":"init","session_id":"s"}"#,
            r#"{"type":"stream_event","session_id":"s","event":{}}"#,
            r#"{"type":"tool_progress","tool_name":"Bash","elapsed_time_seconds":1.5}"#,
        ] {
            assert!(matches!(parse(json), StreamEvent::Unrecognized), "{json}");
        }
    }

    #[test]
    fn parse_assistant_with_unexpected_shapes_keeps_what_fits() {
        let json = r#"{"type":"assistant","message":{"content":[
            {"text":"no type tag"},
            {"type":"text","text":42},
            {"type":"tool_use","name":"Bash","input":{"command":"just comments acme/repo 42"}}
        ]}}"#;
        let StreamEvent::Assistant(asst) = parse(json) else {
            panic!("expected Assistant")
        };
        assert_eq!(asst.message.content.len(), 1);
        assert_eq!(
            asst.message.content[0].shell_command(),
            Some("just comments acme/repo 42")
        );

        let json = r#"{"type":"assistant","message":{"content":"oops"}}"#;
        let StreamEvent::Assistant(empty) = parse(json) else {
            panic!("expected Assistant")
        };
        assert!(empty.message.content.is_empty());
    }
}
