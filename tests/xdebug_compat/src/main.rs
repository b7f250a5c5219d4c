fn main() {
    println!("Run `cargo test -p xdebug-compat` to decode the captured Xdebug replies.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use xdbg_protocol::{
        Breakpoint, CommandOutcome, ContinuationMessage, InitMessage, MessageParser, StackFrame,
        Variable,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Reads a captured engine reply.
    fn load_reply(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads the expected decoding of a reply.
    fn load_expected(name: &str) -> serde_json::Value {
        let data = load_reply(name);
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Compares a decoded value against its JSON fixture, both ways.
    fn assert_matches<T>(decoded: &T, expected: &str)
    where
        T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let expected = load_expected(expected);
        let actual = serde_json::to_value(decoded).expect("serialize decoded reply");
        assert_eq!(actual, expected, "decoded reply differs from fixture");

        let typed: T = serde_json::from_value(expected).expect("fixture matches the data model");
        assert_eq!(&typed, decoded);
    }

    fn find<'a>(vars: &'a [Variable], name: &str) -> &'a Variable {
        vars.iter()
            .find(|v| v.name == name)
            .unwrap_or_else(|| panic!("no variable named {name}"))
    }

    // File URIs normalize differently on Windows, so path-bearing fixtures
    // are only compared on Unix.

    #[cfg(not(windows))]
    #[test]
    fn xdebug_init_packet() {
        let init: InitMessage = MessageParser::new()
            .parse_init(&load_reply("init.xml"))
            .unwrap();
        assert_matches(&init, "init.json");
    }

    #[cfg(not(windows))]
    #[test]
    fn step_into_break() {
        let msg: ContinuationMessage = MessageParser::new()
            .parse_continuation(&load_reply("step_into_break.xml"))
            .unwrap();
        assert_matches(&msg, "step_into_break.json");
    }

    #[test]
    fn run_to_end() {
        let msg = MessageParser::new()
            .parse_continuation(&load_reply("run_stopping.xml"))
            .unwrap();
        assert_matches(&msg, "run_stopping.json");
    }

    #[cfg(not(windows))]
    #[test]
    fn stack_get_from_include() {
        let frames: Vec<StackFrame> = MessageParser::new()
            .parse_stack(&load_reply("stack_get.xml"))
            .unwrap();
        assert_matches(&frames, "stack_get.json");
    }

    #[test]
    fn typemap_get_maps_language_types() {
        let typemap = MessageParser::new()
            .parse_typemap(&load_reply("typemap_get.xml"))
            .unwrap();
        assert_eq!(typemap.len(), 8);
        assert_eq!(typemap.get("array").map(String::as_str), Some("hash"));
        assert_eq!(typemap.get("bool").map(String::as_str), Some("bool"));
    }

    #[test]
    fn superglobals_decode_base64_and_nesting() {
        let mut parser = MessageParser::new();
        parser.set_typemap(
            parser
                .parse_typemap(&load_reply("typemap_get.xml"))
                .unwrap(),
        );
        let vars = parser
            .parse_variables(&load_reply("context_get_superglobals.xml"))
            .unwrap();
        assert_eq!(vars.len(), 3);

        let get = find(&vars, "$_GET");
        assert_eq!(get.var_type, "hash");
        assert_eq!(get.children().unwrap()[0].value(), Some("1"));

        let post = find(&vars, "$_POST");
        assert_eq!(post.children().map(<[Variable]>::len), Some(0));

        let server = find(&vars, "$_SERVER").children().unwrap();
        assert_eq!(find(server, "REQUEST_URI").value(), Some("/index.php?x=1"));
        assert_eq!(find(server, "HTTP_USER_AGENT").value(), Some("Mozilla/5.0"));
        assert_eq!(find(server, "REQUEST_URI").size, Some(14));

        let argv = find(server, "argv").children().unwrap();
        assert_eq!(argv[0].value(), Some("x=1"));
    }

    #[test]
    fn superglobals_respect_depth_ceiling() {
        let parser = MessageParser::new().with_depth_ceiling(1);
        let vars = parser
            .parse_variables(&load_reply("context_get_superglobals.xml"))
            .unwrap();

        let server = find(&vars, "$_SERVER").children().unwrap();
        assert_eq!(server.len(), 3);
        // Third level is cut off, the container itself survives.
        assert_eq!(find(server, "argv").children().map(<[Variable]>::len), Some(0));
        assert_eq!(find(server, "argv").numchildren, Some(1));
    }

    #[cfg(not(windows))]
    #[test]
    fn breakpoint_list_carries_ids() {
        let list = MessageParser::new()
            .parse_breakpoint_list(&load_reply("breakpoint_list.xml"))
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], Breakpoint::line("/home/robert/www/pxdebug/index.php", 3));
        assert_eq!(list[0].id, Some(32350002));
        assert_eq!(list[1].id, Some(32350001));
        assert_eq!(list[1].state.as_deref(), Some("enabled"));
    }

    #[test]
    fn breakpoint_set_refused() {
        let outcome = MessageParser::new()
            .parse_breakpoint_set(&load_reply("breakpoint_set_error.xml"))
            .unwrap();
        match outcome {
            CommandOutcome::Failure(Some(error)) => {
                assert_eq!(error.code, 3);
                assert_eq!(error.message, "invalid or missing options");
            }
            other => panic!("expected a refusal, got {other:?}"),
        }
    }

    #[test]
    fn eval_error_becomes_error_variable() {
        let result = MessageParser::new()
            .parse_eval(&load_reply("eval_error.xml"))
            .unwrap();
        assert!(result.is_error());
        assert_eq!(result.value(), Some("error evaluating code"));
    }
}
