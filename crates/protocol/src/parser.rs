//! Decoding of DBGp XML replies.
//!
//! One function per reply shape. All functions are pure apart from the
//! variable decoder, which consults the typemap loaded with `typemap_get`
//! and stops descending at the configured depth ceiling.

use std::collections::HashMap;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use roxmltree::{Document, Node};
use tracing::warn;

use crate::constants::{CONTAINER_TYPES, DEFAULT_DEPTH_CEILING};
use crate::error::ParseError;
use crate::types::{
    Breakpoint, CommandOutcome, ContinuationMessage, EngineError, InitMessage, LINE_BREAKPOINT,
    StackFrame, Variable, VariableContent, VariableContext,
};

/// Engine type name to common type name, as returned by `typemap_get`.
pub type Typemap = HashMap<String, String>;

/// Decoder for DBGp replies.
#[derive(Debug, Clone)]
pub struct MessageParser {
    typemap: Typemap,
    depth_ceiling: usize,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageParser {
    pub fn new() -> Self {
        Self {
            typemap: Typemap::new(),
            depth_ceiling: DEFAULT_DEPTH_CEILING,
        }
    }

    /// Limits how many levels of children the variable decoder descends.
    ///
    /// Top-level variables sit at depth 0; with a ceiling of 1 their direct
    /// children are decoded but grandchildren are not.
    pub fn with_depth_ceiling(mut self, ceiling: usize) -> Self {
        self.depth_ceiling = ceiling.max(1);
        self
    }

    pub fn set_typemap(&mut self, typemap: Typemap) {
        self.typemap = typemap;
    }

    pub fn typemap(&self) -> &Typemap {
        &self.typemap
    }

    /// Decodes the `<init>` handshake.
    pub fn parse_init(&self, message: &str) -> Result<InitMessage, ParseError> {
        let doc = parse_document(message)?;
        let root = expect_root(&doc, "init")?;

        let mut init = InitMessage {
            fileuri: attr(root, "fileuri")
                .map(|u| normalize_file_uri(&u))
                .unwrap_or_default(),
            idekey: attr(root, "idekey").unwrap_or_default(),
            language: attr(root, "language").unwrap_or_default(),
            protocol_version: attr(root, "protocol_version").unwrap_or_default(),
            appid: attr(root, "appid").unwrap_or_default(),
            ..InitMessage::default()
        };

        for child in elements(root) {
            let value = text_with_attributes(child);
            match child.tag_name().name() {
                "engine" => init.engine = value,
                "author" => init.author = value,
                "url" => init.url = value,
                "copyright" => init.copyright = value,
                _ => {}
            }
        }

        Ok(init)
    }

    /// Decodes a `typemap_get` reply.
    pub fn parse_typemap(&self, message: &str) -> Result<Typemap, ParseError> {
        let doc = parse_document(message)?;
        let mut typemap = Typemap::new();
        for map in elements(doc.root_element()) {
            if let (Some(name), Some(common)) = (attr(map, "name"), attr(map, "type"))
                && !name.is_empty()
                && !common.is_empty()
            {
                typemap.insert(name, common);
            }
        }
        Ok(typemap)
    }

    /// Decodes the reply to a step, run, stop or detach command.
    pub fn parse_continuation(&self, message: &str) -> Result<ContinuationMessage, ParseError> {
        let doc = parse_document(message)?;
        let root = doc.root_element();

        let mut result = ContinuationMessage {
            command: attr(root, "command").unwrap_or_default(),
            transaction_id: attr(root, "transaction_id").unwrap_or_default(),
            status: parse_attr(root, "status")?,
            reason: attr(root, "reason").unwrap_or_default(),
            filename: None,
            lineno: None,
        };

        let children: Vec<_> = elements(root).collect();
        if let [location] = children.as_slice() {
            result.filename = attr(*location, "filename").map(|u| normalize_file_uri(&u));
            result.lineno = parse_attr(*location, "lineno")?;
        }

        Ok(result)
    }

    /// Decodes a `context_names` reply.
    pub fn parse_contexts(&self, message: &str) -> Result<Vec<VariableContext>, ParseError> {
        let doc = parse_document(message)?;
        elements(doc.root_element())
            .map(|context| -> Result<_, ParseError> {
                Ok(VariableContext {
                    id: require_attr(context, "id")?,
                    name: attr(context, "name").unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Decodes a `context_get` reply into its variable trees.
    pub fn parse_variables(&self, message: &str) -> Result<Vec<Variable>, ParseError> {
        let doc = parse_document(message)?;
        elements(doc.root_element())
            .map(|property| self.decode_variable(property, 0))
            .collect()
    }

    /// Decodes a `stack_get` reply.
    pub fn parse_stack(&self, message: &str) -> Result<Vec<StackFrame>, ParseError> {
        let doc = parse_document(message)?;
        elements(doc.root_element())
            .map(|frame| -> Result<_, ParseError> {
                Ok(StackFrame {
                    filename: attr(frame, "filename")
                        .map(|u| normalize_file_uri(&u))
                        .unwrap_or_default(),
                    lineno: parse_attr(frame, "lineno")?.unwrap_or(0),
                    location: attr(frame, "where").unwrap_or_default(),
                    level: parse_attr(frame, "level")?.unwrap_or(0),
                })
            })
            .collect()
    }

    /// Decodes a `breakpoint_set` reply. Success carries the assigned id
    /// when the engine reported one.
    pub fn parse_breakpoint_set(
        &self,
        message: &str,
    ) -> Result<CommandOutcome<Option<u64>>, ParseError> {
        let doc = parse_document(message)?;
        let root = doc.root_element();

        if elements(root).next().is_some() {
            return Ok(CommandOutcome::Failure(engine_error(root)));
        }
        Ok(CommandOutcome::Success(parse_attr(root, "id")?))
    }

    /// Decodes a `breakpoint_remove` reply.
    ///
    /// Success only when the reply has exactly one `<breakpoint>` child with
    /// an id; anything else, including an `<error>` child, is a failure.
    pub fn parse_breakpoint_remove(
        &self,
        message: &str,
    ) -> Result<CommandOutcome<u64>, ParseError> {
        let doc = parse_document(message)?;
        let root = doc.root_element();

        let children: Vec<_> = elements(root).collect();
        if let [child] = children.as_slice()
            && child.tag_name().name() == "breakpoint"
            && let Some(id) = attr(*child, "id").and_then(|id| id.parse().ok())
        {
            return Ok(CommandOutcome::Success(id));
        }
        Ok(CommandOutcome::Failure(engine_error(root)))
    }

    /// Decodes a `breakpoint_list` reply.
    pub fn parse_breakpoint_list(&self, message: &str) -> Result<Vec<Breakpoint>, ParseError> {
        let doc = parse_document(message)?;
        elements(doc.root_element())
            .filter(|node| node.tag_name().name() == "breakpoint")
            .map(|node| -> Result<_, ParseError> {
                Ok(Breakpoint {
                    id: parse_attr(node, "id")?,
                    filename: attr(node, "filename")
                        .map(|u| normalize_file_uri(&u))
                        .unwrap_or_default(),
                    lineno: parse_attr(node, "lineno")?.unwrap_or(0),
                    breakpoint_type: attr(node, "type").unwrap_or_else(|| LINE_BREAKPOINT.into()),
                    state: attr(node, "state"),
                })
            })
            .collect()
    }

    /// Decodes an `eval` reply. An `<error>` child becomes an error
    /// pseudo-variable carrying the engine's message.
    pub fn parse_eval(&self, message: &str) -> Result<Variable, ParseError> {
        let doc = parse_document(message)?;
        let root = doc.root_element();
        let child = elements(root)
            .next()
            .ok_or_else(|| ParseError::UnexpectedElement(root.tag_name().name().into()))?;

        if child.tag_name().name() == "error" {
            let message = engine_error(root).map(|e| e.message).unwrap_or_default();
            return Ok(Variable::error(message));
        }
        self.decode_variable(child, 0)
    }

    /// Decodes a `feature_set` reply.
    pub fn parse_feature_set(&self, message: &str) -> Result<CommandOutcome<()>, ParseError> {
        let doc = parse_document(message)?;
        let root = doc.root_element();
        if attr(root, "success").as_deref() == Some("1") {
            Ok(CommandOutcome::Success(()))
        } else {
            Ok(CommandOutcome::Failure(engine_error(root)))
        }
    }

    fn decode_variable(&self, node: Node<'_, '_>, depth: usize) -> Result<Variable, ParseError> {
        let raw_type = attr(node, "type").unwrap_or_default();
        let var_type = self
            .typemap
            .get(&raw_type)
            .cloned()
            .unwrap_or_else(|| raw_type.clone());
        let encoding = attr(node, "encoding");
        let numchildren: Option<u32> = parse_attr(node, "numchildren")?;

        let is_container = CONTAINER_TYPES.contains(&raw_type.as_str())
            || CONTAINER_TYPES.contains(&var_type.as_str())
            || numchildren.unwrap_or(0) > 0;

        let content = if is_container {
            let variables = if depth < self.depth_ceiling {
                elements(node)
                    .map(|child| self.decode_variable(child, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                warn!(depth, "variable tree deeper than ceiling, children dropped");
                Vec::new()
            };
            VariableContent::Children { variables }
        } else {
            let text = node.text().map(str::to_string);
            let value = match (encoding.as_deref(), text) {
                (Some("base64"), Some(encoded)) => Some(decode_base64(&encoded)),
                (_, text) => text,
            };
            VariableContent::Value { value }
        };

        Ok(Variable {
            name: attr(node, "name").unwrap_or_default(),
            var_type,
            classname: attr(node, "classname"),
            encoding,
            size: parse_attr(node, "size")?,
            numchildren,
            content,
        })
    }
}

/// Converts a `file://` URL into a filesystem path for this platform.
pub fn normalize_file_uri(uri: &str) -> String {
    strip_file_scheme(uri, cfg!(windows))
}

/// On Windows `file:///C:/x` becomes `C:/x`; elsewhere `file:///x` becomes `/x`.
pub fn strip_file_scheme(uri: &str, windows: bool) -> String {
    let prefix = if windows { "file:///" } else { "file://" };
    uri.strip_prefix(prefix).unwrap_or(uri).to_string()
}

/// Base64 payloads are not guaranteed to be UTF-8. Invalid UTF-8 falls back
/// to a byte-per-char (Latin-1) rendering; invalid base64 is kept verbatim.
fn decode_base64(encoded: &str) -> String {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
        },
        Err(e) => {
            warn!("undecodable base64 value: {e}");
            encoded.to_string()
        }
    }
}

fn parse_document(message: &str) -> Result<Document<'_>, ParseError> {
    if message.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(Document::parse(message)?)
}

fn expect_root<'a, 'input>(
    doc: &'a Document<'input>,
    name: &str,
) -> Result<Node<'a, 'input>, ParseError> {
    let root = doc.root_element();
    if root.tag_name().name() != name {
        return Err(ParseError::UnexpectedElement(root.tag_name().name().into()));
    }
    Ok(root)
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn attr(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

fn parse_attr<T: FromStr>(node: Node<'_, '_>, name: &'static str) -> Result<Option<T>, ParseError> {
    match node.attribute(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ParseError::InvalidAttribute {
                element: node.tag_name().name().into(),
                attribute: name,
                value: raw.into(),
            }),
    }
}

fn require_attr<T: FromStr>(node: Node<'_, '_>, name: &'static str) -> Result<T, ParseError> {
    parse_attr(node, name)?.ok_or_else(|| ParseError::MissingAttribute {
        element: node.tag_name().name().into(),
        attribute: name,
    })
}

/// `<engine version="2.2.7">Xdebug</engine>` reads as `"Xdebug 2.2.7"`.
fn text_with_attributes(node: Node<'_, '_>) -> String {
    let mut value = node.text().unwrap_or_default().to_string();
    for attribute in node.attributes() {
        value.push(' ');
        value.push_str(attribute.value());
    }
    value
}

fn engine_error(root: Node<'_, '_>) -> Option<EngineError> {
    let error = elements(root).find(|n| n.tag_name().name() == "error")?;
    let code = error
        .attribute("code")
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let message = elements(error)
        .find(|n| n.tag_name().name() == "message")
        .and_then(|m| m.text())
        .unwrap_or_default()
        .to_string();
    Some(EngineError { code, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command;
    use crate::types::Status;

    const HEADER: &str = r#"<?xml version="1.0" encoding="iso-8859-1"?>"#;

    fn response(attrs: &str, body: &str) -> String {
        format!(
            r#"{HEADER}<response xmlns="urn:debugger_protocol_v1" xmlns:xdebug="https://xdebug.org/dbgp/xdebug" {attrs}>{body}</response>"#
        )
    }

    #[test]
    fn parse_init_message() {
        let message = format!(
            r#"{HEADER}<init xmlns="urn:debugger_protocol_v1" xmlns:xdebug="https://xdebug.org/dbgp/xdebug" fileuri="file:///home/x/index.php" language="PHP" protocol_version="1.0" appid="3696" idekey="xdbg"><engine version="2.2.7"><![CDATA[Xdebug]]></engine><author><![CDATA[Derick Rethans]]></author><url><![CDATA[https://xdebug.org]]></url><copyright><![CDATA[Copyright (c) 2002-2015 by Derick Rethans]]></copyright></init>"#
        );

        let init = MessageParser::new().parse_init(&message).unwrap();
        assert_eq!(init.fileuri, normalize_file_uri("file:///home/x/index.php"));
        assert_eq!(init.idekey, "xdbg");
        assert_eq!(init.engine, "Xdebug 2.2.7");
        assert_eq!(init.author, "Derick Rethans");
        assert_eq!(init.url, "https://xdebug.org");
        assert_eq!(init.language, "PHP");
        assert_eq!(init.protocol_version, "1.0");
        assert_eq!(init.appid, "3696");
    }

    #[test]
    fn init_rejects_other_root() {
        let err = MessageParser::new()
            .parse_init(&response(r#"command="run""#, ""))
            .unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedElement(ref e) if e == "response"));
    }

    #[test]
    fn file_uri_conventions() {
        assert_eq!(
            strip_file_scheme("file:///home/x/index.php", false),
            "/home/x/index.php"
        );
        assert_eq!(
            strip_file_scheme("file:///C:/Users/x/index.php", true),
            "C:/Users/x/index.php"
        );
        assert_eq!(strip_file_scheme("/already/a/path.php", false), "/already/a/path.php");
    }

    #[test]
    fn parse_status_break_message() {
        let message = response(
            r#"command="step_into" transaction_id="1" status="break" reason="ok""#,
            r#"<xdebug:message filename="file:///home/x/index.php" lineno="3"></xdebug:message>"#,
        );

        let result = MessageParser::new().parse_continuation(&message).unwrap();
        assert_eq!(result.command, "step_into");
        assert_eq!(result.transaction_id, "1");
        assert_eq!(result.status, Some(Status::Break));
        assert_eq!(result.reason, "ok");
        assert_eq!(
            result.filename.as_deref(),
            Some(normalize_file_uri("file:///home/x/index.php").as_str())
        );
        assert_eq!(result.lineno, Some(3));
    }

    #[test]
    fn parse_status_stopping_message() {
        let message = response(
            r#"command="step_into" transaction_id="28" status="stopping" reason="ok""#,
            "",
        );

        let result = MessageParser::new().parse_continuation(&message).unwrap();
        assert_eq!(result.status, Some(Status::Stopping));
        assert!(result.filename.is_none());
        assert!(result.lineno.is_none());
    }

    #[test]
    fn transaction_id_is_echoed() {
        let parser = MessageParser::new();
        for tid in [1u32, 7, 255, 65_536] {
            let line = Command::step_over().to_line(tid);
            let echoed = line.split_whitespace().nth(2).unwrap();
            let reply = response(
                &format!(r#"command="step_over" transaction_id="{echoed}" status="running" reason="ok""#),
                "",
            );
            let result = parser.parse_continuation(&reply).unwrap();
            assert_eq!(result.transaction_id, tid.to_string());
        }
    }

    #[test]
    fn unknown_status_is_an_error() {
        let message = response(r#"command="run" transaction_id="2" status="paused""#, "");
        let err = MessageParser::new().parse_continuation(&message).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAttribute { attribute: "status", .. }));
    }

    #[test]
    fn parse_variable_contexts() {
        let message = response(
            r#"command="context_names" transaction_id="2""#,
            r#"<context name="Locals" id="0"></context><context name="Superglobals" id="1"></context>"#,
        );

        let contexts = MessageParser::new().parse_contexts(&message).unwrap();
        assert_eq!(
            contexts,
            vec![
                VariableContext { id: 0, name: "Locals".into() },
                VariableContext { id: 1, name: "Superglobals".into() },
            ]
        );
    }

    #[test]
    fn parse_simple_local() {
        let message = response(
            r#"command="context_get" transaction_id="2" context="0""#,
            r#"<property name="$i" fullname="$i" type="int"><![CDATA[1]]></property>"#,
        );

        let vars = MessageParser::new().parse_variables(&message).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "$i");
        assert_eq!(vars[0].var_type, "int");
        assert_eq!(vars[0].value(), Some("1"));
    }

    #[test]
    fn array_with_children_has_no_value() {
        let message = response(
            r#"command="context_get" transaction_id="3" context="0""#,
            r#"<property name="$a" type="array" children="1" numchildren="2" page="0" pagesize="32"><property name="0" type="int"><![CDATA[1]]></property><property name="1" type="string" size="1" encoding="base64"><![CDATA[MQ==]]></property></property>"#,
        );

        let vars = MessageParser::new().parse_variables(&message).unwrap();
        let array = &vars[0];
        assert_eq!(array.numchildren, Some(2));
        assert!(array.value().is_none());
        let children = array.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].value(), Some("1"));
        assert_eq!(children[1].encoding.as_deref(), Some("base64"));
        assert_eq!(children[1].size, Some(1));
    }

    #[test]
    fn empty_array_still_carries_children() {
        let message = response(
            r#"command="context_get" transaction_id="3" context="1""#,
            r#"<property name="$_COOKIE" type="array" numchildren="0"></property>"#,
        );

        let vars = MessageParser::new().parse_variables(&message).unwrap();
        assert_eq!(vars[0].children(), Some(&[][..]));
    }

    #[test]
    fn object_with_classname() {
        let message = response(
            r#"command="context_get" transaction_id="4" context="0""#,
            r#"<property name="$o" type="object" classname="Foo\Bar" numchildren="1"><property name="x" facet="public" type="null"></property></property>"#,
        );

        let vars = MessageParser::new().parse_variables(&message).unwrap();
        assert_eq!(vars[0].classname.as_deref(), Some("Foo\\Bar"));
        let child = &vars[0].children().unwrap()[0];
        assert_eq!(child.var_type, "null");
        assert_eq!(child.value(), None);
    }

    #[test]
    fn base64_non_utf8_falls_back_to_raw_bytes() {
        // 0xE9 alone is not valid UTF-8 ("é" in Latin-1).
        let message = response(
            r#"command="context_get" transaction_id="5" context="0""#,
            r#"<property name="$s" type="string" encoding="base64"><![CDATA[6Q==]]></property>"#,
        );

        let vars = MessageParser::new().parse_variables(&message).unwrap();
        assert_eq!(vars[0].value(), Some("\u{e9}"));
    }

    #[test]
    fn invalid_base64_is_kept_verbatim() {
        let message = response(
            r#"command="context_get" transaction_id="5" context="0""#,
            r#"<property name="$s" type="string" encoding="base64"><![CDATA[not*base64]]></property>"#,
        );

        let vars = MessageParser::new().parse_variables(&message).unwrap();
        assert_eq!(vars[0].value(), Some("not*base64"));
    }

    #[test]
    fn typemap_remaps_types() {
        let typemap_reply = response(
            r#"command="typemap_get" transaction_id="1""#,
            r#"<map name="bool" type="bool"></map><map name="int" type="int"></map><map name="array" type="hash"></map><map name="" type="ignored"></map>"#,
        );

        let mut parser = MessageParser::new();
        let typemap = parser.parse_typemap(&typemap_reply).unwrap();
        assert_eq!(typemap.len(), 3);
        parser.set_typemap(typemap);

        let message = response(
            r#"command="context_get" transaction_id="2" context="0""#,
            r#"<property name="$a" type="array" numchildren="1"><property name="0" type="int"><![CDATA[5]]></property></property>"#,
        );
        let vars = parser.parse_variables(&message).unwrap();
        assert_eq!(vars[0].var_type, "hash");
        assert_eq!(vars[0].children().unwrap()[0].var_type, "int");
    }

    #[test]
    fn depth_ceiling_stops_descent() {
        let message = response(
            r#"command="context_get" transaction_id="6" context="0""#,
            r#"<property name="$a" type="array" numchildren="1"><property name="b" type="array" numchildren="1"><property name="c" type="int"><![CDATA[1]]></property></property></property>"#,
        );

        let parser = MessageParser::new().with_depth_ceiling(1);
        let vars = parser.parse_variables(&message).unwrap();
        let b = &vars[0].children().unwrap()[0];
        assert_eq!(b.name, "b");
        assert_eq!(b.children(), Some(&[][..]));
    }

    #[test]
    fn parse_stacktraces() {
        let message = response(
            r#"command="stack_get" transaction_id="22""#,
            r#"<stack where="include_once" level="0" type="file" filename="file:///srv/dir/foo.php" lineno="3"></stack><stack where="{main}" level="1" type="file" filename="file:///srv/index.php" lineno="34"></stack>"#,
        );

        let frames = MessageParser::new().parse_stack(&message).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].location, "include_once");
        assert_eq!(frames[0].lineno, 3);
        assert_eq!(frames[1].level, 1);
        assert_eq!(frames[1].filename, normalize_file_uri("file:///srv/index.php"));
    }

    #[test]
    fn breakpoint_set_success_and_failure() {
        let parser = MessageParser::new();

        let ok = response(r#"command="breakpoint_set" transaction_id="9" id="32310001""#, "");
        assert_eq!(
            parser.parse_breakpoint_set(&ok).unwrap(),
            CommandOutcome::Success(Some(32310001))
        );

        let failed = response(
            r#"command="breakpoint_set" transaction_id="9" status="break" reason="ok""#,
            r#"<error code="3"><message><![CDATA[invalid or missing options]]></message></error>"#,
        );
        assert_eq!(
            parser.parse_breakpoint_set(&failed).unwrap(),
            CommandOutcome::Failure(Some(EngineError {
                code: 3,
                message: "invalid or missing options".into(),
            }))
        );
    }

    #[test]
    fn breakpoint_remove_success_and_failure() {
        let parser = MessageParser::new();

        let ok = response(
            r#"command="breakpoint_remove" transaction_id="11""#,
            r#"<breakpoint type="line" filename="file:///srv/index.php" lineno="10" state="enabled" hit_count="0" hit_value="0" id="41240003"></breakpoint>"#,
        );
        assert_eq!(
            parser.parse_breakpoint_remove(&ok).unwrap(),
            CommandOutcome::Success(41240003)
        );

        let error = response(
            r#"command="breakpoint_remove" transaction_id="11" status="break" reason="ok""#,
            r#"<error code="205"><message><![CDATA[no such breakpoint]]></message></error>"#,
        );
        let outcome = parser.parse_breakpoint_remove(&error).unwrap();
        assert!(matches!(outcome, CommandOutcome::Failure(Some(ref e)) if e.code == 205));

        let no_id = response(
            r#"command="breakpoint_remove" transaction_id="12""#,
            r#"<breakpoint type="line" lineno="10"></breakpoint>"#,
        );
        assert_eq!(
            parser.parse_breakpoint_remove(&no_id).unwrap(),
            CommandOutcome::Failure(None)
        );

        let two = response(
            r#"command="breakpoint_remove" transaction_id="13""#,
            r#"<breakpoint id="1"></breakpoint><breakpoint id="2"></breakpoint>"#,
        );
        assert!(!parser.parse_breakpoint_remove(&two).unwrap().is_success());
    }

    #[test]
    fn parse_breakpoint_list() {
        let message = response(
            r#"command="breakpoint_list" transaction_id="12""#,
            r#"<breakpoint type="line" filename="file:///srv/index.php" lineno="3" state="enabled" hit_count="0" hit_value="0" id="32350002"></breakpoint><breakpoint type="line" filename="file:///srv/index.php" lineno="10" state="enabled" hit_count="0" hit_value="0" id="32350001"></breakpoint>"#,
        );

        let list = MessageParser::new().parse_breakpoint_list(&message).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, Some(32350002));
        assert_eq!(list[0].lineno, 3);
        assert_eq!(list[0].state.as_deref(), Some("enabled"));
        assert_eq!(list[1].breakpoint_type, "line");
        assert_eq!(list[1].filename, normalize_file_uri("file:///srv/index.php"));
    }

    #[test]
    fn parse_eval_result_and_error() {
        let parser = MessageParser::new();

        let ok = response(
            r#"command="eval" transaction_id="14""#,
            r#"<property type="int"><![CDATA[6]]></property>"#,
        );
        let value = parser.parse_eval(&ok).unwrap();
        assert_eq!(value.var_type, "int");
        assert_eq!(value.value(), Some("6"));

        let failed = response(
            r#"command="eval" transaction_id="15" status="break" reason="ok""#,
            r#"<error code="206"><message><![CDATA[error evaluating code]]></message></error>"#,
        );
        let value = parser.parse_eval(&failed).unwrap();
        assert!(value.is_error());
        assert_eq!(value.value(), Some("error evaluating code"));
    }

    #[test]
    fn parse_feature_set_outcome() {
        let parser = MessageParser::new();
        let ok = response(r#"command="feature_set" transaction_id="2" feature="max_depth" success="1""#, "");
        assert!(parser.parse_feature_set(&ok).unwrap().is_success());

        let failed = response(
            r#"command="feature_set" transaction_id="3""#,
            r#"<error code="3"><message><![CDATA[invalid or missing options]]></message></error>"#,
        );
        assert!(!parser.parse_feature_set(&failed).unwrap().is_success());
    }

    #[test]
    fn malformed_and_empty_messages() {
        let parser = MessageParser::new();
        assert!(matches!(parser.parse_stack(""), Err(ParseError::Empty)));
        assert!(matches!(
            parser.parse_stack("<response><stack"),
            Err(ParseError::Xml(_))
        ));
    }
}
