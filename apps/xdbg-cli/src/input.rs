//! Line commands typed at the xdbg prompt.

use xdbg_protocol::Breakpoint;

pub const HELP: &str = "\
commands:
  run | r                 continue to the next breakpoint
  over | n                step over
  into | s                step into
  out | o                 step out
  stop                    stop the script
  detach                  let the script finish without the debugger
  abort                   drop an unresponsive engine
  break | b FILE:LINE     set a breakpoint
  delete | d FILE:LINE    remove a breakpoint
  breaks                  list breakpoints
  eval | e EXPR           evaluate an expression
  watch EXPR[; EXPR...]   replace the watch list (empty clears it)
  listen | unlisten       start or stop accepting engines
  status                  show session state
  help | ?                this text
  quit | q                exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Run,
    StepOver,
    StepInto,
    StepOut,
    Stop,
    Detach,
    Abort,
    Break(Breakpoint),
    Delete(Breakpoint),
    ListBreakpoints,
    Eval(String),
    Watch(Vec<String>),
    Listen,
    Unlisten,
    Status,
    Help,
    Quit,
}

impl Input {
    /// Parses one line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Input>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let input = match word {
            "run" | "r" => Input::Run,
            "over" | "n" => Input::StepOver,
            "into" | "s" => Input::StepInto,
            "out" | "o" => Input::StepOut,
            "stop" => Input::Stop,
            "detach" => Input::Detach,
            "abort" => Input::Abort,
            "break" | "b" => Input::Break(parse_location(rest)?),
            "delete" | "d" => Input::Delete(parse_location(rest)?),
            "breaks" => Input::ListBreakpoints,
            "eval" | "e" => {
                if rest.is_empty() {
                    return Err("eval needs an expression".into());
                }
                Input::Eval(rest.to_string())
            }
            "watch" => Input::Watch(
                rest.split(';')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            "listen" => Input::Listen,
            "unlisten" => Input::Unlisten,
            "status" => Input::Status,
            "help" | "?" => Input::Help,
            "quit" | "q" | "exit" => Input::Quit,
            other => return Err(format!("unknown command `{other}`, try `help`")),
        };
        Ok(Some(input))
    }
}

/// `FILE:LINE`, splitting on the last colon so Windows drive letters survive.
fn parse_location(arg: &str) -> Result<Breakpoint, String> {
    let (file, line) = arg
        .rsplit_once(':')
        .ok_or_else(|| format!("expected FILE:LINE, got `{arg}`"))?;
    let lineno: u32 = line
        .trim()
        .parse()
        .map_err(|_| format!("invalid line number `{line}`"))?;
    if file.is_empty() || lineno == 0 {
        return Err(format!("expected FILE:LINE, got `{arg}`"));
    }
    Ok(Breakpoint::line(file, lineno))
}
