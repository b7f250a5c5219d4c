/// Default TCP port debugger engines connect to.
pub const DEFAULT_PORT: u16 = 9000;

/// Default bind host. Empty means every interface.
pub const DEFAULT_HOST: &str = "";

/// Variable types whose nodes always carry children.
pub const CONTAINER_TYPES: [&str; 3] = ["array", "object", "hash"];

/// Default `max_depth` feature value.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default `max_children` feature value.
pub const DEFAULT_MAX_CHILDREN: u32 = 128;

/// Default `max_data` feature value.
pub const DEFAULT_MAX_DATA: u32 = 512;

/// Recursion ceiling used by a parser that was not given a configured depth.
pub const DEFAULT_DEPTH_CEILING: usize = 64;

/// DBGp command names.
pub mod commands {
    pub const FEATURE_SET: &str = "feature_set";
    pub const BREAKPOINT_SET: &str = "breakpoint_set";
    pub const BREAKPOINT_REMOVE: &str = "breakpoint_remove";
    pub const BREAKPOINT_LIST: &str = "breakpoint_list";
    pub const STEP_INTO: &str = "step_into";
    pub const STEP_OVER: &str = "step_over";
    pub const STEP_OUT: &str = "step_out";
    pub const RUN: &str = "run";
    pub const STOP: &str = "stop";
    pub const DETACH: &str = "detach";
    pub const CONTEXT_NAMES: &str = "context_names";
    pub const CONTEXT_GET: &str = "context_get";
    pub const STACK_GET: &str = "stack_get";
    pub const EVAL: &str = "eval";
    pub const TYPEMAP_GET: &str = "typemap_get";
}
