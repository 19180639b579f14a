//! Debugger server API types (json representation of the server API v2).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Breakpoint as the server sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Server assigned identifier, unique for a debug session.
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub line: u64,
    #[serde(
        rename = "functionName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub function_name: Option<String>,
    /// Hit counts per goroutine, keys are goroutine ids.
    #[serde(rename = "hitCount", default, skip_serializing)]
    pub hit_count: HashMap<String, u64>,
    #[serde(rename = "totalHitCount", default, skip_serializing)]
    pub total_hit_count: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Breakpoint {
    /// Return hit count for goroutine if server recorded any.
    pub fn hits_for(&self, goroutine_id: i64) -> Option<u64> {
        self.hit_count.get(&goroutine_id.to_string()).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
    #[serde(default)]
    pub name: String,
}

/// Snapshot of a debugee thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub pc: u64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u64,
    #[serde(default)]
    pub function: Option<Function>,
    #[serde(rename = "goroutineID", default)]
    pub goroutine_id: i64,
    /// Breakpoint this thread is stopped at.
    #[serde(rename = "breakPoint", default)]
    pub breakpoint: Option<Breakpoint>,
}

impl Thread {
    pub fn function_name(&self) -> &str {
        self.function
            .as_ref()
            .map(|f| f.name.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub pc: u64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u64,
    #[serde(default)]
    pub function: Option<Function>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Goroutine {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "currentLoc", default)]
    pub current_loc: Location,
    #[serde(rename = "userCurrentLoc", default)]
    pub user_current_loc: Location,
    #[serde(rename = "threadID", default)]
    pub thread_id: i64,
}

/// Debugee execution state reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebuggerState {
    #[serde(rename = "Running", default)]
    pub running: bool,
    #[serde(rename = "currentThread", default)]
    pub current_thread: Option<Thread>,
    #[serde(rename = "currentGoroutine", default)]
    pub current_goroutine: Option<Goroutine>,
    #[serde(default)]
    pub exited: bool,
    #[serde(rename = "exitStatus", default)]
    pub exit_status: i64,
    /// Error text if the command that produced this state failed.
    #[serde(skip)]
    pub err: Option<String>,
}

/// Local variable snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub r#type: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub children: Vec<Variable>,
}

// --------------------------------- rpc call arguments/results ------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct CreateBreakpointIn<'a> {
    #[serde(rename = "Breakpoint")]
    pub breakpoint: &'a Breakpoint,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateBreakpointOut {
    #[serde(rename = "Breakpoint")]
    pub breakpoint: Breakpoint,
}

#[derive(Debug, Serialize)]
pub(super) struct ClearBreakpointIn {
    #[serde(rename = "Id")]
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ClearBreakpointOut {}

#[derive(Debug, Serialize)]
pub(super) struct DebuggerCommand {
    pub name: &'static str,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommandOut {
    #[serde(rename = "State")]
    pub state: DebuggerState,
}

#[derive(Debug, Serialize)]
pub(super) struct Empty {}

#[derive(Debug, Deserialize)]
pub(super) struct RestartOut {}

#[derive(Debug, Deserialize)]
pub(super) struct ProcessPidOut {
    #[serde(rename = "Pid")]
    pub pid: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct ListGoroutinesIn {
    #[serde(rename = "Start")]
    pub start: i64,
    #[serde(rename = "Count")]
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListGoroutinesOut {
    #[serde(rename = "Goroutines", default)]
    pub goroutines: Vec<Goroutine>,
}

#[derive(Debug, Serialize)]
pub(super) struct StateIn {
    #[serde(rename = "NonBlocking")]
    pub non_blocking: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct StateOut {
    #[serde(rename = "State")]
    pub state: DebuggerState,
}

#[derive(Debug, Serialize)]
pub(super) struct ListFunctionsIn<'a> {
    #[serde(rename = "Filter")]
    pub filter: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListFunctionsOut {
    #[serde(rename = "Funcs", default)]
    pub funcs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct EvalScope {
    #[serde(rename = "GoroutineID")]
    pub goroutine_id: i64,
    #[serde(rename = "Frame")]
    pub frame: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct LoadConfig {
    #[serde(rename = "FollowPointers")]
    pub follow_pointers: bool,
    #[serde(rename = "MaxVariableRecurse")]
    pub max_variable_recurse: i64,
    #[serde(rename = "MaxStringLen")]
    pub max_string_len: i64,
    #[serde(rename = "MaxArrayValues")]
    pub max_array_values: i64,
    #[serde(rename = "MaxStructFields")]
    pub max_struct_fields: i64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            follow_pointers: true,
            max_variable_recurse: 1,
            max_string_len: 64,
            max_array_values: 64,
            max_struct_fields: -1,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ListLocalVarsIn {
    #[serde(rename = "Scope")]
    pub scope: EvalScope,
    #[serde(rename = "Cfg")]
    pub cfg: LoadConfig,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListLocalVarsOut {
    #[serde(rename = "Variables", default)]
    pub variables: Vec<Variable>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListBreakpointsOut {
    #[serde(rename = "Breakpoints", default)]
    pub breakpoints: Vec<Breakpoint>,
}

#[derive(Debug, Serialize)]
pub(super) struct DetachIn {
    #[serde(rename = "Kill")]
    pub kill: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct DetachOut {}
