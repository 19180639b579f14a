use crate::error::Error;
use crate::host::EditorContext;
use crate::rpc::Breakpoint;
use chumsky::error::Rich;
use chumsky::prelude::{any, end, just};
use chumsky::{extra, text, Parser};

type Err<'a> = extra::Err<Rich<'a, char>>;

/// Where to set a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationSpec {
    CursorPosition { file: String, line: u64 },
    FunctionName(String),
}

fn file_line_parser<'a>() -> impl chumsky::Parser<'a, &'a str, LocationSpec, Err<'a>> {
    any()
        .filter(|c: &char| *c != ':')
        .repeated()
        .at_least(1)
        .to_slice()
        .then_ignore(just(':'))
        .then(text::int(10).from_str().unwrapped())
        .map(|(file, line): (&str, u64)| LocationSpec::CursorPosition {
            file: file.trim().to_string(),
            line,
        })
        .padded()
        .then_ignore(end())
}

impl LocationSpec {
    /// Build a location from breakpoint command arguments.
    ///
    /// No arguments means the current cursor position, a single argument is
    /// a `file:line` pair or a function name.
    pub fn from_args(args: &[String], editor: &dyn EditorContext) -> Result<Self, Error> {
        match args {
            [] => {
                let (file, line) = editor.current_cursor_position().map_err(Error::Host)?;
                Ok(LocationSpec::CursorPosition { file, line })
            }
            [arg] => Self::parse(arg),
            _ => Err(Error::TooManyArguments),
        }
    }

    pub fn parse(arg: &str) -> Result<Self, Error> {
        let arg = arg.trim();
        if arg.is_empty() {
            return Err(Error::MalformedCommand("empty location".to_string()));
        }
        if let Ok(location) = file_line_parser().parse(arg).into_result() {
            return Ok(location);
        }
        if arg.contains(char::is_whitespace) {
            return Err(Error::MalformedCommand(format!("invalid location `{arg}`")));
        }
        Ok(LocationSpec::FunctionName(arg.to_string()))
    }

    /// Breakpoint creation request for this location.
    pub fn request(&self) -> Breakpoint {
        match self {
            LocationSpec::CursorPosition { file, line } => Breakpoint {
                file: file.clone(),
                line: *line,
                ..Default::default()
            },
            LocationSpec::FunctionName(name) => Breakpoint {
                function_name: Some(name.clone()),
                ..Default::default()
            },
        }
    }

    /// Name to show for a breakpoint at this location, only function locations have one.
    pub fn display_name(&self) -> Option<String> {
        match self {
            LocationSpec::CursorPosition { .. } => None,
            LocationSpec::FunctionName(name) => Some(breakpoint_name(name)),
        }
    }
}

/// Derive a breakpoint name from a qualified function name: segments split by `.` are joined
/// together and the second segment gets an upper case first letter (`pkg.handler` -> `pkgHandler`).
pub fn breakpoint_name(function: &str) -> String {
    let mut segments: Vec<String> = function.split('.').map(ToString::to_string).collect();
    if let Some(second) = segments.get_mut(1) {
        let mut chars = second.chars();
        if let Some(first) = chars.next() {
            *second = first.to_uppercase().chain(chars).collect();
        }
    }
    segments.concat()
}
