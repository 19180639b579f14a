//! Interactive console commands.
//!
//! Session commands are recognized by a parser, any other input is passed to the debugger
//! command table as is.

use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just};
use chumsky::{extra, text, Boxed, Parser};

pub const BREAK_COMMAND: &str = "break";
pub const BREAK_COMMAND_SHORT: &str = "b";
pub const CLEAR_COMMAND: &str = "clear";
pub const CONTINUE_COMMAND: &str = "continue";
pub const CONTINUE_COMMAND_SHORT: &str = "c";
pub const NEXT_COMMAND: &str = "next";
pub const NEXT_COMMAND_SHORT: &str = "n";
pub const RESTART_COMMAND: &str = "restart";
pub const RESTART_COMMAND_SHORT: &str = "r";
pub const PROMPT_COMMAND: &str = "dlv";
pub const QUIT_COMMAND: &str = "quit";
pub const QUIT_COMMAND_SHORT: &str = "q";

type Err<'a> = extra::Err<Rich<'a, char>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Create a breakpoint, arguments as typed by user.
    Break(Vec<String>),
    Clear(i64),
    Continue,
    Next,
    Restart,
    /// Ask a user for a free-text debugger command.
    Prompt,
    /// Free-text debugger command.
    Raw(String),
    Quit,
}

/// Keyword followed by a whitespace or an end of input.
fn keyword<'a>(
    full: &'static str,
    short: &'static str,
) -> impl chumsky::Parser<'a, &'a str, (), Err<'a>> + Clone {
    just(full)
        .or(just(short))
        .then_ignore(text::whitespace().at_least(1).or(end()))
        .ignored()
        .padded()
}

fn command<'a, I>(ctx: &'static str, inner: I) -> Boxed<'a, 'a, &'a str, SessionCommand, Err<'a>>
where
    I: chumsky::Parser<'a, &'a str, SessionCommand, Err<'a>> + 'a,
{
    inner.then_ignore(end()).labelled(ctx).boxed()
}

impl SessionCommand {
    /// Parse an input line, unrecognized input becomes [`SessionCommand::Raw`].
    pub fn parse(input: &str) -> SessionCommand {
        Self::parser()
            .parse(input)
            .into_result()
            .unwrap_or_else(|_| SessionCommand::Raw(input.trim().to_string()))
    }

    fn parser<'a>() -> impl chumsky::Parser<'a, &'a str, SessionCommand, Err<'a>> {
        let r#break = keyword(BREAK_COMMAND, BREAK_COMMAND_SHORT)
            .ignore_then(any().repeated().to_slice())
            .map(|args: &str| {
                SessionCommand::Break(args.split_whitespace().map(ToString::to_string).collect())
            });

        let clear = keyword(CLEAR_COMMAND, CLEAR_COMMAND)
            .ignore_then(text::int(10).from_str().unwrapped().padded())
            .map(SessionCommand::Clear);

        choice((
            command(BREAK_COMMAND, r#break),
            command(CLEAR_COMMAND, clear),
            command(
                CONTINUE_COMMAND,
                keyword(CONTINUE_COMMAND, CONTINUE_COMMAND_SHORT).to(SessionCommand::Continue),
            ),
            command(
                NEXT_COMMAND,
                keyword(NEXT_COMMAND, NEXT_COMMAND_SHORT).to(SessionCommand::Next),
            ),
            command(
                RESTART_COMMAND,
                keyword(RESTART_COMMAND, RESTART_COMMAND_SHORT).to(SessionCommand::Restart),
            ),
            command(
                PROMPT_COMMAND,
                keyword(PROMPT_COMMAND, PROMPT_COMMAND).to(SessionCommand::Prompt),
            ),
            command(
                QUIT_COMMAND,
                keyword(QUIT_COMMAND, QUIT_COMMAND_SHORT).to(SessionCommand::Quit),
            ),
        ))
    }
}
