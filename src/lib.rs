//! A small interactive command shell.
//!
//! A line is split into tokens by [`lexer`], turned into one or two validated
//! [`Command`]s by [`parser`], and run as child processes by [`launcher`] or, for
//! `a | b`, by [`pipeline`]. Each job gets its own process group. The
//! [`signals`] relay forwards Ctrl-C and Ctrl-Z to whichever group is recorded in
//! the [`ForegroundRegistry`], and reaps background jobs as they finish.
//! [`Interpreter`] ties these together into the prompt loop.
//!
//! There is no quoting, expansion, scripting, or built-in commands; the line
//! grammar is `argv... [< in] [> out] [2> err] [&]`, optionally twice around a
//! single `|`.

pub mod command;
pub mod config;
mod external;
pub mod interpreter;
pub mod job;
pub mod launcher;
pub mod lexer;
pub mod parser;
pub mod pipeline;
mod redirect;
pub mod signals;

pub use command::{Command, ExitCode, Pipeline};
pub use config::Config;
pub use interpreter::Interpreter;
pub use job::{ForegroundJob, ForegroundRegistry, JobOutcome};
