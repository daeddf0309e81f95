//! A tiny interactive C++ interpreter.
//!
//! Every line typed at the prompt is added to a growing program. The whole
//! program is then wrapped into a translation unit that prints the value of
//! the last expression, compiled by the system toolchain and run. Lines that
//! break the build are rolled back, so the session always holds code that
//! compiles.
//!
//! The main entry point is [`Interpreter`], which drives a [`Session`] over a
//! [`Backend`] (normally a [`Toolchain`]). [`script`] covers the whole-program
//! modes where a file or stdin is compiled as written.

pub mod artifact;
pub mod buffer;
mod builtin;
pub mod command;
pub mod config;
pub mod diagnostic;
pub mod env;
pub mod error;
mod interpreter;
pub mod io_adapters;
pub mod locate;
pub mod runner;
pub mod script;
mod session;
pub mod subst;
pub mod synth;
pub mod toolchain;

pub use buffer::SnippetBuffer;
pub use config::Config;
pub use error::{Error, Result};
pub use interpreter::{Interpreter, PROMPT, Turn};
pub use session::Session;
pub use synth::{Profile, SourceSynthesizer, Variant};
pub use toolchain::{Backend, Toolchain};

pub use builtin::HELP_TEXT;
