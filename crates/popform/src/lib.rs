//! Ephemeral, single-use form server: present one question to a human in an
//! app-mode browser window on loopback, wait for exactly one answer, tear
//! everything down.

#![forbid(unsafe_code)]

pub mod assets;
pub mod browser;
pub mod config;
pub mod form;
mod gate;
mod server;
pub mod session;
pub mod tools;

pub use config::ServerConfig;
pub use form::{
    FieldKind, FormConfig, FormField, FormResponse, OptionItem, ResponseAction, ResponseData,
};
pub use session::{
    ActiveSession, SessionCloser, SessionError, serve_form_and_await_response,
    serve_form_with_runner,
};
pub use tools::{
    AskError, MultiSelection, SelectInput, SingleSelection, ask_user, ask_user_multiple,
};
