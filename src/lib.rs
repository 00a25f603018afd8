#![doc(html_root_url = "https://docs.rs/cambium/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A virtual DOM reconciler with class and function components.
//!
//! Describe a UI as a tree of [`Element`]s, then let a [`Renderer`] keep a [`Host`] in sync with it.
//! [`MemoryHost`](`memory::MemoryHost`) keeps everything in memory, the `dom` feature adds a browser adapter.
//!
//! # Logging
//!
//! Diagnostics go through [`tracing`]. Failures no error boundary handles are logged at `ERROR`
//! and also passed to the sink installed with [`set_diagnostic_sink`].

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod boundary;
pub mod component;
pub mod construct;
pub mod element;
pub mod error;
pub mod host;
pub mod memory;
pub mod schedule;
pub mod value;

#[cfg(feature = "dom")]
pub mod dom;
#[cfg(feature = "dom")]
mod rc_hash_map;

mod diff;
mod fault;
mod mount;
mod renderer;
mod tree;

pub use boundary::Site;
pub use component::{
	Class, Component, ComponentClass, Coroutine, EventHandler, FunctionComponent, HookResult, Hooks, PropRule, RefTarget, RenderStep, Rendered, Settle, StateUpdate, Updater,
};
pub use construct::{comment, create_element, fragment, h, normalize, portal, text, Child, Type};
pub use element::{Element, ElementType, Group, Key, Kind, PortalTarget};
pub use error::{set_diagnostic_sink, take_diagnostic_sink, Diagnostic, Error, Fault, HookError, HostError};
pub use host::{Host, Listener, Operation};
pub use renderer::{Mode, Options, Renderer};
pub use schedule::{LocalScheduler, Scheduler};
pub use value::{Props, State, Value};

#[cfg(feature = "dom")]
pub use schedule::DomScheduler;
