//! Core module containing the terminal-side functionality
//!
//! This module provides:
//! - Transport layer (serial Minitel link, host console, scripted streams)
//! - Terminal charset codec
//! - Line discipline for reading typed lines
//! - Streaming formatter with word wrap and pagination
//! - Link prober for unknown serial settings
//! - Slash commands and the interactive session shell

pub mod codec;
pub mod commands;
pub mod format;
pub mod line_discipline;
pub mod probe;
pub mod session;
pub mod transport;
