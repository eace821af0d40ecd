//! # partexport-core
//!
//! Turns one score file into a set of rehearsal exports (per-voice focus,
//! karaoke, solo and piano mixes, full mixes, print layout) and renders them
//! through an external renderer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use partexport_core::config::Config;
//! use partexport_core::export::run_export;
//! use partexport_core::render::ShellRenderer;
//!
//! let settings = Config::load(None).settings();
//! let report = run_export("Hymn.mscz".as_ref(), &settings, Arc::new(ShellRenderer))?;
//! for c in &report.completions {
//!     println!("{} ({}s)", c.label, c.elapsed.as_secs());
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`score`]: `Score`: classified parts, volume/bank controllers, mixer tracks
//! - [`plan`]: `VariantPlanner`: fixed-order variant enumeration into `Task`s
//! - [`dispatch`]: `TaskDispatcher`: serial or bounded-pool execution
//! - [`container`]: `.mscz` reading and variant copies (`ScoreSource`, `VariantSink`)
//! - [`render`]: `Renderer` trait, shell renderer, per-task cleanup
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`export`]: the end-to-end run used by the CLI

pub mod config;
pub mod container;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod paths;
pub mod plan;
pub mod render;
pub mod score;

pub use error::{Result, ScoreError};
