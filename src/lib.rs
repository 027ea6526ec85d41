//! NullTab keeps the most recently used tabs of a window at hand and parks
//! everything else in one collapsed, watermark-titled tab group.
//!
//! The browser and its extension storage are reached through the traits in
//! [`sys`]; [`actor::tab_service`] drives them one command at a time.

pub mod actor;
pub mod common;
pub mod layout_engine;
pub mod model;
pub mod sys;
pub mod ui;
