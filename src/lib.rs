// src/lib.rs

//! Sink log: snapshot a dish, tag who moved it and whether it went into or
//! out of the sink, and keep the entries in a small append-only backend.

pub mod api;
pub mod camera;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;
pub mod viewer;
pub mod workflow;
