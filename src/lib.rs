//! Interview-to-risk scoring and control recommendation engine
//!
//! Turns structured security-interview answers into scored risk scenarios
//! (`T × V × I`, optionally `× E`), using an AI evaluator when one is
//! configured and a deterministic rule-based evaluator otherwise.

pub mod app;
pub mod db;
pub mod model;
pub mod service;
