//! Valve Core
//!
//! Core types shared by the valve control plane services.
//!
//! This crate contains:
//! - Domain types: operations, their results and persisted log lines
//! - DTOs: request/response bodies of the orchestrator HTTP API

pub mod domain;
pub mod dto;
