//! Infrastructure layer for the attendance issuer.
//!
//! Contains the adapters behind the application traits: positioning
//! sources, audio outputs, the HTTP issuance backend, and TOML config
//! storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `attendance_core`, but MUST NOT be imported by the `application` layer.

pub mod audio;
pub mod backend;
pub mod positioning;
pub mod storage;
