/*
[INPUT]:  HTTP client configuration and identity/verifier endpoints
[OUTPUT]: Login phrases and verification verdicts
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod challenge;
pub mod client;
pub mod error;
pub mod verify;

pub use error::{ConnectError, Result};

pub use client::{ClientConfig, ZelidClient};
pub use verify::LOGIN_SUCCESS_MESSAGE;
