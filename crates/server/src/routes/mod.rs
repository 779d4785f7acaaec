//! The two API surfaces (§4.8): loopback intake and privileged control
//! plane. Deliberately separate routers — they bind different transports
//! and carry different trust levels.

pub mod control;
pub mod intake;
