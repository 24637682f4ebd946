#![cfg_attr(not(test), no_std)]

//! Firmware core for a four channel oversampling voltmeter.
//!
//! The interrupt handlers feed a [`meter::Shared`]; the main loop owns a
//! [`meter::Meter`] and is driven by [`runtime::run`].

#[cfg(feature = "debug")]
#[macro_use]
pub mod debug;
#[cfg(not(feature = "debug"))]
#[path = "nodebug.rs"]
#[macro_use]
pub mod debug;

pub mod adc;
pub mod calibration;
pub mod config;
pub mod decimal;
pub mod encoder;
pub mod events;
pub mod infomem;
pub mod menu;
pub mod meter;
pub mod parser;
pub mod runtime;
pub mod segments;
pub mod status;
pub mod tx;
pub mod utils;
pub mod vcell;

pub use meter::{Meter, Shared};
pub use runtime::Board;
pub use status::{MeterStatus, Result};
pub use tx::TxRegister;
