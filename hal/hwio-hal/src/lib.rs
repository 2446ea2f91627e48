//! hwio Hardware Abstraction Layer
//!
//! This crate defines the I/O capability traits that providers implement
//! and applications consume. The runtime in `hwio-core` decides which
//! provider builds an instance; this crate only says what an instance can do.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application                            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hwio-core (context, resolution, buses) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hwio-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ hwio-hal-mock │       │ board-specific│
//! │               │       │   providers   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::DigitalInput`], [`gpio::DigitalOutput`], [`gpio::DigitalMultipurpose`] - Digital I/O
//! - [`analog::AnalogInput`], [`analog::AnalogOutput`] - Analog I/O
//! - [`pwm::Pwm`] - Pulse-width modulation
//! - [`i2c::I2c`] - I2C device on a shared bus
//! - [`spi::Spi`] - SPI device
//! - [`serial::Serial`] - Serial port
//!
//! Every instance is shared between threads (`Arc<dyn ...>`), so all trait
//! methods take `&self` and implementations use interior mutability.
//!
//! Digital and analog instances may report changes to registered listeners
//! (see [`listener`]); implementations without change reporting reject
//! registration with [`IoError::Unsupported`].

#![deny(unsafe_code)]

pub mod analog;
pub mod error;
pub mod gpio;
pub mod i2c;
pub mod io;
pub mod listener;
pub mod pwm;
pub mod serial;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use analog::{AnalogInput, AnalogListener, AnalogOutput, AnalogValueChange};
pub use error::{BusError, IoError, ParseValueError};
pub use gpio::{
    DigitalInput, DigitalListener, DigitalMultipurpose, DigitalOutput, DigitalState,
    DigitalStateChange,
};
pub use i2c::{EmbeddedI2c, I2c};
pub use io::Io;
pub use listener::{ListenerId, Listeners};
pub use pwm::Pwm;
pub use serial::Serial;
pub use spi::Spi;
