//! Loop-back self-test for a GSPI master.
//!
//! A [`machine::LoopbackMachine`] walks transfer → send → receive over any
//! [`gspi_hal::traits::GspiBus`], comparing the buffers after each completed
//! transfer and receive. It is polled, never blocks, and learns about
//! completion only through a [`completion::CompletionFlag`] raised from the
//! driver's event callback.

pub mod compare;
pub mod completion;
pub mod engine;
pub mod error;
pub mod machine;
pub mod session;
pub mod setup;
