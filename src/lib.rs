//! Chistobot: booking wizard for a subscription home-cleaning service.
//!
//! One wizard core drives two surfaces: an inline-keyboard chat menu and a
//! Telegram Mini App REST API. The pure state machine and the availability
//! rules live in [`booking`], the backend seam in [`backend`], the host
//! integration in [`bridge`], and the Telegram plumbing in [`telegram`].

pub mod backend;
pub mod booking;
pub mod bridge;
pub mod cli;
pub mod core;
pub mod storage;
pub mod telegram;

pub use core::{AppError, AppResult};
