//! Telegram integration - long-poll bot interface
//!
//! This crate provides the chat interface for aktly:
//! - **Bot API client** (`api`) - typed `BotApi` trait plus the HTTP implementation
//! - **Commands** (`commands`) - `/start`, `/new`, `/reqs`, `/cancel`, `/back`, ...
//! - **Events** (`events`) - update classification and per-type handler dispatch
//! - **Replies** (`replies`) - canned prompt and confirmation texts
//! - **Poller** (`poller`) - long-poll loop with reconnect backoff
//!
//! # Architecture
//!
//! ```text
//! Bot API updates → LongPollRunner → EventDispatcher → Handlers → Dialogue Service
//!                        ↓
//!                  replies / documents back to the chat
//! ```

pub mod api;
pub mod commands;
pub mod events;
pub mod poller;
pub mod replies;
