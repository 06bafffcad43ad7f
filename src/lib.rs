// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! State Passport: passive tracking of the US states a user has entered.
//!
//! This crate provides the detection core of the app: it turns noisy
//! location fixes into region-entry events, keeps a durable visit history,
//! awards achievement badges, decides when to notify, and reconciles local
//! state with a remote copy.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;
