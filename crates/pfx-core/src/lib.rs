// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # PFX Core
//!
//! Foundational crate of the PFX render manager. It defines the contracts the
//! manager talks to (the [`renderer::GraphicsDevice`] and
//! [`renderer::CommandRecorder`] traits), the column-major math it produces
//! transform semantics with, the scene assets it binds ([`asset::Model`]) and the
//! declarative effect graph it compiles ([`effect::EffectDescription`]).
//!
//! This crate performs no GPU work on its own; a backend implements the traits.

#![warn(missing_docs)]

#[macro_use]
mod macros;

pub mod asset;
pub mod effect;
pub mod math;
pub mod renderer;
