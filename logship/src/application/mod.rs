// /////////////////////////////////////////////////////////////////////////////
// Logship
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Layer
//!
//! The agent's orchestration: the [`Agent`] root object that owns every
//! service and thread, the [`PipelineManager`] that installs and tears
//! down pipelines atomically, the runtime [`RuntimePipeline`] with its
//! processors/router/queues, and the per-pipeline [`FilePump`] that owns
//! the pipeline's readers.

mod agent;
mod bridge;
mod pipeline;
mod pipeline_manager;
mod pump;

pub use agent::Agent;
pub use bridge::QueuePluginBridge;
pub use pipeline::{serialize_group, RuntimePipeline};
pub use pipeline_manager::{HostFacts, PipelineManager};
pub use pump::{FilePump, PumpMsg};
