#![allow(clippy::doc_markdown)] // Allow technical terms like Kubernetes, GKE in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # ClusterUp Core
//!
//! Declarative convergence engine for managed Kubernetes infrastructure.
//!
//! ## Overview
//!
//! A cluster description is turned into a graph of typed tasks. Each task
//! discovers its live counterpart, computes the delta against the desired
//! state and renders that delta through the run's target: direct provider
//! API calls, or a declarative configuration document applied later.
//!
//! ## Architecture
//!
//! - **Model builders** populate a [`Context`] with tasks. Tasks refer to
//!   each other only through [`LazyLink`]s.
//! - The **convergence engine** orders the graph by those links, rejects
//!   cycles before anything runs and executes tasks one at a time.
//! - The **API target** waits on every asynchronous provider operation with
//!   the [`OperationPoller`].
//! - A **dry run** yields the inventory of artifacts the cluster depends on,
//!   which the **staging pipeline** copies into operator-controlled storage.
//!
//! ## Module Organization
//!
//! - [`task`] - task contract, lifecycle, phases and links
//! - [`tasks`] - concrete resource kinds
//! - [`model`] - cluster description and model builders
//! - [`orchestration`] - task graph, engine and the apply command
//! - [`target`] - API and declarative render targets
//! - [`cloud`] - provider capabilities, operations and polling
//! - [`staging`] - artifact inventory and transferers
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//! - [`events`] - run progress broadcasting
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clusterup_core::cloud::MemoryCloud;
//! use clusterup_core::config::ConvergeConfig;
//! use clusterup_core::model::{ClusterSpec, InstanceGroupRole, InstanceGroupSpec};
//! use clusterup_core::orchestration::ApplyCluster;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = ClusterSpec::new("k8s.example.com", "my-project", "us-central1-a", "1.9.7")
//!     .with_instance_group(InstanceGroupSpec::new(
//!         "nodes",
//!         InstanceGroupRole::Node,
//!         "n1-standard-2",
//!         3,
//!     ));
//!
//! let apply = ApplyCluster::new(ConvergeConfig::default(), Arc::new(MemoryCloud::new()), cluster);
//! let report = apply.run().await?;
//! println!("{} tasks, {} mutations", report.results.len(), report.mutation_count());
//! # Ok(())
//! # }
//! ```

pub mod cloud;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod orchestration;
pub mod staging;
pub mod target;
pub mod task;
pub mod tasks;

pub use cloud::{CloudClientFactory, CloudClients, MemoryCloud, OperationPoller};
pub use config::{ConfigManager, ConvergeConfig};
pub use context::Context;
pub use error::{ConvergeError, ConvergeResult};
pub use events::EventPublisher;
pub use model::{ClusterSpec, ModelBuilder};
pub use orchestration::{ApplyCluster, ConvergenceEngine, RunMode, RunOptions, RunReport};
pub use staging::{InventoryAsset, StageInventory};
pub use target::{Target, TargetKind};
pub use task::{DeltaTask, LazyLink, Lifecycle, Phase, Task, TaskId};
