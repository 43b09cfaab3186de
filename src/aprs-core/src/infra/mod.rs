// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Shared per-node state fed by every receive path.

pub mod dedup;
pub mod heard;
pub mod topology;

pub use dedup::DuplicateDetector;
pub use heard::{HeardEntry, HeardList};
pub use topology::{EdgeInfo, InfrastructureGraph, NodeInfo, StationDirectory};
