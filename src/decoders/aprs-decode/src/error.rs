// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("report truncated: {0}")]
    Truncated(&'static str),
    #[error("malformed {field}: '{value}'")]
    Malformed { field: &'static str, value: String },
    #[error("{0} out of range")]
    OutOfRange(&'static str),
}

impl DecodeError {
    pub(crate) fn malformed(field: &'static str, value: &str) -> Self {
        Self::Malformed {
            field,
            value: value.to_string(),
        }
    }
}
