// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test scaffolding shared across the Larkbridge workspace.

pub mod fake_cli;
pub mod mock_sender;

pub use fake_cli::{FakeCli, emit_line, fake_cli};
pub use mock_sender::{CardUpdate, MockSender};
