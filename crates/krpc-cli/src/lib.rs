// Copyright 2025 KRPC Authors
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

//! # KRPC CLI
//!
//! Command-line front end for the KRPC task service.
//!
//! - `krpc serve`: run the example program on this host
//! - `krpc tasks`: list a server's tasks (plain lines or JSON)
//! - `krpc ping`: call the `NULL` procedure
//!
//! Argument parsing uses `argh`; the binary lives in `main.rs`. This crate
//! holds the output shaping so it can be tested without a server.

pub mod output;
